use std::io::Read;

use vedirect_stream_logger::checksum::frame_checksum;
use vedirect_stream_logger::{PointBuilder, RecordIterator, StreamParser, TelemetryRecord};

/// Build a frame from raw protocol lines (without CRLF), appending a
/// trailer byte that balances the sum to 0 mod 256.
fn frame_from_lines(lines: &[&str]) -> Vec<u8> {
    let mut frame = Vec::new();
    for line in lines {
        frame.extend_from_slice(line.as_bytes());
        frame.extend_from_slice(b"\r\n");
    }
    frame.extend_from_slice(b"Checksum\t");
    let partial = frame_checksum(&frame)
        .wrapping_add(b'\r')
        .wrapping_add(b'\n');
    frame.push(0u8.wrapping_sub(partial));
    frame.extend_from_slice(b"\r\n");
    frame
}

/// Reader that hands the stream out in fixed-size slices, the way a
/// serial driver delivers bytes with no regard for frame boundaries.
struct Chunked<'a> {
    data: &'a [u8],
    chunk: usize,
}

impl Read for Chunked<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.data.len().min(buf.len()).min(self.chunk);
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(n)
    }
}

fn collect_records(data: &[u8], chunk: usize) -> Vec<TelemetryRecord> {
    RecordIterator::new(Chunked { data, chunk })
        .collect::<std::io::Result<Vec<_>>>()
        .unwrap()
}

/// Steady-state MPPT output: the device alternates a status frame and
/// a history frame, roughly once per second each.
fn device_session() -> Vec<u8> {
    let mut stream = Vec::new();
    stream.extend_from_slice(&frame_from_lines(&[
        "PID\t0xA053",
        "FW\t159",
        "SER#\tHQ2150ABCDE",
        "V\t25640",
        "I\t1200",
        "VPV\t48230",
        "PPV\t130",
        "CS\t3",
        "MPPT\t2",
        "OR\t0x00000000",
        "ERR\t0",
        "LOAD\tON",
        "IL\t300",
    ]));
    stream.extend_from_slice(&frame_from_lines(&[
        "H19\t4520",
        "H20\t133",
        "H21\t450",
        "H22\t97",
        "H23\t380",
        "HSDS\t211",
    ]));
    stream
}

#[test]
fn session_parses_whole() {
    let records = collect_records(&device_session(), usize::MAX);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].get("PID"), Some("0xA053"));
    assert_eq!(records[0].battery_voltage(), Some(25640.0));
    assert_eq!(records[0].charge_state(), Some("3"));
    assert_eq!(records[1].yield_total(), Some(4520.0));
    assert_eq!(records[1].get("HSDS"), Some("211"));
}

#[test]
fn chunk_size_does_not_change_records() {
    let stream = device_session();
    let whole = collect_records(&stream, usize::MAX);
    for chunk in [1, 2, 3, 7, 16, 64, 1024] {
        let records = collect_records(&stream, chunk);
        assert_eq!(records, whole, "chunk size {chunk} changed the output");
    }
}

#[test]
fn async_hex_lines_are_checksummed_but_not_decoded() {
    // Async hex updates land inside frames and count toward the
    // trailer byte, but they never become record fields.
    let frame = frame_from_lines(&[":A0002000148", "V\t12800", ":A050200014C"]);
    let records = collect_records(&frame, 8);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].len(), 1);
    assert_eq!(records[0].get("V"), Some("12800"));
}

#[test]
fn corrupt_frame_does_not_stall_the_stream() {
    let mut stream = frame_from_lines(&["V\t12100"]);
    // Flip a digit of the value; the trailer label stays intact so
    // only this frame is consumed.
    stream[3] ^= 0x01;
    stream.extend_from_slice(&frame_from_lines(&["V\t12200"]));
    stream.extend_from_slice(&frame_from_lines(&["V\t12300"]));

    let records = collect_records(&stream, 11);
    let voltages: Vec<_> = records.iter().map(|r| r.get("V").unwrap()).collect();
    assert_eq!(voltages, ["12200", "12300"]);
}

#[test]
fn long_noise_burst_then_clean_frames() {
    // Wrong-baud garbage long enough to trip the buffer reset, then
    // the device comes back. Residual noise may take the first frame
    // or two down with it; steady-state output must parse again.
    let mut stream = vec![0xA5u8; 12_000];
    for _ in 0..3 {
        stream.extend_from_slice(&device_session());
    }
    let records = collect_records(&stream, 512);
    assert!(records.len() >= 4, "only {} records recovered", records.len());
    let last = records.last().unwrap();
    assert_eq!(last.get("HSDS"), Some("211"));
    assert!(records
        .iter()
        .any(|r| r.battery_voltage() == Some(25640.0)));
}

#[test]
fn push_parser_matches_pull_iterator() {
    let stream = device_session();
    let pulled = collect_records(&stream, 5);

    let mut parser = StreamParser::new();
    let mut pushed = Vec::new();
    for piece in stream.chunks(5) {
        pushed.extend(parser.process(piece));
    }
    assert_eq!(pushed, pulled);
}

#[test]
fn generated_frames_round_trip() {
    // Cheap deterministic generator, enough to vary key sets and
    // value lengths across frames.
    let mut state = 0x2545_F491_4F6C_DD1Du64;
    let mut next = move |bound: u64| {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state % bound
    };

    let keys = ["PID", "FW", "V", "I", "VPV", "PPV", "CS", "ERR", "H19", "H20"];
    let mut stream = Vec::new();
    let mut expected = Vec::new();

    for _ in 0..10 {
        let count = 1 + next(keys.len() as u64 - 1) as usize;
        let fields: Vec<(String, String)> = keys[..count]
            .iter()
            .map(|k| (k.to_string(), (next(100_000) as i64 - 50_000).to_string()))
            .collect();
        let lines: Vec<String> = fields.iter().map(|(k, v)| format!("{k}\t{v}")).collect();
        let line_refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        stream.extend_from_slice(&frame_from_lines(&line_refs));
        expected.push(fields.into_iter().collect::<TelemetryRecord>());
    }

    for chunk in [usize::MAX, 13, 1] {
        let records = collect_records(&stream, chunk);
        assert_eq!(records, expected, "chunk size {chunk}");
    }
}

#[test]
fn parsed_record_renders_line_protocol() {
    let records = collect_records(&device_session(), 32);
    let builder = PointBuilder::new("vedirect");
    let point = builder.point(&records[0]).unwrap();
    assert_eq!(
        point,
        "vedirect,MPPT=2,source=vedirect-logger,state=3 \
         voltage=25640,current=1200,pv_voltage=48230,pv_power=130"
    );
    let point = builder.point(&records[1]).unwrap();
    assert_eq!(
        point,
        "vedirect,MPPT=unknown,source=vedirect-logger,state=unknown \
         yield_today=133,yield_total=4520,max_power_today=450"
    );
}
