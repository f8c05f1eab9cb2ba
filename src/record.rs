use std::sync::LazyLock;

use memchr::memmem;
use tracing::warn;

use crate::types::TelemetryRecord;

static CRLF: LazyLock<memmem::Finder<'static>> = LazyLock::new(|| memmem::Finder::new(b"\r\n"));

/// Decode one checksum-valid frame into a telemetry record.
///
/// The frame is split on CRLF and each line on its first tab. The
/// trailer line (`Checksum...`) and async hex-update lines (`:...`)
/// carry no telemetry and are skipped. A line that fails text decoding
/// ends decoding early; the record assembled up to that point is
/// returned, which may be empty.
pub fn decode_frame(frame: &[u8]) -> TelemetryRecord {
    let mut record = TelemetryRecord::new();

    let mut pos = 0;
    while pos < frame.len() {
        let line_end = match CRLF.find(&frame[pos..]) {
            Some(offset) => pos + offset,
            None => frame.len(),
        };
        let line = &frame[pos..line_end];
        pos = line_end + 2;

        if line.is_empty() || line.starts_with(b"Checksum") || line.starts_with(b":") {
            continue;
        }

        let line = match std::str::from_utf8(line) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "undecodable line in checksum-valid frame");
                break;
            }
        };

        // First tab separates key from value; further tabs belong to
        // the value.
        let (key, value) = line.split_once('\t').unwrap_or((line, ""));
        if key.is_empty() {
            continue;
        }
        record.insert(key.to_string(), value.to_string());
    }

    record
}
