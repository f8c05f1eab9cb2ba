use std::collections::VecDeque;
use std::io::Read;
use std::sync::LazyLock;

use memchr::memmem;
use tracing::{debug, trace, warn};

use crate::checksum::frame_checksum;
use crate::record::decode_frame;
use crate::types::TelemetryRecord;

/// Label that opens the trailer line of every VE.Direct frame.
const CHECKSUM_MARKER: &[u8] = b"Checksum\t";
const FRAME_TERMINATOR: &[u8] = b"\r\n";

static MARKER: LazyLock<memmem::Finder<'static>> =
    LazyLock::new(|| memmem::Finder::new(CHECKSUM_MARKER));
static CRLF: LazyLock<memmem::Finder<'static>> =
    LazyLock::new(|| memmem::Finder::new(FRAME_TERMINATOR));

/// Unresolved bytes kept across calls before the accumulation buffer is
/// discarded. Bounds memory growth when the stream never produces a
/// trailer (line noise, wrong baud rate, device silence).
pub const DEFAULT_BUFFER_LIMIT: usize = 10_240;

/// Reassembles VE.Direct frames from an arbitrarily-chunked byte
/// stream and decodes the ones that pass checksum validation.
///
/// One parser instance owns one ordered stream. Bytes that cannot yet
/// form a complete frame stay buffered until the next `process` call.
pub struct StreamParser {
    buf: Vec<u8>,
    buffer_limit: usize,
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamParser {
    pub fn new() -> Self {
        Self::with_buffer_limit(DEFAULT_BUFFER_LIMIT)
    }

    pub fn with_buffer_limit(buffer_limit: usize) -> Self {
        StreamParser {
            buf: Vec::new(),
            buffer_limit,
        }
    }

    /// Bytes currently buffered waiting for a complete frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Feed one chunk of the stream; returns every record resolved by
    /// it, in stream order.
    ///
    /// A candidate frame runs from the start of the buffer through the
    /// first complete trailer line, so any garbage preceding the
    /// trailer of the first frame is consumed with it and fails the
    /// checksum. Frames with a nonzero sum are dropped silently.
    pub fn process(&mut self, chunk: &[u8]) -> Vec<TelemetryRecord> {
        self.buf.extend_from_slice(chunk);
        let mut records = Vec::new();

        loop {
            let marker_pos = match MARKER.find(&self.buf) {
                Some(pos) => pos,
                None => break,
            };
            // Trailer label seen but its value/terminator may still be
            // in flight; keep everything until the CRLF arrives.
            let term_pos = match CRLF.find(&self.buf[marker_pos..]) {
                Some(pos) => marker_pos + pos,
                None => {
                    trace!(marker = marker_pos, "incomplete trailer, waiting for more data");
                    break;
                }
            };
            let frame_end = term_pos + FRAME_TERMINATOR.len();
            let frame: Vec<u8> = self.buf.drain(..frame_end).collect();

            if frame_checksum(&frame) != 0 {
                debug!(bytes = frame.len(), "dropped frame with nonzero checksum");
                continue;
            }

            let record = decode_frame(&frame);
            if record.is_empty() {
                trace!(bytes = frame.len(), "valid frame carried no fields");
                continue;
            }
            records.push(record);
        }

        if self.buf.len() > self.buffer_limit {
            warn!(
                buffered = self.buf.len(),
                limit = self.buffer_limit,
                "no frame resolved within buffer limit, discarding buffered bytes"
            );
            self.buf.clear();
        }

        records
    }
}

const READ_BUF_SIZE: usize = 4 * 1024;

/// Pull adapter: drives a [`StreamParser`] from any `Read` source
/// (serial device node, dump file, stdin) and yields records as they
/// resolve.
pub struct RecordIterator<R> {
    reader: R,
    parser: StreamParser,
    ready: VecDeque<TelemetryRecord>,
    eof: bool,
}

impl<R: Read> RecordIterator<R> {
    pub fn new(reader: R) -> Self {
        Self::with_parser(reader, StreamParser::new())
    }

    pub fn with_parser(reader: R, parser: StreamParser) -> Self {
        RecordIterator {
            reader,
            parser,
            ready: VecDeque::new(),
            eof: false,
        }
    }
}

impl<R: Read> Iterator for RecordIterator<R> {
    type Item = std::io::Result<TelemetryRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.ready.pop_front() {
                return Some(Ok(record));
            }
            if self.eof {
                return None;
            }

            let mut chunk = [0u8; READ_BUF_SIZE];
            let n = match self.reader.read(&mut chunk) {
                Ok(n) => n,
                Err(e) => return Some(Err(e)),
            };
            if n == 0 {
                self.eof = true;
                continue;
            }
            self.ready.extend(self.parser.process(&chunk[..n]));
        }
    }
}
