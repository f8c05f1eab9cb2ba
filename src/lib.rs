pub mod checksum;
pub mod influx;
pub mod parser;
pub mod record;
pub mod types;

pub use checksum::frame_checksum;
pub use influx::PointBuilder;
pub use parser::{RecordIterator, StreamParser};
pub use record::decode_frame;
pub use types::TelemetryRecord;
