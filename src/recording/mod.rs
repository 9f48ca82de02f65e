//! Recording of detected frames and export to file

mod export;
mod recorder;

pub use export::{export_file_name, export_sequence, write_sequence};
pub use recorder::Recorder;
