//! Text sources and intermediate list files.

mod text;

pub use text::{collect_sorted, read_list, write_list, write_v2fly_list, ListFile, ListParser};
