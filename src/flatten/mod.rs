//! Record flattening - turn nested records into delimited rows
//!
//! The walker turns one record into one row. The expander repeats the walk
//! over every combination of elements along the configured paths, which is
//! how a record holding sequences becomes several rows sharing a prefix.

pub mod expander;
pub mod path;
pub mod walker;
pub mod writer;

pub use expander::{Expander, Expansion};
pub use path::ExpandPath;
pub use walker::{flatten, render, walk};
pub use writer::{escape, to_string, to_string_with, Encoder, RowWriter};
