//! # flatrow - Records to Delimited Rows
//!
//! Flattens structured records into tabular rows under a configurable tag
//! scheme, optionally expanding one record into many rows across nested
//! sequences.
//!
//! ## Modules
//!
//! - **tag**: parse and query member annotations (`csv:"id" PK:"yes"`)
//! - **record**: describe values as a node tree the engine can walk
//! - **flatten**: the walker, the expander and the row writer
//! - **sql**: MySQL statements generated from a column manifest
//!
//! ## Quick Start
//!
//! ```rust
//! use flatrow::{record, Expander, FlattenConfig};
//!
//! struct Item {
//!     name: String,
//!     qty: u32,
//! }
//!
//! record!(Item {
//!     name => r#"csv:"name""#,
//!     qty => r#"csv:"qty""#,
//! });
//!
//! struct Order {
//!     id: String,
//!     items: Vec<Item>,
//! }
//!
//! record!(Order {
//!     id => r#"csv:"id""#,
//!     items => "",
//! });
//!
//! # fn main() -> flatrow::Result<()> {
//! let order = Order {
//!     id: "x1".into(),
//!     items: vec![
//!         Item { name: "a".into(), qty: 2 },
//!         Item { name: "b".into(), qty: 5 },
//!     ],
//! };
//!
//! let config = FlattenConfig::default().with_expand_paths(["items"]);
//! let expansion = Expander::new(&config)?.expand_all(&order)?;
//!
//! // rows: x1,a,2 and x1,b,5
//! assert_eq!(expansion.rows.len(), 2);
//! assert_eq!(expansion.manifest.names(), vec!["id", "name", "qty"]);
//!
//! let text = flatrow::to_string_with(&order, config)?;
//! assert_eq!(text, "x1,a,2\nx1,b,5\n");
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod flatten;
pub mod record;
pub mod sql;
pub mod tag;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{Error, Result};
pub use flatten::{
    flatten, to_string, to_string_with, walk, Encoder, ExpandPath, Expander, Expansion, RowWriter,
};
pub use record::{JsonRecord, Member, Node, Record, Scalar, Shape};
pub use sql::SqlCmd;
pub use tag::{AttrKey, Tag};
pub use types::{Column, Field, Fields, FlattenConfig, LineBreak, Manifest};

#[doc(hidden)]
pub mod __private {
    pub use once_cell::sync::Lazy;
}
