//! Record descriptors
//!
//! Anything that can be flattened describes itself as a [`Node`] tree over a
//! closed set of variants. The walker and the expander only ever look at
//! nodes, so a new record shape needs a [`Record`] impl and nothing else.
//!
//! Structs normally get their impl from the [`record!`](crate::record!) macro,
//! which parses the member tags once per type:
//!
//! ```rust
//! use flatrow::{record, FlattenConfig};
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
//! let item = Item { name: "a".into(), qty: 2 };
//! let fields = flatrow::flatten(&item, &FlattenConfig::default());
//! assert_eq!(fields.values(), vec!["a", "2"]);
//! ```

use crate::tag::{AttrKey, Tag};
use chrono::{DateTime, NaiveDateTime, TimeZone};
use serde_json::Value;
use std::borrow::Cow;

/// Leaf value before rendering
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar<'a> {
    Text(Cow<'a, str>),
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    /// Encoded atomically with the configured time format
    Timestamp(NaiveDateTime),
}

/// Structural description of a value
#[derive(Debug, Clone, PartialEq)]
pub enum Node<'a> {
    Leaf(Scalar<'a>),
    /// Named members in declaration order
    Compound(Vec<Member<'a>>),
    /// Repeated elements; only the expander looks inside
    Sequence(Vec<Node<'a>>),
    /// `None` contributes nothing to a walk
    Optional(Option<Box<Node<'a>>>),
}

impl<'a> Node<'a> {
    pub fn compound() -> CompoundBuilder<'a> {
        CompoundBuilder::default()
    }

    pub fn is_compound(&self) -> bool {
        matches!(self, Node::Compound(_))
    }

    pub fn member(&self, name: &str) -> Option<&Member<'a>> {
        match self {
            Node::Compound(members) => members.iter().find(|m| m.name == name),
            _ => None,
        }
    }

    /// Short variant name used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Leaf(Scalar::Timestamp(_)) => "timestamp",
            Node::Leaf(_) => "scalar",
            Node::Compound(_) => "compound",
            Node::Sequence(_) => "sequence",
            Node::Optional(_) => "optional",
        }
    }
}

/// One member of a compound
#[derive(Debug, Clone, PartialEq)]
pub struct Member<'a> {
    /// Member name, as addressed by expansion paths
    pub name: Cow<'a, str>,
    pub tag: Tag,
    pub node: Node<'a>,
}

/// A value that can describe itself as a [`Node`] tree
pub trait Record {
    fn to_node(&self) -> Node<'_>;
}

/// Member names and parsed tags of one record type
///
/// Built once per type and kept in a `static`; see [`record!`](crate::record!).
#[derive(Debug, Clone)]
pub struct Shape {
    members: Vec<(&'static str, Tag)>,
}

impl Shape {
    pub fn new(members: &[(&'static str, &str)]) -> Self {
        Shape {
            members: members
                .iter()
                .map(|(name, tag)| (*name, Tag::parse(tag)))
                .collect(),
        }
    }

    /// Pair member values with this shape's names and tags.
    ///
    /// `values` must follow the member order the shape was built with.
    pub fn compound<'a>(&self, values: &[&'a dyn Record]) -> Node<'a> {
        debug_assert_eq!(self.members.len(), values.len());
        Node::Compound(
            self.members
                .iter()
                .zip(values)
                .map(|((name, tag), value)| Member {
                    name: Cow::Borrowed(*name),
                    tag: tag.clone(),
                    node: Record::to_node(*value),
                })
                .collect(),
        )
    }
}

/// Hand-written compound construction
#[derive(Debug, Default)]
pub struct CompoundBuilder<'a> {
    members: Vec<Member<'a>>,
}

impl<'a> CompoundBuilder<'a> {
    /// Add a member whose tag is written in annotation syntax
    pub fn member(self, name: &'a str, tag: &str, value: &'a dyn Record) -> Self {
        self.tagged(name, Tag::parse(tag), value)
    }

    pub fn tagged(mut self, name: &'a str, tag: Tag, value: &'a dyn Record) -> Self {
        self.members.push(Member {
            name: Cow::Borrowed(name),
            tag,
            node: value.to_node(),
        });
        self
    }

    pub fn build(self) -> Node<'a> {
        Node::Compound(self.members)
    }
}

/// Implement [`Record`] for a struct from its member list and tags.
///
/// Members are listed in declaration order; each maps to its annotation
/// string. Members left out of the list never reach a walk.
#[macro_export]
macro_rules! record {
    ($ty:ty { $($field:ident => $tag:expr),* $(,)? }) => {
        impl $crate::Record for $ty {
            fn to_node(&self) -> $crate::Node<'_> {
                static SHAPE: $crate::__private::Lazy<$crate::Shape> =
                    $crate::__private::Lazy::new(|| {
                        $crate::Shape::new(&[$((stringify!($field), $tag)),*])
                    });
                SHAPE.compound(&[$(&self.$field as &dyn $crate::Record),*])
            }
        }
    };
}

impl Record for str {
    fn to_node(&self) -> Node<'_> {
        Node::Leaf(Scalar::Text(Cow::Borrowed(self)))
    }
}

impl Record for String {
    fn to_node(&self) -> Node<'_> {
        Node::Leaf(Scalar::Text(Cow::Borrowed(self.as_str())))
    }
}

impl Record for bool {
    fn to_node(&self) -> Node<'_> {
        Node::Leaf(Scalar::Bool(*self))
    }
}

macro_rules! signed_record {
    ($($t:ty),*) => {$(
        impl Record for $t {
            fn to_node(&self) -> Node<'_> {
                Node::Leaf(Scalar::Int(*self as i64))
            }
        }
    )*};
}

macro_rules! unsigned_record {
    ($($t:ty),*) => {$(
        impl Record for $t {
            fn to_node(&self) -> Node<'_> {
                Node::Leaf(Scalar::UInt(*self as u64))
            }
        }
    )*};
}

macro_rules! display_record {
    ($($t:ty),*) => {$(
        impl Record for $t {
            fn to_node(&self) -> Node<'_> {
                Node::Leaf(Scalar::Text(Cow::Owned(self.to_string())))
            }
        }
    )*};
}

signed_record!(i8, i16, i32, i64, isize);
unsigned_record!(u8, u16, u32, u64, usize);
// f32 widened to f64 would print its binary expansion
display_record!(i128, u128, f32, char);

impl Record for f64 {
    fn to_node(&self) -> Node<'_> {
        Node::Leaf(Scalar::Float(*self))
    }
}

impl Record for NaiveDateTime {
    fn to_node(&self) -> Node<'_> {
        Node::Leaf(Scalar::Timestamp(*self))
    }
}

impl<Tz: TimeZone> Record for DateTime<Tz> {
    fn to_node(&self) -> Node<'_> {
        Node::Leaf(Scalar::Timestamp(self.naive_local()))
    }
}

impl<T: Record> Record for Option<T> {
    fn to_node(&self) -> Node<'_> {
        Node::Optional(self.as_ref().map(|v| Box::new(v.to_node())))
    }
}

impl<T: Record> Record for [T] {
    fn to_node(&self) -> Node<'_> {
        Node::Sequence(self.iter().map(|v| v.to_node()).collect())
    }
}

impl<T: Record, const N: usize> Record for [T; N] {
    fn to_node(&self) -> Node<'_> {
        self.as_slice().to_node()
    }
}

impl<T: Record> Record for Vec<T> {
    fn to_node(&self) -> Node<'_> {
        self.as_slice().to_node()
    }
}

impl<T: Record + ?Sized> Record for Box<T> {
    fn to_node(&self) -> Node<'_> {
        (**self).to_node()
    }
}

impl<T: Record + ?Sized> Record for &T {
    fn to_node(&self) -> Node<'_> {
        (**self).to_node()
    }
}

/// A JSON document viewed as a record
///
/// Every object member is tagged with its own key under `tag_key`, plus a
/// `TYPE` attribute inferred from the JSON value and `PK:"yes"` when the key
/// is listed as a primary key. `null` behaves as an absent optional.
pub struct JsonRecord<'a> {
    value: &'a Value,
    tag_key: &'a str,
    primary_keys: &'a [String],
}

impl<'a> JsonRecord<'a> {
    pub fn new(value: &'a Value, tag_key: &'a str) -> Self {
        JsonRecord {
            value,
            tag_key,
            primary_keys: &[],
        }
    }

    pub fn with_primary_keys(mut self, keys: &'a [String]) -> Self {
        self.primary_keys = keys;
        self
    }

    fn node_of<'v>(&self, value: &'v Value) -> Node<'v> {
        match value {
            Value::Null => Node::Optional(None),
            Value::Bool(b) => Node::Leaf(Scalar::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Node::Leaf(Scalar::Int(i))
                } else if let Some(u) = n.as_u64() {
                    Node::Leaf(Scalar::UInt(u))
                } else {
                    Node::Leaf(Scalar::Float(n.as_f64().unwrap_or_default()))
                }
            }
            Value::String(s) => Node::Leaf(Scalar::Text(Cow::Borrowed(s.as_str()))),
            Value::Array(items) => Node::Sequence(items.iter().map(|v| self.node_of(v)).collect()),
            Value::Object(map) => Node::Compound(
                map.iter()
                    .map(|(key, v)| Member {
                        name: Cow::Borrowed(key.as_str()),
                        tag: self.tag_for(key, v),
                        node: self.node_of(v),
                    })
                    .collect(),
            ),
        }
    }

    fn tag_for(&self, key: &str, value: &Value) -> Tag {
        let mut tag = Tag::builder().attr(self.tag_key, key);
        if let Some(sql_type) = sql_type_of(value) {
            tag = tag.attr(AttrKey::SqlType, sql_type);
        }
        if self.primary_keys.iter().any(|k| k == key) {
            tag = tag.attr(AttrKey::PrimaryKey, "yes");
        }
        tag.build()
    }
}

impl Record for JsonRecord<'_> {
    fn to_node(&self) -> Node<'_> {
        self.node_of(self.value)
    }
}

fn sql_type_of(value: &Value) -> Option<&'static str> {
    match value {
        Value::Bool(_) => Some("TINYINT(1)"),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some("BIGINT"),
        Value::Number(_) => Some("DOUBLE"),
        Value::String(_) => Some("VARCHAR(255)"),
        _ => None,
    }
}
