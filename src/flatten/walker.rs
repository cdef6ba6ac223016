use crate::record::{Node, Record, Scalar};
use crate::tag::Tag;
use crate::types::{Field, Fields, FlattenConfig};
use chrono::NaiveDateTime;
use std::fmt::Write;

const FALLBACK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Flatten a record into one row without expanding any sequence
pub fn flatten<R: Record + ?Sized>(record: &R, config: &FlattenConfig) -> Fields {
    walk(&record.to_node(), config)
}

/// Walk a node depth-first and collect its included leaves
pub fn walk(node: &Node<'_>, config: &FlattenConfig) -> Fields {
    let mut walker = Walker {
        config,
        tags: Vec::new(),
        fields: Fields::new(),
    };
    walker.visit(node);
    walker.fields
}

/// Text of a leaf value as it appears in a row
pub fn render(scalar: &Scalar<'_>, config: &FlattenConfig) -> String {
    match scalar {
        Scalar::Text(s) => s.to_string(),
        Scalar::Bool(true) => "1".to_string(),
        Scalar::Bool(false) => "0".to_string(),
        Scalar::Int(i) => i.to_string(),
        Scalar::UInt(u) => u.to_string(),
        Scalar::Float(f) => f.to_string(),
        Scalar::Timestamp(ts) => format_timestamp(ts, &config.time_format),
    }
}

fn format_timestamp(ts: &NaiveDateTime, format: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", ts.format(format)).is_err() {
        // FlattenConfig::validate rejects these up front; plain walks fall back
        out.clear();
        let _ = write!(out, "{}", ts.format(FALLBACK_TIME_FORMAT));
    }
    out
}

struct Walker<'c, 'n> {
    config: &'c FlattenConfig,
    /// Tags from the root down to the member being visited
    tags: Vec<&'n Tag>,
    fields: Fields,
}

impl<'c, 'n> Walker<'c, 'n> {
    fn visit(&mut self, node: &'n Node<'_>) {
        match node {
            Node::Optional(None) => {}
            Node::Optional(Some(inner)) => self.visit(inner),
            // Sequences only show up through expansion
            Node::Sequence(_) => {}
            Node::Leaf(scalar) => {
                let value = render(scalar, self.config);
                self.emit(value);
            }
            Node::Compound(members) => {
                let key = self.config.tag_key.as_str();
                for member in members {
                    if member.tag.is_excluded(key) {
                        continue;
                    }
                    if !member.tag.has(key) && !member.node.is_compound() {
                        continue;
                    }
                    self.tags.push(&member.tag);
                    self.visit(&member.node);
                    self.tags.pop();
                }
            }
        }
    }

    fn emit(&mut self, value: String) {
        let tag = self.tags.last().map(|t| (*t).clone()).unwrap_or_default();
        let name = self.qualified_name();
        self.fields.push(Field { name, value, tag });
    }

    fn qualified_name(&self) -> String {
        let key = self.config.tag_key.as_str();
        let mut name = String::new();
        for segment in self.tags.iter().map(|t| t.get(key)).filter(|s| !s.is_empty()) {
            if !name.is_empty() {
                name.push_str(&self.config.name_separator);
            }
            name.push_str(segment);
        }
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;
    use chrono::NaiveDate;

    struct Inner {
        v3: i32,
    }

    record!(Inner { v3 => r#"csv:"v3""# });

    struct Middle {
        v2: String,
        s2: Inner,
    }

    record!(Middle {
        v2 => r#"csv:"v2""#,
        s2 => "",
    });

    struct Nested {
        v1: String,
        a1: i32,
        a2: i32,
        s1: Middle,
    }

    record!(Nested {
        v1 => r#"csv:"v1""#,
        a1 => r#"csv:"-""#,
        a2 => "",
        s1 => "",
    });

    fn nested() -> Nested {
        Nested {
            v1: "a".into(),
            a1: 7,
            a2: 8,
            s1: Middle {
                v2: "b".into(),
                s2: Inner { v3: 1 },
            },
        }
    }

    #[test]
    fn test_untagged_compounds_are_descended() {
        let fields = flatten(&nested(), &FlattenConfig::default());

        assert_eq!(fields.values(), vec!["a", "b", "1"]);
        assert_eq!(fields.names(), vec!["v1", "v2", "v3"]);
        assert_eq!(fields[2].tag.get("csv"), "v3");
    }

    struct Excluded {
        keep: String,
        drop: Middle,
        after: u8,
    }

    record!(Excluded {
        keep => r#"csv:"keep""#,
        drop => r#"csv:"-""#,
        after => r#"csv:"after""#,
    });

    #[test]
    fn test_exclusion_removes_subtree() {
        let value = Excluded {
            keep: "k".into(),
            drop: Middle {
                v2: "hidden".into(),
                s2: Inner { v3: 9 },
            },
            after: 3,
        };

        let fields = flatten(&value, &FlattenConfig::default());
        assert_eq!(fields.names(), vec!["keep", "after"]);
        assert_eq!(fields.values(), vec!["k", "3"]);
    }

    struct Leaves {
        flag: bool,
        off: bool,
        ratio: f64,
        small: f32,
        at: NaiveDateTime,
        maybe: Option<i64>,
        missing: Option<Inner>,
        list: Vec<Inner>,
        empty: String,
    }

    record!(Leaves {
        flag => r#"csv:"flag""#,
        off => r#"csv:"off""#,
        ratio => r#"csv:"ratio""#,
        small => r#"csv:"small""#,
        at => r#"csv:"at""#,
        maybe => r#"csv:"maybe""#,
        missing => r#"csv:"missing""#,
        list => r#"csv:"list""#,
        empty => r#"csv:"empty""#,
    });

    fn leaves() -> Leaves {
        Leaves {
            flag: true,
            off: false,
            ratio: 2.5,
            small: 1.1,
            at: NaiveDate::from_ymd_opt(2016, 3, 4)
                .unwrap()
                .and_hms_milli_opt(5, 6, 7, 89)
                .unwrap(),
            maybe: Some(0),
            missing: None,
            list: vec![Inner { v3: 1 }],
            empty: String::new(),
        }
    }

    #[test]
    fn test_leaf_rendering() {
        let fields = flatten(&leaves(), &FlattenConfig::default());

        assert_eq!(
            fields.names(),
            vec!["flag", "off", "ratio", "small", "at", "maybe", "empty"]
        );
        assert_eq!(
            fields.values(),
            vec!["1", "0", "2.5", "1.1", "2016-03-04 05:06:07.089", "0", ""]
        );
    }

    #[test]
    fn test_absent_optional_drops_columns() {
        let mut value = leaves();
        let with = flatten(&value, &FlattenConfig::default()).len();
        value.maybe = None;
        let without = flatten(&value, &FlattenConfig::default()).len();

        assert_eq!(with, without + 1);
    }

    #[test]
    fn test_custom_time_format() {
        let config = FlattenConfig::default().with_time_format("%Y%m%d");
        let fields = flatten(&leaves(), &config);
        assert_eq!(fields[4].value, "20160304");
    }

    #[test]
    fn test_tag_key_selects_scheme() {
        struct Dual {
            a: u8,
            b: u8,
        }
        record!(Dual {
            a => r#"csv:"a" table:"col_a""#,
            b => r#"table:"col_b""#,
        });

        let value = Dual { a: 1, b: 2 };
        let csv = flatten(&value, &FlattenConfig::default());
        let table = flatten(&value, &FlattenConfig::default().with_tag_key("table"));

        assert_eq!(csv.names(), vec!["a"]);
        assert_eq!(table.names(), vec!["col_a", "col_b"]);
    }

    #[test]
    fn test_nested_tag_names_concatenate() {
        struct Outer {
            inner: Inner,
        }
        record!(Outer { inner => r#"csv:"in_""# });

        let value = Outer { inner: Inner { v3: 4 } };
        assert_eq!(flatten(&value, &FlattenConfig::default()).names(), vec!["in_v3"]);

        let dotted = FlattenConfig::default().with_name_separator(".");
        let value = Outer { inner: Inner { v3: 4 } };
        let named = flatten(&value, &dotted);
        assert_eq!(named.names(), vec!["in_.v3"]);
    }

    #[test]
    fn test_float_rendering_is_positional() {
        let config = FlattenConfig::default();
        assert_eq!(render(&Scalar::Float(1e21), &config), "1000000000000000000000");
        assert_eq!(render(&Scalar::Float(0.1), &config), "0.1");
        assert_eq!(render(&Scalar::Float(-3.0), &config), "-3");
    }

    #[test]
    fn test_scalar_root() {
        let fields = flatten(&42u32, &FlattenConfig::default());
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "");
        assert_eq!(fields[0].value, "42");
    }
}
