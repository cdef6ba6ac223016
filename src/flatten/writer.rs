use crate::error::{Error, Result};
use crate::flatten::expander::Expander;
use crate::flatten::walker::flatten;
use crate::record::Record;
use crate::types::{delimiter_byte, Fields, FlattenConfig, LineBreak, Manifest};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use std::borrow::Cow;
use std::io::Write;

/// Writes rows as delimited text
///
/// Tabs and newlines inside a value become the two-character sequences
/// `\t` and `\n`; the csv writer then quotes values that still need it.
pub struct RowWriter<W: Write> {
    inner: csv::Writer<W>,
}

impl<W: Write> RowWriter<W> {
    pub fn new(writer: W, config: &FlattenConfig) -> Result<Self> {
        let terminator = match config.line_break {
            LineBreak::Lf => Terminator::Any(b'\n'),
            LineBreak::CrLf => Terminator::CRLF,
        };
        let inner = WriterBuilder::new()
            .delimiter(delimiter_byte(config.delimiter)?)
            .terminator(terminator)
            .quote_style(QuoteStyle::Necessary)
            .has_headers(false)
            // Absent optionals make row widths vary
            .flexible(true)
            .from_writer(writer);
        Ok(RowWriter { inner })
    }

    pub fn write_row(&mut self, fields: &Fields) -> Result<()> {
        self.inner
            .write_record(fields.iter().map(|f| escape(&f.value).into_owned()))?;
        Ok(())
    }

    /// Write the manifest names as a header line
    pub fn write_names(&mut self, manifest: &Manifest) -> Result<()> {
        self.inner.write_record(manifest.names())?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W> {
        self.inner.into_inner().map_err(|e| {
            let err = e.error();
            Error::Io(std::io::Error::new(err.kind(), err.to_string()))
        })
    }
}

pub fn escape(value: &str) -> Cow<'_, str> {
    if !value.contains(['\t', '\n']) {
        return Cow::Borrowed(value);
    }
    Cow::Owned(value.replace('\t', "\\t").replace('\n', "\\n"))
}

/// Encodes records as rows under one configuration
///
/// With no expansion paths each record becomes exactly one row, otherwise
/// one row per combination. The manifest of the first row written is kept
/// for header and schema generation.
pub struct Encoder<W: Write> {
    rows: RowWriter<W>,
    config: FlattenConfig,
    manifest: Option<Manifest>,
    header_pending: bool,
}

impl<W: Write> Encoder<W> {
    pub fn new(writer: W) -> Result<Self> {
        Self::with_config(writer, FlattenConfig::default())
    }

    pub fn with_config(writer: W, config: FlattenConfig) -> Result<Self> {
        config.validate()?;
        Ok(Encoder {
            rows: RowWriter::new(writer, &config)?,
            config,
            manifest: None,
            header_pending: false,
        })
    }

    /// Write a header line of column names before the first row
    pub fn with_header(mut self, header: bool) -> Self {
        self.header_pending = header && self.manifest.is_none();
        self
    }

    pub fn config(&self) -> &FlattenConfig {
        &self.config
    }

    /// Encode one record, returning the number of rows written.
    ///
    /// The record's rows are collected before anything is written, so a
    /// record that fails to expand leaves the output, the header and the
    /// kept manifest untouched.
    pub fn encode<R: Record + ?Sized>(&mut self, record: &R) -> Result<usize> {
        let rows = if self.config.expand_paths.is_empty() {
            vec![flatten(record, &self.config)]
        } else {
            Expander::new(&self.config)?.expand_all(record)?.rows
        };

        for row in &rows {
            self.emit(row)?;
        }
        Ok(rows.len())
    }

    fn emit(&mut self, fields: &Fields) -> Result<()> {
        if self.manifest.is_none() {
            let first = fields.manifest();
            if self.header_pending {
                self.rows.write_names(&first)?;
                self.header_pending = false;
            }
            self.manifest = Some(first);
        }
        self.rows.write_row(fields)
    }

    /// Columns of the first row written so far
    pub fn fields(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.rows.flush()
    }

    pub fn into_inner(self) -> Result<W> {
        self.rows.into_inner()
    }
}

/// Encode one record with the default configuration
pub fn to_string<R: Record + ?Sized>(record: &R) -> Result<String> {
    to_string_with(record, FlattenConfig::default())
}

pub fn to_string_with<R: Record + ?Sized>(record: &R, config: FlattenConfig) -> Result<String> {
    let mut encoder = Encoder::with_config(Vec::new(), config)?;
    encoder.encode(record)?;
    let bytes = encoder.into_inner()?;
    String::from_utf8(bytes)
        .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;

    struct Item {
        name: String,
        qty: u32,
    }

    record!(Item {
        name => r#"csv:"name""#,
        qty => r#"csv:"qty""#,
    });

    struct Order {
        id: String,
        note: String,
        items: Vec<Item>,
    }

    record!(Order {
        id => r#"csv:"id""#,
        note => r#"csv:"note""#,
        items => "",
    });

    fn order(note: &str) -> Order {
        Order {
            id: "x1".into(),
            note: note.into(),
            items: vec![
                Item { name: "a".into(), qty: 2 },
                Item { name: "b".into(), qty: 5 },
            ],
        }
    }

    #[test]
    fn test_to_string_plain_walk() {
        let output = to_string(&order("n")).unwrap();
        assert_eq!(output, "x1,n\n");
    }

    #[test]
    fn test_expanded_rows_with_header() {
        let config = FlattenConfig::default().with_expand_paths(["items"]);
        let mut encoder = Encoder::with_config(Vec::new(), config)
            .unwrap()
            .with_header(true);

        assert_eq!(encoder.encode(&order("n")).unwrap(), 2);
        assert_eq!(encoder.encode(&order("m")).unwrap(), 2);
        assert_eq!(
            encoder.fields().unwrap().names(),
            vec!["id", "note", "name", "qty"]
        );

        let output = String::from_utf8(encoder.into_inner().unwrap()).unwrap();
        assert_eq!(
            output,
            "id,note,name,qty\nx1,n,a,2\nx1,n,b,5\nx1,m,a,2\nx1,m,b,5\n"
        );
    }

    #[test]
    fn test_tabs_and_newlines_are_escaped() {
        let config = FlattenConfig::default().with_delimiter('\t');
        let output = to_string_with(&order("line1\nline2\tend"), config).unwrap();
        assert_eq!(output, "x1\tline1\\nline2\\tend\n");
    }

    #[test]
    fn test_delimiter_in_value_is_quoted() {
        let output = to_string(&order("a,b \"c\"")).unwrap();
        assert_eq!(output, "x1,\"a,b \"\"c\"\"\"\n");
    }

    #[test]
    fn test_crlf_line_break() {
        let config = FlattenConfig::default()
            .with_line_break(LineBreak::CrLf)
            .with_delimiter(';');
        let output = to_string_with(&order("n"), config).unwrap();
        assert_eq!(output, "x1;n\r\n");
    }

    #[test]
    fn test_invalid_delimiter_rejected() {
        let config = FlattenConfig::default().with_delimiter('\u{2603}');
        assert!(matches!(
            Encoder::with_config(Vec::new(), config),
            Err(Error::InvalidDelimiter(_))
        ));
    }

    #[test]
    fn test_encode_into_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = FlattenConfig::default().with_expand_paths(["items"]);
        let mut encoder = Encoder::with_config(file.reopen().unwrap(), config)
            .unwrap()
            .with_header(true);

        encoder.encode(&order("n")).unwrap();
        encoder.flush().unwrap();

        let written = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(written.lines().count(), 3);
        assert!(written.starts_with("id,note,name,qty\n"));
    }

    struct Batch {
        id: String,
        parts: Option<Vec<Item>>,
    }

    record!(Batch {
        id => r#"csv:"id""#,
        parts => "",
    });

    struct Shipment {
        ref_no: String,
        batches: Vec<Batch>,
    }

    record!(Shipment {
        ref_no => r#"csv:"ref""#,
        batches => "",
    });

    #[test]
    fn test_failed_record_writes_nothing() {
        let config = FlattenConfig::default().with_expand_paths(["batches", "parts"]);
        let mut encoder = Encoder::with_config(Vec::new(), config)
            .unwrap()
            .with_header(true);

        let broken = Shipment {
            ref_no: "s1".into(),
            batches: vec![
                Batch {
                    id: "b1".into(),
                    parts: Some(vec![Item { name: "a".into(), qty: 1 }]),
                },
                Batch { id: "b2".into(), parts: None },
            ],
        };
        assert!(matches!(encoder.encode(&broken), Err(Error::Shape { .. })));
        assert!(encoder.fields().is_none());

        let good = Shipment {
            ref_no: "s2".into(),
            batches: vec![Batch {
                id: "b3".into(),
                parts: Some(vec![Item { name: "c".into(), qty: 4 }]),
            }],
        };
        assert_eq!(encoder.encode(&good).unwrap(), 1);

        let output = String::from_utf8(encoder.into_inner().unwrap()).unwrap();
        assert_eq!(output, "ref,id,name,qty\ns2,b3,c,4\n");
    }

    #[test]
    fn test_single_empty_value_is_quoted() {
        struct One {
            a: String,
        }
        record!(One { a => r#"csv:"a""# });

        // csv writes a lone empty field as a quoted empty string
        assert_eq!(to_string(&One { a: String::new() }).unwrap(), "\"\"\n");

        let two = order("");
        assert_eq!(to_string(&two).unwrap(), "x1,\n");
    }

    #[test]
    fn test_escape_borrows_clean_values() {
        assert!(matches!(escape("plain"), Cow::Borrowed("plain")));
        assert_eq!(escape("a\tb\nc"), "a\\tb\\nc");
    }
}
