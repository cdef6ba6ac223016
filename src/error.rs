use thiserror::Error;

/// Errors reported by the walker, the expander and the row writer
#[derive(Debug, Error)]
pub enum Error {
    /// An expansion path does not lead through compounds to a sequence
    #[error("cannot expand path `{path}`: {reason}")]
    Shape { path: String, reason: String },

    /// Expansion was requested without any declared path
    #[error("expansion path should not be empty")]
    EmptyPath,

    /// Delimiter the row writer cannot emit as a single byte
    #[error("invalid delimiter {0:?}: expected a single ASCII character other than a quote or line break")]
    InvalidDelimiter(char),

    /// chrono format string that cannot render a timestamp
    #[error("invalid time format `{0}`")]
    InvalidTimeFormat(String),

    #[error("failed to write row: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn shape(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Shape {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
