//! Error types for plotbook operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while preparing data, rendering a chart or writing it out.
///
/// Every error is local to the chart being generated; the batch runner in
/// [`crate::recipes`] records it and moves on to the next recipe.
#[derive(Error, Debug)]
pub enum Error {
    /// A pipeline step referenced a column its input does not have, or a
    /// column of the wrong kind (e.g. averaging a text column).
    #[error("schema mismatch on column '{column}': {reason}")]
    SchemaMismatch { column: String, reason: String },

    /// An expression (filter, derived column, highlight) failed to parse or
    /// evaluate.
    #[error("invalid expression '{input}': {message}")]
    Expression { input: String, message: String },

    /// The chart specification is incomplete or inconsistent.
    #[error("invalid chart specification: {0}")]
    InvalidSpec(String),

    /// An argument to a preparation verb is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The dataset could not be loaded.
    #[error("dataset error: {0}")]
    Dataset(String),

    /// The drawing backend failed.
    #[error("rendering failed: {0}")]
    Render(String),

    /// The output file extension is not a format we can write.
    #[error("unsupported output format '{0}' (expected png or svg)")]
    UnsupportedFormat(String),

    /// The artifact could not be written.
    #[error("failed to write '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Whitespace trimming is not possible for this artifact. Non-fatal: the
    /// untrimmed file is kept.
    #[error("whitespace trimming unavailable for '{}': {reason}", path.display())]
    PostProcessUnavailable { path: PathBuf, reason: String },
}

impl Error {
    pub(crate) fn missing_column(column: &str, available: &[String]) -> Self {
        Error::SchemaMismatch {
            column: column.to_string(),
            reason: format!("not found (available: {})", available.join(", ")),
        }
    }

    pub(crate) fn render<E: std::fmt::Display>(err: E) -> Self {
        Error::Render(err.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::Dataset(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Dataset(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_lists_available() {
        let err = Error::missing_column("petal", &["species".to_string(), "sepal_length".to_string()]);
        let msg = err.to_string();
        assert!(msg.contains("petal"));
        assert!(msg.contains("species, sepal_length"));
    }

    #[test]
    fn test_post_process_message_names_file() {
        let warn = Error::PostProcessUnavailable {
            path: PathBuf::from("bar1.svg"),
            reason: "vector output".to_string(),
        };
        let msg = warn.to_string();
        assert!(msg.contains("bar1.svg"));
        assert!(msg.contains("vector output"));
    }
}
