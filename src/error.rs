use thiserror::Error;

/// Errors that abort a linkage run.
///
/// Only structural problems are represented here: unreadable files, malformed
/// CSV/XML, or a relation missing a required column. Per-record anomalies
/// (a name without a match, an empty aggregate, an excluded catalog entity)
/// are never errors; they resolve to nulls or skips so that one bad record
/// cannot abort an otherwise-valid batch.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed source: {0}")]
    MalformedSource(String),
}

pub type Result<T> = std::result::Result<T, LinkError>;
