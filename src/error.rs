use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SegwayError {
    #[error("portal request for {path} failed: {message}")]
    PortalHttp { path: String, message: String },

    #[error("portal returned status {status} for {path}: {message}")]
    PortalStatus {
        path: String,
        status: u16,
        message: String,
    },

    #[error("portal returned an unusable body for {path}: {message}")]
    PortalBody { path: String, message: String },

    #[error("{0}")]
    #[diagnostic(help("check the accession, assay names, chip targets and parameters"))]
    Configuration(String),

    #[error("{0}")]
    #[diagnostic(help(
        "the dataset graph is ambiguous; skip the assay or narrow the chip targets"
    ))]
    Selection(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("invalid RGB value {0}: must be between 0 and 255 inclusive")]
    InvalidColor(i64),

    #[error("no color assigned to label {0}")]
    UnknownLabel(String),

    #[error("malformed BED row {line}: {message}")]
    BedFormat { line: usize, message: String },
}

impl SegwayError {
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SegwayError::PortalHttp { .. }
                | SegwayError::PortalStatus { .. }
                | SegwayError::PortalBody { .. }
        )
    }
}
