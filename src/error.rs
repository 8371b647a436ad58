use std::borrow::Cow;
use std::fmt;
use std::io;

/// Result type used across the streaming SAS reader.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type surfaced by the streaming SAS reader.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O failure while reading from the underlying data source.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The file appears to be corrupt or inconsistent while processing a section.
    #[error("corrupted SAS file while processing {section}: {details}")]
    Corrupted {
        section: Section,
        details: Cow<'static, str>,
    },

    /// SAS features the reader declines to decode.
    #[error("unsupported SAS feature: {feature}")]
    Unsupported { feature: Cow<'static, str> },

    /// Metadata or schema could not be interpreted according to expectations.
    #[error("invalid SAS metadata: {details}")]
    InvalidMetadata { details: Cow<'static, str> },

    /// A bundled consumer failed to write its output.
    #[error("sink error: {details}")]
    Sink { details: Cow<'static, str> },
}

impl Error {
    pub(crate) fn corrupted(section: Section, details: impl Into<Cow<'static, str>>) -> Self {
        Self::Corrupted {
            section,
            details: details.into(),
        }
    }

    pub(crate) fn invalid_metadata(details: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidMetadata {
            details: details.into(),
        }
    }

    /// Returns `true` when the error stems from the input bytes rather than
    /// from I/O or an output sink.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::Corrupted { .. } | Self::Unsupported { .. } | Self::InvalidMetadata { .. }
        )
    }
}

/// Logical section of the parser used for diagnostic reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Section {
    Header,
    Page { index: u64 },
    Subheader { name: &'static str },
    Column { index: usize },
    Row { page_index: u64, row: usize },
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header => write!(f, "file header"),
            Self::Page { index } => write!(f, "page {index}"),
            Self::Subheader { name } => write!(f, "{name} subheader"),
            Self::Column { index } => write!(f, "column {index}"),
            Self::Row { page_index, row } => write!(f, "row {row} on page {page_index}"),
        }
    }
}
