use std::fmt;

use crate::error::{Error, Result};

const SIG_ROW_SIZE: u32 = 0xF7F7_F7F7;
const SIG_COLUMN_SIZE: u32 = 0xF6F6_F6F6;
const SIG_COLUMN_TEXT: u32 = 0xFFFF_FFFD;
const SIG_COLUMN_ATTRS: u32 = 0xFFFF_FFFC;
const SIG_COLUMN_NAME: u32 = 0xFFFF_FFFF;
const SIG_COLUMN_LABELS: u32 = 0xFFFF_FBFE;

/// Tag carried in the first four bytes of a subheader block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signature {
    RowSize,
    ColumnSize,
    ColumnText,
    ColumnAttrs,
    ColumnName,
    ColumnLabels,
    Unknown(u32),
}

impl Signature {
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            SIG_ROW_SIZE => Self::RowSize,
            SIG_COLUMN_SIZE => Self::ColumnSize,
            SIG_COLUMN_TEXT => Self::ColumnText,
            SIG_COLUMN_ATTRS => Self::ColumnAttrs,
            SIG_COLUMN_NAME => Self::ColumnName,
            SIG_COLUMN_LABELS => Self::ColumnLabels,
            other => Self::Unknown(other),
        }
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        match self {
            Self::RowSize => SIG_ROW_SIZE,
            Self::ColumnSize => SIG_COLUMN_SIZE,
            Self::ColumnText => SIG_COLUMN_TEXT,
            Self::ColumnAttrs => SIG_COLUMN_ATTRS,
            Self::ColumnName => SIG_COLUMN_NAME,
            Self::ColumnLabels => SIG_COLUMN_LABELS,
            Self::Unknown(raw) => raw,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RowSize => "ROWSIZE",
            Self::ColumnSize => "COLSIZE",
            Self::ColumnText => "COLTEXT",
            Self::ColumnAttrs => "COLATTR",
            Self::ColumnName => "COLNAME",
            Self::ColumnLabels => "COLLABS",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(raw) => write!(f, "unknown signature 0x{raw:08X}"),
            known => f.write_str(known.name()),
        }
    }
}

/// Raw subheader block copied out of a metadata page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubHeader {
    pub signature: Signature,
    pub page_index: u64,
    pub data: Vec<u8>,
}

impl SubHeader {
    #[must_use]
    pub fn new(page_index: u64, data: Vec<u8>) -> Self {
        let raw = data
            .get(..4)
            .map_or(0, |sig| u32::from_le_bytes([sig[0], sig[1], sig[2], sig[3]]));
        Self {
            signature: Signature::from_raw(raw),
            page_index,
            data,
        }
    }
}

/// Subheaders collected from metadata pages until the schema is assembled.
/// Kept in discovery order; dropped as a whole once the schema resolves.
#[derive(Debug, Default)]
pub struct SubheaderArena {
    subheaders: Vec<SubHeader>,
}

impl SubheaderArena {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            subheaders: Vec::new(),
        }
    }

    pub fn push(&mut self, subheader: SubHeader) {
        self.subheaders.push(subheader);
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.subheaders.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.subheaders.is_empty()
    }

    /// Every subheader carrying `signature`, in discovery order.
    pub fn all(&self, signature: Signature) -> impl Iterator<Item = &SubHeader> {
        self.subheaders
            .iter()
            .filter(move |sub| sub.signature == signature)
    }

    #[must_use]
    pub fn count(&self, signature: Signature) -> usize {
        self.all(signature).count()
    }

    /// The unique subheader carrying `signature`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMetadata`] when the subheader is absent or
    /// appears more than once.
    pub fn single(&self, signature: Signature) -> Result<&SubHeader> {
        let mut matches = self.all(signature);
        let first = matches.next().ok_or_else(|| {
            Error::invalid_metadata(format!("could not find sub header: {}", signature.name()))
        })?;
        let extra = matches.count();
        if extra > 0 {
            return Err(Error::invalid_metadata(format!(
                "multiple ({}) instances of the same sub header: {}",
                extra + 1,
                signature.name()
            )));
        }
        Ok(first)
    }
}
