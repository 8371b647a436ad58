use std::fmt;

use encoding_rs::Encoding;
use serde::Serialize;
use time::OffsetDateTime;

/// Immutable description of the file prologue.
#[derive(Debug, Clone)]
pub struct FileHeader {
    pub word_size: WordSize,
    /// Extra padding (0 or 4 bytes) inserted before the timestamp block.
    pub pad_alignment: usize,
    pub platform: Platform,
    pub encoding: &'static Encoding,
    pub sas_release: String,
    pub sas_host: String,
    pub os_version: String,
    pub os_maker: String,
    pub os_name: String,
    pub dataset_name: Option<String>,
    pub file_type: Option<String>,
    pub timestamps: DatasetTimestamps,
    pub header_length: usize,
    pub page_size: usize,
    pub page_count: u64,
}

/// Dataset creation and modification times.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatasetTimestamps {
    pub created: Option<OffsetDateTime>,
    pub modified: Option<OffsetDateTime>,
}

/// Structural layout selected by the header: drives the width of most
/// offsets and lengths in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WordSize {
    Bit32,
    Bit64,
}

impl WordSize {
    /// Width in bytes of word-sized integer fields.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::Bit32 => 4,
            Self::Bit64 => 8,
        }
    }

    #[must_use]
    pub const fn is_64(self) -> bool {
        matches!(self, Self::Bit64)
    }

    /// Picks the 32-bit or 64-bit variant of a layout constant.
    #[must_use]
    pub const fn pick(self, bit32: usize, bit64: usize) -> usize {
        match self {
            Self::Bit32 => bit32,
            Self::Bit64 => bit64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Unix,
    Windows,
    Unknown,
}

impl Platform {
    #[must_use]
    pub const fn from_flag(flag: u8) -> Self {
        match flag {
            b'1' => Self::Unix,
            b'2' => Self::Windows,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unix => "unix",
            Self::Windows => "windows",
            Self::Unknown => "unknown",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Numeric,
    Character,
}

impl ColumnType {
    #[must_use]
    pub const fn from_type_code(code: u8) -> Self {
        if code == 1 {
            Self::Numeric
        } else {
            Self::Character
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Numeric => "numeric",
            Self::Character => "character",
        })
    }
}

/// Column metadata assembled from the meta pages. Built once per pass and
/// shared read-only by every row decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    pub index: usize,
    pub name: String,
    pub label: Option<String>,
    pub format: Option<String>,
    /// Byte offset of the field within a row.
    pub offset: usize,
    /// Stored width in bytes; zero means every value is missing.
    pub length: usize,
    pub column_type: ColumnType,
}

impl ColumnDescriptor {
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self.column_type, ColumnType::Numeric)
    }
}
