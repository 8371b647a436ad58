use super::byteorder::{read_u16, read_u8, read_word};
use super::subheader::SubHeader;
use crate::error::{Error, Result, Section};
use crate::metadata::WordSize;

const SAS_PAGE_TYPE_META: u8 = 0;
const SAS_PAGE_TYPE_DATA: u8 = 1;
const SAS_PAGE_TYPE_MIX: u8 = 2;
const SAS_PAGE_TYPE_AMD: u8 = 4;

const MIN_SUBHEADER_LEN: usize = 4;

/// Word-size dependent offsets of the page header and pointer table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLayout {
    word_size: WordSize,
}

impl PageLayout {
    #[must_use]
    pub const fn new(word_size: WordSize) -> Self {
        Self { word_size }
    }

    #[must_use]
    pub const fn word_size(self) -> WordSize {
        self.word_size
    }

    /// High byte of the 16-bit page type field.
    #[must_use]
    pub const fn page_type_offset(self) -> usize {
        self.word_size.pick(17, 33)
    }

    #[must_use]
    pub const fn block_count_offset(self) -> usize {
        self.word_size.pick(18, 34)
    }

    #[must_use]
    pub const fn subheader_count_offset(self) -> usize {
        self.word_size.pick(20, 36)
    }

    /// Start of the subheader pointer table, which is also where rows begin
    /// on pages without pointers.
    #[must_use]
    pub const fn pointer_table_offset(self) -> usize {
        self.word_size.pick(24, 40)
    }

    #[must_use]
    pub const fn pointer_size(self) -> usize {
        self.word_size.pick(12, 24)
    }
}

/// How a page is handled, decided once from its type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    /// Subheaders only.
    Meta,
    /// Rows only.
    Data,
    /// Subheaders followed by rows.
    Mix,
    /// Recognised but not decoded.
    Amd,
}

impl PageKind {
    #[must_use]
    pub const fn from_type_byte(byte: u8) -> Option<Self> {
        match byte {
            SAS_PAGE_TYPE_META => Some(Self::Meta),
            SAS_PAGE_TYPE_DATA => Some(Self::Data),
            SAS_PAGE_TYPE_MIX => Some(Self::Mix),
            SAS_PAGE_TYPE_AMD => Some(Self::Amd),
            _ => None,
        }
    }

    #[must_use]
    pub const fn has_subheaders(self) -> bool {
        matches!(self, Self::Meta | Self::Mix)
    }

    #[must_use]
    pub const fn has_rows(self) -> bool {
        matches!(self, Self::Data | Self::Mix)
    }
}

/// A page buffer classified by its type byte.
#[derive(Debug, Clone, Copy)]
pub struct Page<'a> {
    pub index: u64,
    pub kind: PageKind,
    pub bytes: &'a [u8],
    pub layout: PageLayout,
}

impl<'a> Page<'a> {
    /// Classifies a page buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corrupted`] naming the page index and observed type
    /// when the type byte is not one of the known page types.
    pub fn classify(index: u64, bytes: &'a [u8], layout: PageLayout) -> Result<Self> {
        let page_type = read_u8(bytes, layout.page_type_offset()).ok_or_else(|| {
            Error::corrupted(Section::Page { index }, "page too small for its header")
        })?;
        let kind = PageKind::from_type_byte(page_type).ok_or_else(|| {
            Error::corrupted(
                Section::Page { index },
                format!("page {index} has unknown type: {page_type}"),
            )
        })?;
        Ok(Self {
            index,
            kind,
            bytes,
            layout,
        })
    }

    const fn section(&self) -> Section {
        Section::Page { index: self.index }
    }

    /// Number of entries in the subheader pointer table.
    ///
    /// # Errors
    ///
    /// Returns an error if the page is too small to hold the field.
    pub fn subheader_count(&self) -> Result<usize> {
        read_u16(self.bytes, self.layout.subheader_count_offset())
            .map(usize::from)
            .ok_or_else(|| Error::corrupted(self.section(), "subheader count outside page"))
    }

    /// Row count stored in the header of a data page.
    ///
    /// # Errors
    ///
    /// Returns an error if the page is too small to hold the field.
    pub fn block_count(&self) -> Result<usize> {
        read_u16(self.bytes, self.layout.block_count_offset())
            .map(usize::from)
            .ok_or_else(|| Error::corrupted(self.section(), "row count outside page"))
    }

    /// Copies out every non-empty subheader referenced by the pointer table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corrupted`] when the pointer table or a referenced
    /// block lies outside the page.
    pub fn subheaders(&self) -> Result<Vec<SubHeader>> {
        let count = self.subheader_count()?;
        let word_size = self.layout.word_size();
        let width = word_size.width();
        let mut subheaders = Vec::with_capacity(count);

        for pointer_index in 0..count {
            let base = self.layout.pointer_table_offset() + pointer_index * self.layout.pointer_size();
            let (Some(offset), Some(length)) = (
                read_word(self.bytes, base, word_size),
                read_word(self.bytes, base + width, word_size),
            ) else {
                return Err(Error::corrupted(
                    self.section(),
                    format!("subheader pointer {pointer_index} of {count} exceeds page bounds"),
                ));
            };
            if length == 0 {
                continue;
            }

            let data = usize::try_from(offset)
                .ok()
                .zip(usize::try_from(length).ok())
                .and_then(|(start, len)| {
                    let end = start.checked_add(len)?;
                    self.bytes.get(start..end)
                })
                .ok_or_else(|| {
                    Error::corrupted(
                        self.section(),
                        format!(
                            "subheader {pointer_index} (offset {offset}, length {length}) exceeds page bounds"
                        ),
                    )
                })?;
            if data.len() < MIN_SUBHEADER_LEN {
                tracing::debug!(page = self.index, pointer_index, "skipping undersized subheader");
                continue;
            }

            let subheader = SubHeader::new(self.index, data.to_vec());
            tracing::trace!(
                page = self.index,
                pointer_index,
                signature = %subheader.signature,
                length = data.len(),
                "collected subheader"
            );
            subheaders.push(subheader);
        }

        Ok(subheaders)
    }

    /// Byte offset of the first row on this page. Mix pages skip the pointer
    /// table and round up to an 8-byte boundary.
    ///
    /// # Errors
    ///
    /// Returns an error if the subheader count cannot be read on a mix page.
    pub fn row_region_start(&self) -> Result<usize> {
        let base = self.layout.pointer_table_offset();
        if self.kind != PageKind::Mix {
            return Ok(base);
        }
        let table = self.subheader_count()? * self.layout.pointer_size();
        Ok((base + table).next_multiple_of(8))
    }
}
