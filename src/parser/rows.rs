use encoding_rs::Encoding;
use smallvec::SmallVec;

use super::byteorder::decode_padded_f64;
use super::encoding::decode_text;
use super::page::{Page, PageKind};
use super::schema::Schema;
use crate::error::{Error, Result, Section};
use crate::metadata::{ColumnDescriptor, ColumnType};
use crate::value::Value;

/// Inline capacity of the per-row value buffer.
pub const INLINE_VALUES: usize = 16;

pub type RowValues<'data> = SmallVec<[Value<'data>; INLINE_VALUES]>;

/// Rows stored on one data-bearing page.
#[derive(Debug, Clone, Copy)]
pub struct RowBatch<'page> {
    page_index: u64,
    bytes: &'page [u8],
    start: usize,
    row_length: usize,
    len: usize,
}

impl<'page> RowBatch<'page> {
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub const fn page_index(&self) -> u64 {
        self.page_index
    }

    /// Raw bytes of row `row` (0-based within the page).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corrupted`] when the row extends past the page.
    pub fn row(&self, row: usize) -> Result<&'page [u8]> {
        self.row_length
            .checked_mul(row)
            .and_then(|offset| offset.checked_add(self.start))
            .and_then(|begin| Some((begin, begin.checked_add(self.row_length)?)))
            .and_then(|(begin, end)| self.bytes.get(begin..end))
            .ok_or_else(|| {
                Error::corrupted(
                    Section::Row {
                        page_index: self.page_index,
                        row,
                    },
                    format!(
                        "row of {} bytes starting at offset {} exceeds page of {} bytes",
                        self.row_length,
                        row.saturating_mul(self.row_length).saturating_add(self.start),
                        self.bytes.len()
                    ),
                )
            })
    }
}

/// Decodes fixed-width rows against a resolved schema.
#[derive(Debug, Clone, Copy)]
pub struct RowDecoder<'schema> {
    schema: &'schema Schema,
    encoding: &'static Encoding,
}

impl<'schema> RowDecoder<'schema> {
    #[must_use]
    pub const fn new(schema: &'schema Schema, encoding: &'static Encoding) -> Self {
        Self { schema, encoding }
    }

    #[must_use]
    pub const fn columns(&self) -> &'schema [ColumnDescriptor] {
        self.schema.columns.as_slice()
    }

    /// Locates the rows on `page`, never more than `remaining`.
    ///
    /// Mix pages hold the schema's mix-page row count; data pages carry their
    /// own count in the page header.
    ///
    /// # Errors
    ///
    /// Returns an error if the page header fields cannot be read.
    pub fn batch<'page>(&self, page: &Page<'page>, remaining: u64) -> Result<RowBatch<'page>> {
        let stored = match page.kind {
            PageKind::Mix => self.schema.rows.mix_page_row_count,
            PageKind::Data => page.block_count()?,
            PageKind::Meta | PageKind::Amd => 0,
        };
        let len = usize::try_from(remaining).map_or(stored, |remaining| stored.min(remaining));
        Ok(RowBatch {
            page_index: page.index,
            bytes: page.bytes,
            start: page.row_region_start()?,
            row_length: self.schema.rows.row_length,
            len,
        })
    }

    /// Decodes every column of `row` into `values`, reusing its capacity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corrupted`] when a column's field extends past the row.
    pub fn decode_into<'data>(
        &self,
        batch: &RowBatch<'data>,
        row: usize,
        values: &mut RowValues<'data>,
    ) -> Result<()> {
        let bytes = batch.row(row)?;
        values.clear();
        values.reserve(self.schema.columns.len());
        for column in &self.schema.columns {
            let raw = column
                .offset
                .checked_add(column.length)
                .and_then(|end| bytes.get(column.offset..end))
                .ok_or_else(|| {
                    Error::corrupted(
                        Section::Row {
                            page_index: batch.page_index,
                            row,
                        },
                        format!(
                            "column {} ({} bytes at offset {}) exceeds row length {}",
                            column.name,
                            column.length,
                            column.offset,
                            bytes.len()
                        ),
                    )
                })?;
            values.push(decode_value(column.column_type, raw, self.encoding));
        }
        Ok(())
    }
}

/// Decodes one stored field. Zero-width fields are missing.
#[must_use]
pub fn decode_value<'data>(
    column_type: ColumnType,
    raw: &'data [u8],
    encoding: &'static Encoding,
) -> Value<'data> {
    if raw.is_empty() {
        return Value::Missing;
    }
    match column_type {
        ColumnType::Numeric => Value::Float(decode_padded_f64(raw)),
        ColumnType::Character => Value::Str(decode_text(raw, encoding)),
    }
}
