use std::borrow::Cow;

use encoding_rs::Encoding;

use super::byteorder::{read_u16, read_u32, read_u8, read_word};
use super::encoding::decode_text;
use super::subheader::{Signature, SubHeader, SubheaderArena};
use crate::error::{Error, Result, Section};
use crate::logger::log_warn;
use crate::metadata::{ColumnDescriptor, ColumnType, WordSize};

/// Trailing padding at the end of every COLATTR fragment.
const COLUMN_ATTRS_TRAILER_LEN: usize = 8;
const COLUMN_NAME_RECORD_LEN: usize = 8;

/// Row geometry taken from the ROWSIZE subheader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLayout {
    /// Bytes per row.
    pub row_length: usize,
    /// Logical number of rows in the dataset.
    pub row_count: u64,
    /// Rows stored on each mix (metadata + data) page.
    pub mix_page_row_count: usize,
}

/// Fully resolved column metadata plus the row geometry needed to decode
/// data pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub columns: Vec<ColumnDescriptor>,
    pub rows: RowLayout,
}

/// Word-size dependent offsets inside the metadata subheaders.
#[derive(Debug, Clone, Copy)]
struct SchemaLayout {
    word_size: WordSize,
}

impl SchemaLayout {
    const fn signature_len(self) -> usize {
        self.word_size.width()
    }

    const fn row_length_offset(self) -> usize {
        self.word_size.pick(20, 40)
    }

    const fn row_count_offset(self) -> usize {
        self.word_size.pick(24, 48)
    }

    const fn row_size_column_count_offset(self) -> usize {
        self.word_size.pick(36, 72)
    }

    const fn mix_page_row_count_offset(self) -> usize {
        self.word_size.pick(60, 120)
    }

    const fn column_size_count_offset(self) -> usize {
        self.word_size.pick(4, 8)
    }

    /// Header length of COLNAME and COLATTR blocks; also the COLATTR record stride.
    const fn column_block_header_len(self) -> usize {
        self.word_size.pick(12, 16)
    }

    const fn column_type_offset(self) -> usize {
        self.word_size.pick(10, 14)
    }

    const fn format_ref_offset(self) -> usize {
        self.word_size.pick(34, 46)
    }

    const fn label_ref_offset(self) -> usize {
        self.word_size.pick(40, 52)
    }
}

/// Resolves the canonical subheaders into ordered column descriptors.
///
/// # Errors
///
/// Returns [`Error::InvalidMetadata`] when a required subheader is missing
/// or duplicated, no COLATTR fragment exists, or the COLLABS count is neither
/// zero nor the column count. Returns [`Error::Corrupted`] when a field or
/// text reference falls outside its subheader.
pub fn assemble_schema(
    arena: &SubheaderArena,
    word_size: WordSize,
    encoding: &'static Encoding,
) -> Result<Schema> {
    let layout = SchemaLayout { word_size };

    let row_size = arena.single(Signature::RowSize)?;
    let row_length = word_field(row_size, layout.row_length_offset(), word_size)?;
    let row_count = word_field(row_size, layout.row_count_offset(), word_size)?;
    let row_size_columns = word_field(row_size, layout.row_size_column_count_offset(), word_size)?;
    let mix_page_row_count = word_field(row_size, layout.mix_page_row_count_offset(), word_size)?;

    let column_size = arena.single(Signature::ColumnSize)?;
    let column_count = word_field(column_size, layout.column_size_count_offset(), word_size)?;
    if column_count != row_size_columns {
        log_warn(&format!(
            "column count mismatch: {column_count} (COLSIZE) vs. {row_size_columns} (ROWSIZE); using COLSIZE"
        ));
    }

    let text_pool = arena.single(Signature::ColumnText)?;

    let attr_fragments: Vec<&SubHeader> = arena.all(Signature::ColumnAttrs).collect();
    let column_attrs: Cow<'_, [u8]> = match attr_fragments.as_slice() {
        [] => {
            return Err(Error::invalid_metadata(
                "no column attribute subheader found",
            ));
        }
        [single] => Cow::Borrowed(single.data.as_slice()),
        fragments => {
            tracing::info!(fragments = fragments.len(), "splicing column attribute subheaders");
            Cow::Owned(splice_column_attrs(
                fragments.iter().map(|sub| sub.data.as_slice()),
                word_size,
            )?)
        }
    };

    let column_names = arena.single(Signature::ColumnName)?;

    let column_count = to_usize(column_count, Signature::ColumnSize)?;
    let labels: Vec<&SubHeader> = arena.all(Signature::ColumnLabels).collect();
    if !labels.is_empty() && labels.len() != column_count {
        return Err(Error::invalid_metadata(format!(
            "unexpected column label count ({}) expected 0 or {column_count}",
            labels.len()
        )));
    }

    let pool = TextPool {
        bytes: &text_pool.data,
        signature_len: layout.signature_len(),
        encoding,
    };

    let mut columns = Vec::new();
    for index in 0..column_count {
        let name = resolve_name(&column_names.data, index, layout, &pool)?;
        let (format, label) = match labels.get(index) {
            Some(record) => (
                pool.optional_ref(&record.data, layout.format_ref_offset(), index)?,
                pool.optional_ref(&record.data, layout.label_ref_offset(), index)?,
            ),
            None => (None, None),
        };
        let (offset, length, column_type) = read_attrs(&column_attrs, index, layout)?;

        tracing::debug!(
            index,
            name = %name,
            label = ?label,
            column_type = %column_type,
            format = ?format,
            length,
            "column read"
        );
        columns.push(ColumnDescriptor {
            index,
            name,
            label,
            format,
            offset,
            length,
            column_type,
        });
    }

    Ok(Schema {
        columns,
        rows: RowLayout {
            row_length: to_usize(row_length, Signature::RowSize)?,
            row_count,
            mix_page_row_count: to_usize(mix_page_row_count, Signature::RowSize)?,
        },
    })
}

/// Joins COLATTR fragments into one buffer addressed like a single fragment:
/// the first fragment keeps its header and loses its trailer, later fragments
/// contribute only their records.
///
/// # Errors
///
/// Returns [`Error::Corrupted`] when a fragment is shorter than its own
/// header and trailer.
pub fn splice_column_attrs<'a, I>(fragments: I, word_size: WordSize) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let header_len = SchemaLayout { word_size }.column_block_header_len();
    let mut spliced = Vec::new();
    for (position, fragment) in fragments.into_iter().enumerate() {
        let start = if position == 0 { 0 } else { header_len };
        let end = fragment
            .len()
            .checked_sub(COLUMN_ATTRS_TRAILER_LEN)
            .filter(|end| *end >= start)
            .ok_or_else(|| {
                Error::corrupted(
                    Section::Subheader { name: "COLATTR" },
                    format!(
                        "fragment {position} is {} bytes, too short to splice",
                        fragment.len()
                    ),
                )
            })?;
        spliced.extend_from_slice(&fragment[start..end]);
    }
    Ok(spliced)
}

fn word_field(subheader: &SubHeader, offset: usize, word_size: WordSize) -> Result<u64> {
    read_word(&subheader.data, offset, word_size).ok_or_else(|| {
        Error::corrupted(
            Section::Subheader {
                name: subheader.signature.name(),
            },
            format!(
                "field at offset {offset} exceeds subheader length {}",
                subheader.data.len()
            ),
        )
    })
}

fn to_usize(value: u64, signature: Signature) -> Result<usize> {
    usize::try_from(value).map_err(|_| {
        Error::corrupted(
            Section::Subheader {
                name: signature.name(),
            },
            format!("value {value} exceeds platform pointer width"),
        )
    })
}

struct TextPool<'a> {
    bytes: &'a [u8],
    signature_len: usize,
    encoding: &'static Encoding,
}

impl TextPool<'_> {
    fn resolve(&self, offset: u16, length: u16, column: usize) -> Result<String> {
        let start = usize::from(offset) + self.signature_len;
        let end = start + usize::from(length);
        let bytes = self.bytes.get(start..end).ok_or_else(|| {
            Error::corrupted(
                Section::Column { index: column },
                format!(
                    "text reference (offset {offset}, length {length}) exceeds COLTEXT subheader of {} bytes",
                    self.bytes.len()
                ),
            )
        })?;
        Ok(decode_text(bytes, self.encoding).into_owned())
    }

    /// Reads a `(offset, length)` text reference stored at `base + 2` and
    /// `base + 4`; a zero length means the text is absent.
    fn optional_ref(&self, record: &[u8], base: usize, column: usize) -> Result<Option<String>> {
        let (Some(offset), Some(length)) = (read_u16(record, base + 2), read_u16(record, base + 4))
        else {
            return Err(Error::corrupted(
                Section::Column { index: column },
                "COLLABS subheader too short for its text references",
            ));
        };
        if length == 0 {
            return Ok(None);
        }
        let text = self.resolve(offset, length, column)?;
        Ok((!text.is_empty()).then_some(text))
    }
}

fn resolve_name(
    names: &[u8],
    index: usize,
    layout: SchemaLayout,
    pool: &TextPool<'_>,
) -> Result<String> {
    let base = layout.column_block_header_len() + index * COLUMN_NAME_RECORD_LEN;
    let out_of_range = || {
        Error::corrupted(
            Section::Column { index },
            "name record exceeds COLNAME subheader",
        )
    };
    let flag = read_u8(names, base).ok_or_else(out_of_range)?;
    if flag != 0 {
        return Ok(format!("COL{index}"));
    }
    let offset = read_u16(names, base + 2).ok_or_else(out_of_range)?;
    let length = read_u16(names, base + 4).ok_or_else(out_of_range)?;
    let name = pool.resolve(offset, length, index)?;
    if name.is_empty() {
        Ok(format!("COL{index}"))
    } else {
        Ok(name)
    }
}

fn read_attrs(
    attrs: &[u8],
    index: usize,
    layout: SchemaLayout,
) -> Result<(usize, usize, ColumnType)> {
    let stride = layout.column_block_header_len();
    let base = stride + index * stride;
    let word_size = layout.word_size;
    let out_of_range = || {
        Error::corrupted(
            Section::Column { index },
            format!(
                "attribute record at offset {base} exceeds COLATTR data of {} bytes",
                attrs.len()
            ),
        )
    };
    let offset = read_word(attrs, base, word_size).ok_or_else(out_of_range)?;
    let length = read_u32(attrs, base + word_size.width()).ok_or_else(out_of_range)?;
    let type_code = read_u8(attrs, base + layout.column_type_offset()).ok_or_else(out_of_range)?;

    let offset = usize::try_from(offset).map_err(|_| {
        Error::corrupted(
            Section::Column { index },
            "column offset exceeds platform pointer width",
        )
    })?;
    let length = usize::try_from(length).map_err(|_| {
        Error::corrupted(
            Section::Column { index },
            "column length exceeds platform pointer width",
        )
    })?;
    Ok((offset, length, ColumnType::from_type_code(type_code)))
}
