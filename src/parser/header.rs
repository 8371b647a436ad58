use std::io::Read;

use time::{Duration, OffsetDateTime};

use super::byteorder::{read_f64, read_i32, read_padded_string, trim_padding};
use super::encoding::{default_encoding, encoding_for_code};
use super::read_full;
use crate::error::{Error, Result, Section};
use crate::logger::log_warn;
use crate::metadata::{DatasetTimestamps, FileHeader, Platform, WordSize};

/// Size of the fixed prologue shared by every layout variant.
pub const SAS_HEADER_PROLOGUE_SIZE: usize = 288;

const SAS_ALIGNMENT_OFFSET_4: u8 = 0x33;
const SAS_ENDIAN_LITTLE: u8 = 0x01;
const SAS_MAX_SIZE: usize = 1 << 24;
const SAS_EPOCH_OFFSET_SECONDS: i64 = -3653 * 86_400;

const WORD_SIZE_FLAG_OFFSET: usize = 32;
const PAD_FLAG_OFFSET: usize = 35;
const ENDIAN_FLAG_OFFSET: usize = 37;
const PLATFORM_FLAG_OFFSET: usize = 39;
const ENCODING_CODE_OFFSET: usize = 70;
const FILE_TYPE_OFFSET: usize = 84;
const DATASET_NAME_OFFSET: usize = 92;
const TIMESTAMPS_OFFSET: usize = 164;
const HEADER_LENGTH_OFFSET: usize = 196;
const PAGE_SIZE_OFFSET: usize = 200;
const PAGE_COUNT_OFFSET: usize = 204;
const RELEASE_OFFSET: usize = 216;
const HOST_OFFSET: usize = 224;
const OS_VERSION_OFFSET: usize = 240;
const OS_MAKER_OFFSET: usize = 256;
const OS_NAME_OFFSET: usize = 272;

pub const SAS7BDAT_MAGIC_NUMBER: [u8; 32] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC2, 0xEA, 0x81, 0x60,
    0xB3, 0x14, 0x11, 0xCF, 0xBD, 0x92, 0x08, 0x00, 0x09, 0xC7, 0x31, 0x8C, 0x18, 0x1F, 0x10, 0x11,
];

/// Parses the SAS7BDAT file header, consuming exactly `header_length` bytes
/// from `reader`.
///
/// # Errors
///
/// Returns an error if the prologue is short, the magic number does not
/// match, the file is not little-endian, or the geometry fields are out of
/// range.
pub fn parse_header<R: Read>(reader: &mut R) -> Result<FileHeader> {
    let mut prologue = [0u8; SAS_HEADER_PROLOGUE_SIZE];
    let read = read_full(reader, &mut prologue)?;
    if read < SAS_HEADER_PROLOGUE_SIZE {
        return Err(Error::corrupted(
            Section::Header,
            format!("header too short (not a sas7bdat file?): {read} bytes"),
        ));
    }

    let flags = HeaderFlags::from_prologue(&prologue)?;

    let mut total = Vec::with_capacity(flags.header_length);
    total.extend_from_slice(&prologue);
    total.resize(flags.header_length, 0);
    let remainder = read_full(reader, &mut total[SAS_HEADER_PROLOGUE_SIZE..])?;
    if remainder < flags.header_length - SAS_HEADER_PROLOGUE_SIZE {
        return Err(Error::corrupted(
            Section::Header,
            format!(
                "header truncated: expected {} bytes, stream ended after {}",
                flags.header_length,
                SAS_HEADER_PROLOGUE_SIZE + remainder
            ),
        ));
    }

    let header = flags.into_header(&total)?;
    tracing::debug!(
        word_size = ?header.word_size,
        page_size = header.page_size,
        page_count = header.page_count,
        release = %header.sas_release,
        "parsed SAS7BDAT header"
    );
    Ok(header)
}

/// Fields of the prologue needed before the rest of the header is read.
struct HeaderFlags {
    word_size: WordSize,
    pad_alignment: usize,
    platform: Platform,
    header_length: usize,
}

impl HeaderFlags {
    fn from_prologue(prologue: &[u8; SAS_HEADER_PROLOGUE_SIZE]) -> Result<Self> {
        if prologue[..SAS7BDAT_MAGIC_NUMBER.len()] != SAS7BDAT_MAGIC_NUMBER {
            return Err(Error::corrupted(Section::Header, "magic number mismatch"));
        }

        let word_size = if prologue[WORD_SIZE_FLAG_OFFSET] == SAS_ALIGNMENT_OFFSET_4 {
            WordSize::Bit64
        } else {
            WordSize::Bit32
        };
        let pad_alignment = if prologue[PAD_FLAG_OFFSET] == SAS_ALIGNMENT_OFFSET_4 {
            4
        } else {
            0
        };

        let endian = prologue[ENDIAN_FLAG_OFFSET];
        if endian != SAS_ENDIAN_LITTLE {
            return Err(Error::Unsupported {
                feature: format!("big endian files (endianness flag 0x{endian:02X})").into(),
            });
        }

        let platform = Platform::from_flag(prologue[PLATFORM_FLAG_OFFSET]);

        let raw_length = read_i32(prologue, HEADER_LENGTH_OFFSET + pad_alignment)
            .ok_or_else(|| Error::corrupted(Section::Header, "header length field missing"))?;
        let header_length = usize::try_from(raw_length)
            .ok()
            .filter(|len| (SAS_HEADER_PROLOGUE_SIZE..=SAS_MAX_SIZE).contains(len))
            .ok_or_else(|| {
                Error::corrupted(
                    Section::Header,
                    format!("header length {raw_length} outside expected range"),
                )
            })?;

        Ok(Self {
            word_size,
            pad_alignment,
            platform,
            header_length,
        })
    }

    fn into_header(self, total: &[u8]) -> Result<FileHeader> {
        let pad = self.pad_alignment;

        let raw_page_size = read_i32(total, PAGE_SIZE_OFFSET + pad)
            .ok_or_else(|| Error::corrupted(Section::Header, "page size field missing"))?;
        let page_size = usize::try_from(raw_page_size)
            .ok()
            .filter(|size| (1..=SAS_MAX_SIZE).contains(size))
            .ok_or_else(|| {
                Error::corrupted(
                    Section::Header,
                    format!("page size {raw_page_size} is not a positive size"),
                )
            })?;

        let raw_page_count = read_i32(total, PAGE_COUNT_OFFSET + pad)
            .ok_or_else(|| Error::corrupted(Section::Header, "page count field missing"))?;
        let page_count = u64::try_from(raw_page_count)
            .ok()
            .filter(|count| *count >= 1)
            .ok_or_else(|| {
                Error::corrupted(
                    Section::Header,
                    format!("page count {raw_page_count} is not positive"),
                )
            })?;

        let encoding_code = total[ENCODING_CODE_OFFSET];
        let encoding = encoding_for_code(encoding_code).unwrap_or_else(|| {
            if encoding_code != 0 {
                log_warn(&format!(
                    "character set code {encoding_code} not recognised; decoding text as {}",
                    default_encoding().name()
                ));
            }
            default_encoding()
        });

        // Release and host strings sit after the word-sized page count, so
        // both alignment paddings apply to them.
        let shift = self.word_size.pick(0, 4) + pad;
        let text = |offset: usize, len: usize| {
            read_padded_string(total, offset + shift, len).ok_or_else(|| {
                Error::corrupted(
                    Section::Header,
                    format!("header string at offset {} exceeds header", offset + shift),
                )
            })
        };

        Ok(FileHeader {
            word_size: self.word_size,
            pad_alignment: pad,
            platform: self.platform,
            encoding,
            sas_release: text(RELEASE_OFFSET, 8)?,
            sas_host: text(HOST_OFFSET, 8)?,
            os_version: text(OS_VERSION_OFFSET, 16)?,
            os_maker: text(OS_MAKER_OFFSET, 16)?,
            os_name: text(OS_NAME_OFFSET, 16)?,
            dataset_name: optional_text(&total[DATASET_NAME_OFFSET..DATASET_NAME_OFFSET + 32]),
            file_type: optional_text(&total[FILE_TYPE_OFFSET..FILE_TYPE_OFFSET + 8]),
            timestamps: read_timestamps(total, TIMESTAMPS_OFFSET + pad),
            header_length: self.header_length,
            page_size,
            page_count,
        })
    }
}

fn optional_text(bytes: &[u8]) -> Option<String> {
    let trimmed = trim_padding(bytes);
    if trimmed.is_empty() {
        None
    } else {
        Some(String::from_utf8_lossy(trimmed).into_owned())
    }
}

fn read_timestamps(total: &[u8], offset: usize) -> DatasetTimestamps {
    let value = |index: usize| read_f64(total, offset + index * 8).unwrap_or(f64::NAN);
    DatasetTimestamps {
        created: convert_sas_time(value(0), value(2)),
        modified: convert_sas_time(value(1), value(3)),
    }
}

fn convert_sas_time(time: f64, diff: f64) -> Option<OffsetDateTime> {
    let delta = Duration::checked_seconds_f64(time - diff)?;
    let offset = Duration::seconds(SAS_EPOCH_OFFSET_SECONDS);
    let total = offset.checked_add(delta)?;
    OffsetDateTime::UNIX_EPOCH.checked_add(total)
}
