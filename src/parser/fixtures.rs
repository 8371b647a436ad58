//! Builders for synthetic subheader blocks used by the parser unit tests.

use crate::metadata::WordSize;

use super::page::PageLayout;
use super::subheader::{SubHeader, SubheaderArena};

pub fn put_word(buf: &mut [u8], offset: usize, value: u64, word_size: WordSize) {
    match word_size {
        WordSize::Bit32 => buf[offset..offset + 4]
            .copy_from_slice(&u32::try_from(value).expect("fits u32").to_le_bytes()),
        WordSize::Bit64 => buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes()),
    }
}

fn signed(signature: [u8; 4], len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    data[..4].copy_from_slice(&signature);
    data
}

pub fn row_size(
    ws: WordSize,
    row_length: u64,
    row_count: u64,
    column_count: u64,
    mix_rows: u64,
) -> Vec<u8> {
    let mut data = signed([0xF7; 4], ws.pick(480, 808));
    put_word(&mut data, ws.pick(20, 40), row_length, ws);
    put_word(&mut data, ws.pick(24, 48), row_count, ws);
    put_word(&mut data, ws.pick(36, 72), column_count, ws);
    put_word(&mut data, ws.pick(60, 120), mix_rows, ws);
    data
}

pub fn column_size(ws: WordSize, column_count: u64) -> Vec<u8> {
    let mut data = signed([0xF6; 4], ws.pick(12, 24));
    put_word(&mut data, ws.pick(4, 8), column_count, ws);
    data
}

/// Builds a COLTEXT block and returns it with the pool reference of each
/// string, relative to the end of the signature.
pub fn column_text(ws: WordSize, strings: &[&str]) -> (Vec<u8>, Vec<(u16, u16)>) {
    let sig_len = ws.width();
    let mut data = signed([0xFD, 0xFF, 0xFF, 0xFF], sig_len + 8);
    let mut refs = Vec::with_capacity(strings.len());
    for text in strings {
        let offset = u16::try_from(data.len() - sig_len).expect("pool offset fits u16");
        let len = u16::try_from(text.len()).expect("string fits u16");
        data.extend_from_slice(text.as_bytes());
        while data.len() % 4 != 0 {
            data.push(b' ');
        }
        refs.push((offset, len));
    }
    (data, refs)
}

/// `None` entries produce a record whose flag byte is non-zero.
pub fn column_name(ws: WordSize, names: &[Option<(u16, u16)>]) -> Vec<u8> {
    let mut data = signed([0xFF; 4], ws.pick(12, 16));
    for name in names {
        let mut record = [0u8; 8];
        match name {
            Some((offset, len)) => {
                record[2..4].copy_from_slice(&offset.to_le_bytes());
                record[4..6].copy_from_slice(&len.to_le_bytes());
            }
            None => record[0] = 1,
        }
        data.extend_from_slice(&record);
    }
    data.extend_from_slice(&[0u8; 8]);
    data
}

/// One `(offset, length, type_code)` record per column.
pub fn column_attrs(ws: WordSize, attrs: &[(u64, u32, u8)]) -> Vec<u8> {
    let record_len = ws.pick(12, 16);
    let mut data = signed([0xFC, 0xFF, 0xFF, 0xFF], record_len);
    for (offset, length, type_code) in attrs {
        let mut record = vec![0u8; record_len];
        put_word(&mut record, 0, *offset, ws);
        record[ws.width()..ws.width() + 4].copy_from_slice(&length.to_le_bytes());
        record[ws.pick(10, 14)] = *type_code;
        data.extend_from_slice(&record);
    }
    data.extend_from_slice(&[0u8; 8]);
    data
}

pub fn column_labels(ws: WordSize, format: Option<(u16, u16)>, label: Option<(u16, u16)>) -> Vec<u8> {
    let mut data = signed([0xFE, 0xFB, 0xFF, 0xFF], ws.pick(52, 64));
    for (base, text_ref) in [(ws.pick(34, 46), format), (ws.pick(40, 52), label)] {
        if let Some((offset, len)) = text_ref {
            data[base + 2..base + 4].copy_from_slice(&offset.to_le_bytes());
            data[base + 4..base + 6].copy_from_slice(&len.to_le_bytes());
        }
    }
    data
}

pub fn arena(blocks: Vec<Vec<u8>>) -> SubheaderArena {
    let mut arena = SubheaderArena::new();
    for block in blocks {
        arena.push(SubHeader::new(0, block));
    }
    arena
}

/// Lays out a page of type `page_type` whose pointer table references
/// `blocks` (packed from the end of the page) followed by `rows` packed from
/// the row region start.
pub fn page(ws: WordSize, size: usize, page_type: u8, blocks: &[Vec<u8>], rows: &[Vec<u8>]) -> Vec<u8> {
    let layout = PageLayout::new(ws);
    let mut page = vec![0u8; size];
    page[layout.page_type_offset()] = page_type;
    let block_count = u16::try_from(rows.len()).expect("row count fits u16");
    page[layout.block_count_offset()..layout.block_count_offset() + 2]
        .copy_from_slice(&block_count.to_le_bytes());
    let pointer_count = u16::try_from(blocks.len()).expect("pointer count fits u16");
    page[layout.subheader_count_offset()..layout.subheader_count_offset() + 2]
        .copy_from_slice(&pointer_count.to_le_bytes());

    let mut end = size;
    for (index, block) in blocks.iter().enumerate() {
        let start = end - block.len();
        page[start..end].copy_from_slice(block);
        let base = layout.pointer_table_offset() + index * layout.pointer_size();
        put_word(&mut page, base, start as u64, ws);
        put_word(&mut page, base + ws.width(), block.len() as u64, ws);
        end = start;
    }

    let mut cursor = layout.pointer_table_offset();
    if page_type == 2 {
        cursor = (cursor + blocks.len() * layout.pointer_size()).next_multiple_of(8);
    }
    for row in rows {
        page[cursor..cursor + row.len()].copy_from_slice(row);
        cursor += row.len();
    }
    assert!(cursor <= end, "rows overlap subheaders");
    page
}
