//! Synthetic SAS7BDAT writer for the integration tests.
//!
//! Files are little-endian and uncompressed, in either word size, with one
//! metadata page (plain or mix) followed by data pages.
#![allow(dead_code)]

use std::borrow::Cow;

use sas7bdat_stream::metadata::ColumnDescriptor;
use sas7bdat_stream::{SasConsumer, Value};

pub const MAGIC: [u8; 32] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC2, 0xEA, 0x81, 0x60,
    0xB3, 0x14, 0x11, 0xCF, 0xBD, 0x92, 0x08, 0x00, 0x09, 0xC7, 0x31, 0x8C, 0x18, 0x1F, 0x10, 0x11,
];

pub const HEADER_LENGTH: usize = 1024;

const PAGE_META: u8 = 0;
const PAGE_DATA: u8 = 1;
const PAGE_MIX: u8 = 2;

#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub name: String,
    pub label: Option<String>,
    pub format: Option<String>,
    pub numeric: bool,
    pub length: usize,
}

impl ColumnSpec {
    pub fn numeric(name: &str, length: usize) -> Self {
        Self {
            name: name.to_owned(),
            label: None,
            format: None,
            numeric: true,
            length,
        }
    }

    pub fn character(name: &str, length: usize) -> Self {
        Self {
            numeric: false,
            ..Self::numeric(name, length)
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_owned());
        self
    }

    pub fn with_format(mut self, format: &str) -> Self {
        self.format = Some(format.to_owned());
        self
    }
}

#[derive(Debug, Clone)]
pub enum Cell {
    Num(f64),
    Text(String),
}

pub fn num(value: f64) -> Cell {
    Cell::Num(value)
}

pub fn text(value: &str) -> Cell {
    Cell::Text(value.to_owned())
}

#[derive(Debug, Clone)]
pub struct SasFileBuilder {
    is_64: bool,
    pad: bool,
    page_size: usize,
    rows_per_page: usize,
    mix_rows: Option<usize>,
    split_attrs_at: Option<usize>,
    declared_rows: Option<u64>,
    columns: Vec<ColumnSpec>,
    rows: Vec<Vec<Cell>>,
    extra_pages: Vec<u8>,
    endian_flag: u8,
    encoding_code: u8,
    release: String,
    host: String,
    dataset_name: String,
}

impl SasFileBuilder {
    pub fn new(is_64: bool) -> Self {
        Self {
            is_64,
            pad: is_64,
            page_size: 4096,
            rows_per_page: 64,
            mix_rows: None,
            split_attrs_at: None,
            declared_rows: None,
            columns: Vec::new(),
            rows: Vec::new(),
            extra_pages: Vec::new(),
            endian_flag: 0x01,
            encoding_code: 20,
            release: "9.0401M6".to_owned(),
            host: "X64_10PR".to_owned(),
            dataset_name: "SYNTHETIC".to_owned(),
        }
    }

    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    pub fn row(mut self, cells: Vec<Cell>) -> Self {
        self.rows.push(cells);
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn rows_per_page(mut self, rows: usize) -> Self {
        self.rows_per_page = rows;
        self
    }

    /// Stores the first `rows` rows on a mix page that also carries the metadata.
    pub fn mix_rows(mut self, rows: usize) -> Self {
        self.mix_rows = Some(rows);
        self
    }

    /// Splits the column attributes into two COLATTR fragments.
    pub fn split_attrs_at(mut self, column: usize) -> Self {
        self.split_attrs_at = Some(column);
        self
    }

    pub fn declared_rows(mut self, rows: u64) -> Self {
        self.declared_rows = Some(rows);
        self
    }

    /// Inserts an empty page with the given type byte right after the metadata page.
    pub fn extra_page(mut self, page_type: u8) -> Self {
        self.extra_pages.push(page_type);
        self
    }

    pub fn endian_flag(mut self, flag: u8) -> Self {
        self.endian_flag = flag;
        self
    }

    pub fn encoding_code(mut self, code: u8) -> Self {
        self.encoding_code = code;
        self
    }

    pub fn pad(mut self, pad: bool) -> Self {
        self.pad = pad;
        self
    }

    pub fn release(mut self, release: &str, host: &str) -> Self {
        self.release = release.to_owned();
        self.host = host.to_owned();
        self
    }

    pub const fn page_size_value(&self) -> usize {
        self.page_size
    }

    fn width(&self) -> usize {
        if self.is_64 { 8 } else { 4 }
    }

    fn pick(&self, bit32: usize, bit64: usize) -> usize {
        if self.is_64 { bit64 } else { bit32 }
    }

    fn put_word(&self, buf: &mut [u8], offset: usize, value: usize) {
        if self.is_64 {
            buf[offset..offset + 8].copy_from_slice(&(value as u64).to_le_bytes());
        } else {
            buf[offset..offset + 4].copy_from_slice(&(value as u32).to_le_bytes());
        }
    }

    fn signed(&self, signature: [u8; 4], len: usize) -> Vec<u8> {
        let mut block = vec![0u8; len];
        block[..4].copy_from_slice(&signature);
        block
    }

    pub fn row_length(&self) -> usize {
        self.columns.iter().map(|c| c.length).sum()
    }

    pub fn build(&self) -> Vec<u8> {
        let row_length = self.row_length();
        let encoded_rows: Vec<Vec<u8>> = self.rows.iter().map(|row| self.encode_row(row)).collect();
        let declared_rows = self.declared_rows.unwrap_or(self.rows.len() as u64);

        let mix_rows = self.mix_rows.unwrap_or(0).min(encoded_rows.len());
        let blocks = self.metadata_blocks(row_length, declared_rows, mix_rows);

        let mut pages = Vec::new();
        let first_type = if self.mix_rows.is_some() { PAGE_MIX } else { PAGE_META };
        pages.push(self.page(first_type, &blocks, &encoded_rows[..mix_rows]));
        for page_type in &self.extra_pages {
            pages.push(self.page(*page_type, &[], &[]));
        }
        for chunk in encoded_rows[mix_rows..].chunks(self.rows_per_page.max(1)) {
            pages.push(self.page(PAGE_DATA, &[], chunk));
        }

        let mut file = self.header(pages.len());
        for page in pages {
            file.extend_from_slice(&page);
        }
        file
    }

    fn header(&self, page_count: usize) -> Vec<u8> {
        let mut header = vec![0u8; HEADER_LENGTH];
        header[..32].copy_from_slice(&MAGIC);
        if self.is_64 {
            header[32] = 0x33;
        }
        let pad = if self.pad {
            header[35] = 0x33;
            4
        } else {
            0
        };
        header[37] = self.endian_flag;
        header[39] = b'1';
        header[70] = self.encoding_code;
        header[84..92].copy_from_slice(b"DATA    ");
        let name = self.dataset_name.as_bytes();
        header[92..92 + name.len()].copy_from_slice(name);

        // Created 2020-01-01T00:00:00Z, seconds since 1960-01-01.
        let created = 1_893_456_000.0f64;
        header[164 + pad..172 + pad].copy_from_slice(&created.to_le_bytes());
        header[172 + pad..180 + pad].copy_from_slice(&created.to_le_bytes());

        header[196 + pad..200 + pad].copy_from_slice(&(HEADER_LENGTH as i32).to_le_bytes());
        header[200 + pad..204 + pad].copy_from_slice(&(self.page_size as i32).to_le_bytes());
        header[204 + pad..208 + pad].copy_from_slice(&(page_count as i32).to_le_bytes());

        let shift = self.pick(0, 4) + pad;
        let release = self.release.as_bytes();
        header[216 + shift..216 + shift + release.len()].copy_from_slice(release);
        let host = self.host.as_bytes();
        header[224 + shift..224 + shift + host.len()].copy_from_slice(host);
        header[272 + shift..272 + shift + 5].copy_from_slice(b"Linux");
        header
    }

    fn encode_row(&self, cells: &[Cell]) -> Vec<u8> {
        assert_eq!(cells.len(), self.columns.len(), "row width mismatch");
        let mut row = Vec::with_capacity(self.row_length());
        for (cell, column) in cells.iter().zip(&self.columns) {
            match cell {
                Cell::Num(value) => {
                    let bytes = value.to_le_bytes();
                    row.extend_from_slice(&bytes[8 - column.length..]);
                }
                Cell::Text(value) => {
                    let mut field = value.as_bytes().to_vec();
                    field.resize(column.length, b' ');
                    row.extend_from_slice(&field);
                }
            }
        }
        row
    }

    fn metadata_blocks(&self, row_length: usize, declared_rows: u64, mix_rows: usize) -> Vec<Vec<u8>> {
        let count = self.columns.len();
        let sig_len = self.width();

        let mut row_size = self.signed([0xF7; 4], self.pick(480, 808));
        self.put_word(&mut row_size, self.pick(20, 40), row_length);
        self.put_word(&mut row_size, self.pick(24, 48), declared_rows as usize);
        self.put_word(&mut row_size, self.pick(36, 72), count);
        self.put_word(&mut row_size, self.pick(60, 120), mix_rows);

        let mut column_size = self.signed([0xF6; 4], self.pick(12, 24));
        self.put_word(&mut column_size, self.pick(4, 8), count);

        let mut pool = self.signed([0xFD, 0xFF, 0xFF, 0xFF], sig_len + 8);
        let mut intern = |value: &str| -> (u16, u16) {
            let offset = (pool.len() - sig_len) as u16;
            pool.extend_from_slice(value.as_bytes());
            while pool.len() % 4 != 0 {
                pool.push(b' ');
            }
            (offset, value.len() as u16)
        };
        let name_refs: Vec<(u16, u16)> = self.columns.iter().map(|c| intern(&c.name)).collect();
        let label_refs: Vec<Option<(u16, u16)>> = self
            .columns
            .iter()
            .map(|c| c.label.as_deref().map(&mut intern))
            .collect();
        let format_refs: Vec<Option<(u16, u16)>> = self
            .columns
            .iter()
            .map(|c| c.format.as_deref().map(&mut intern))
            .collect();

        let mut names = self.signed([0xFF; 4], self.pick(12, 16));
        for (offset, len) in &name_refs {
            let mut record = [0u8; 8];
            record[2..4].copy_from_slice(&offset.to_le_bytes());
            record[4..6].copy_from_slice(&len.to_le_bytes());
            names.extend_from_slice(&record);
        }
        names.extend_from_slice(&[0u8; 8]);

        let mut blocks = vec![row_size, column_size, pool];
        let split = self.split_attrs_at.unwrap_or(count).min(count);
        let mut offset = 0;
        let mut attrs = Vec::with_capacity(count);
        for column in &self.columns {
            attrs.push((offset, column.length, column.numeric));
            offset += column.length;
        }
        blocks.push(self.attrs_fragment(&attrs[..split]));
        if split < count {
            blocks.push(self.attrs_fragment(&attrs[split..]));
        }
        blocks.push(names);

        if label_refs.iter().chain(&format_refs).any(Option::is_some) {
            for (format, label) in format_refs.iter().zip(&label_refs) {
                let mut block = self.signed([0xFE, 0xFB, 0xFF, 0xFF], self.pick(52, 64));
                for (base, text_ref) in [(self.pick(34, 46), format), (self.pick(40, 52), label)] {
                    if let Some((offset, len)) = text_ref {
                        block[base + 2..base + 4].copy_from_slice(&offset.to_le_bytes());
                        block[base + 4..base + 6].copy_from_slice(&len.to_le_bytes());
                    }
                }
                blocks.push(block);
            }
        }
        blocks
    }

    fn attrs_fragment(&self, attrs: &[(usize, usize, bool)]) -> Vec<u8> {
        let record_len = self.pick(12, 16);
        let mut block = self.signed([0xFC, 0xFF, 0xFF, 0xFF], record_len);
        for (offset, length, numeric) in attrs {
            let mut record = vec![0u8; record_len];
            self.put_word(&mut record, 0, *offset);
            record[self.width()..self.width() + 4].copy_from_slice(&(*length as u32).to_le_bytes());
            record[self.pick(10, 14)] = if *numeric { 1 } else { 2 };
            block.extend_from_slice(&record);
        }
        block.extend_from_slice(&[0u8; 8]);
        block
    }

    fn page(&self, page_type: u8, blocks: &[Vec<u8>], rows: &[Vec<u8>]) -> Vec<u8> {
        let mut page = vec![0u8; self.page_size];
        page[self.pick(17, 33)] = page_type;
        let block_count = self.pick(18, 34);
        page[block_count..block_count + 2].copy_from_slice(&(rows.len() as u16).to_le_bytes());
        let pointer_count = self.pick(20, 36);
        page[pointer_count..pointer_count + 2].copy_from_slice(&(blocks.len() as u16).to_le_bytes());

        let table = self.pick(24, 40);
        let stride = self.pick(12, 24);
        let mut end = self.page_size;
        for (index, block) in blocks.iter().enumerate() {
            let start = end - block.len();
            page[start..end].copy_from_slice(block);
            let base = table + index * stride;
            self.put_word(&mut page, base, start);
            self.put_word(&mut page, base + self.width(), block.len());
            end = start;
        }

        let mut cursor = table;
        if page_type == PAGE_MIX {
            cursor = (cursor + blocks.len() * stride).next_multiple_of(8);
        }
        for row in rows {
            page[cursor..cursor + row.len()].copy_from_slice(row);
            cursor += row.len();
        }
        assert!(cursor <= end, "page too small for its rows and subheaders");
        page
    }
}

/// Consumer that records every callback in order.
#[derive(Debug, Default)]
pub struct Recorder {
    pub events: Vec<Event>,
    pub stop_after: Option<u64>,
    pub decline: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Column(ColumnDescriptor),
    ReadData,
    Row(u64, Vec<Value<'static>>),
}

impl Recorder {
    pub fn columns(&self) -> Vec<&ColumnDescriptor> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Column(column) => Some(column),
                _ => None,
            })
            .collect()
    }

    pub fn rows(&self) -> Vec<&[Value<'static>]> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Row(_, values) => Some(values.as_slice()),
                _ => None,
            })
            .collect()
    }

    pub fn row_numbers(&self) -> Vec<u64> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Row(number, _) => Some(*number),
                _ => None,
            })
            .collect()
    }
}

impl SasConsumer for Recorder {
    fn column(&mut self, column: &ColumnDescriptor) {
        self.events.push(Event::Column(column.clone()));
    }

    fn read_data(&mut self) -> bool {
        self.events.push(Event::ReadData);
        !self.decline
    }

    fn row(&mut self, row_number: u64, values: &[Value<'_>]) -> bool {
        self.events.push(Event::Row(
            row_number,
            values.iter().cloned().map(Value::into_owned).collect(),
        ));
        self.stop_after.is_none_or(|stop| row_number < stop)
    }
}

pub fn str_value(value: &str) -> Value<'static> {
    Value::Str(Cow::Owned(value.to_owned()))
}
