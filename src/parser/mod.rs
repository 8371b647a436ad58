mod byteorder;
mod encoding;
#[cfg(test)]
mod fixtures;
mod header;
mod page;
mod rows;
mod schema;
mod subheader;
mod traversal;

use std::io::{ErrorKind, Read};

pub use byteorder::{decode_padded_f64, read_u16, read_u32, read_u64, read_word, trim_padding};
pub use encoding::{decode_text, encoding_for_code};
pub use header::{SAS7BDAT_MAGIC_NUMBER, SAS_HEADER_PROLOGUE_SIZE, parse_header};
pub use page::{Page, PageKind, PageLayout};
pub use rows::{RowBatch, RowDecoder, RowValues, decode_value};
pub use schema::{RowLayout, Schema, assemble_schema, splice_column_attrs};
pub use subheader::{Signature, SubHeader, SubheaderArena};
pub use traversal::{PageOutcome, ReadOutcome, Traversal};

/// Fills `buf` from `reader` until it is full or the stream ends, returning
/// the number of bytes read.
pub(crate) fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}
