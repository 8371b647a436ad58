use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::Result;
use crate::logger::set_log_prefix;
use crate::metadata::FileHeader;
use crate::parser::{PageOutcome, Traversal, parse_header, read_full};
use crate::sinks::SasConsumer;

pub use crate::parser::ReadOutcome;

/// Totals reported at the end of a read pass.
#[derive(Debug, Clone)]
pub struct ReadSummary {
    pub header: FileHeader,
    /// Columns reported to the consumer; zero if the pass ended before the
    /// schema resolved.
    pub column_count: usize,
    /// Row count declared by the ROWSIZE subheader, once the schema resolved.
    pub declared_rows: Option<u64>,
    pub rows_emitted: u64,
    /// Complete pages handed to the decoder.
    pub pages_read: u64,
    pub outcome: ReadOutcome,
}

/// Single-pass reader over a SAS7BDAT stream.
///
/// The header is decoded on construction; [`SasReader::read`] consumes the
/// reader and streams the rest of the file into a [`SasConsumer`].
pub struct SasReader<R: Read> {
    reader: R,
    header: FileHeader,
    source: Option<String>,
}

impl SasReader<BufReader<File>> {
    /// Opens a SAS7BDAT file from disk and decodes its header. Warnings
    /// logged while this file is decoded are prefixed with its path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or its header is
    /// malformed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = path.as_ref().display().to_string();
        let _prefix = set_log_prefix(source.clone());
        let file = File::open(path)?;
        let mut reader = Self::from_reader(BufReader::new(file))?;
        reader.source = Some(source);
        Ok(reader)
    }
}

impl<R: Read> SasReader<R> {
    /// Decodes the header from any byte stream positioned at the start of a
    /// file.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is malformed or the stream fails.
    pub fn from_reader(mut reader: R) -> Result<Self> {
        let header = parse_header(&mut reader)?;
        tracing::debug!(
            word_size = ?header.word_size,
            page_size = header.page_size,
            page_count = header.page_count,
            encoding = header.encoding.name(),
            "header decoded"
        );
        Ok(Self {
            reader,
            header,
            source: None,
        })
    }

    #[must_use]
    pub const fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Streams every page into `consumer`.
    ///
    /// A stream that ends before the declared page count finishes with
    /// [`ReadOutcome::Truncated`] rather than an error.
    ///
    /// # Errors
    ///
    /// Returns an error when a page or the metadata it carries is malformed,
    /// or when reading from the stream fails.
    pub fn read<C>(self, consumer: &mut C) -> Result<ReadSummary>
    where
        C: SasConsumer + ?Sized,
    {
        let Self {
            mut reader,
            header,
            source,
        } = self;
        let _prefix = source.map(set_log_prefix);

        let mut traversal = Traversal::new(&header);
        let mut page = vec![0u8; header.page_size];
        let mut pages_read = 0u64;
        let mut finished = None;

        for index in 0..header.page_count {
            let filled = read_full(&mut reader, &mut page)?;
            if filled < page.len() {
                tracing::info!(
                    page = index,
                    bytes = filled,
                    page_size = header.page_size,
                    "stream ended before the declared page count"
                );
                finished = Some(ReadOutcome::Truncated);
                break;
            }
            pages_read += 1;
            if let PageOutcome::Finished(outcome) = traversal.process_page(index, &page, consumer)? {
                finished = Some(outcome);
                break;
            }
        }

        let outcome = match finished {
            Some(outcome) => outcome,
            None => traversal.finish(consumer)?,
        };
        tracing::debug!(?outcome, rows = traversal.rows_emitted(), pages_read, "read pass finished");

        Ok(ReadSummary {
            column_count: traversal.column_count(),
            declared_rows: traversal.schema().map(|schema| schema.rows.row_count),
            rows_emitted: traversal.rows_emitted(),
            pages_read,
            outcome,
            header,
        })
    }
}

/// Decodes only the file header, leaving `reader` positioned at the first
/// page.
///
/// # Errors
///
/// Returns an error if the header is malformed or the stream fails.
pub fn read_header<R: Read>(reader: &mut R) -> Result<FileHeader> {
    parse_header(reader)
}
