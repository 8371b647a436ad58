//! Page-by-page driver for one read pass.
//!
//! The traversal owns no I/O: callers hand it page buffers in file order and
//! it decides what each page contributes. Subheaders are collected until the
//! first data-bearing page, at which point the schema is assembled, reported
//! to the consumer and the collected blocks are dropped.

use encoding_rs::Encoding;
use serde::Serialize;

use super::page::{Page, PageKind, PageLayout};
use super::rows::{RowDecoder, RowValues};
use super::schema::{Schema, assemble_schema};
use super::subheader::SubheaderArena;
use crate::error::Result;
use crate::metadata::{FileHeader, WordSize};
use crate::sinks::SasConsumer;

/// How a read pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadOutcome {
    /// Every declared page (or every declared row) was processed.
    Completed,
    /// The stream ended before the declared page count was reached.
    Truncated,
    /// The consumer declined row data after receiving the schema.
    DataDeclined,
    /// The consumer asked to stop while rows were being emitted.
    Stopped,
}

/// What the caller should do after handing a page to the traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    Continue,
    Finished(ReadOutcome),
}

#[derive(Debug)]
enum Phase {
    Collecting(SubheaderArena),
    Resolved(Schema),
}

/// State threaded through the pages of a single read pass.
#[derive(Debug)]
pub struct Traversal {
    layout: PageLayout,
    encoding: &'static Encoding,
    phase: Phase,
    rows_emitted: u64,
}

impl Traversal {
    #[must_use]
    pub fn new(header: &FileHeader) -> Self {
        Self::with_layout(header.word_size, header.encoding)
    }

    #[must_use]
    pub fn with_layout(word_size: WordSize, encoding: &'static Encoding) -> Self {
        Self {
            layout: PageLayout::new(word_size),
            encoding,
            phase: Phase::Collecting(SubheaderArena::new()),
            rows_emitted: 0,
        }
    }

    #[must_use]
    pub const fn rows_emitted(&self) -> u64 {
        self.rows_emitted
    }

    /// Resolved schema, once the first data-bearing page has been seen.
    #[must_use]
    pub fn schema(&self) -> Option<&Schema> {
        match &self.phase {
            Phase::Resolved(schema) => Some(schema),
            Phase::Collecting(_) => None,
        }
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.schema().map_or(0, |schema| schema.columns.len())
    }

    /// Processes the page at `index`.
    ///
    /// # Errors
    ///
    /// Returns an error when the page type is unknown, a subheader or row
    /// lies outside the page, or the schema cannot be assembled.
    pub fn process_page<C>(&mut self, index: u64, bytes: &[u8], consumer: &mut C) -> Result<PageOutcome>
    where
        C: SasConsumer + ?Sized,
    {
        let page = Page::classify(index, bytes, self.layout)?;
        tracing::debug!(page = index, kind = ?page.kind, "processing page");

        if page.kind == PageKind::Amd {
            tracing::info!(page = index, "skipping AMD page");
            return Ok(PageOutcome::Continue);
        }

        if page.kind.has_subheaders() {
            match &mut self.phase {
                Phase::Collecting(arena) => {
                    for subheader in page.subheaders()? {
                        arena.push(subheader);
                    }
                }
                Phase::Resolved(_) => {
                    tracing::debug!(page = index, "ignoring metadata after schema resolution");
                }
            }
        }

        if !page.kind.has_rows() {
            return Ok(PageOutcome::Continue);
        }

        if let Phase::Collecting(_) = self.phase
            && !self.resolve(consumer)?
        {
            return Ok(PageOutcome::Finished(ReadOutcome::DataDeclined));
        }
        self.emit_rows(&page, consumer)
    }

    /// Ends the pass after the last declared page.
    ///
    /// A file without data-bearing pages still reports its columns here.
    ///
    /// # Errors
    ///
    /// Returns an error if the collected subheaders cannot form a schema.
    pub fn finish<C>(&mut self, consumer: &mut C) -> Result<ReadOutcome>
    where
        C: SasConsumer + ?Sized,
    {
        if let Phase::Collecting(_) = self.phase {
            tracing::debug!("no data page seen; assembling schema at end of pages");
            if !self.resolve(consumer)? {
                return Ok(ReadOutcome::DataDeclined);
            }
        }
        if let Phase::Resolved(schema) = &self.phase
            && self.rows_emitted < schema.rows.row_count
        {
            tracing::warn!(
                declared = schema.rows.row_count,
                emitted = self.rows_emitted,
                "fewer rows stored than declared"
            );
        }
        Ok(ReadOutcome::Completed)
    }

    /// Assembles the schema, reports it, and asks whether rows are wanted.
    fn resolve<C>(&mut self, consumer: &mut C) -> Result<bool>
    where
        C: SasConsumer + ?Sized,
    {
        let Phase::Collecting(arena) = &mut self.phase else {
            return Ok(true);
        };
        let arena = std::mem::take(arena);
        tracing::debug!(subheaders = arena.len(), "assembling schema");
        let schema = assemble_schema(&arena, self.layout.word_size(), self.encoding)?;
        drop(arena);

        for column in &schema.columns {
            consumer.column(column);
        }
        tracing::info!(
            columns = schema.columns.len(),
            rows = schema.rows.row_count,
            "schema resolved"
        );
        self.phase = Phase::Resolved(schema);

        let wants_data = consumer.read_data();
        if !wants_data {
            tracing::info!("consumer declined row data");
        }
        Ok(wants_data)
    }

    fn emit_rows<C>(&mut self, page: &Page<'_>, consumer: &mut C) -> Result<PageOutcome>
    where
        C: SasConsumer + ?Sized,
    {
        let Phase::Resolved(schema) = &self.phase else {
            return Ok(PageOutcome::Continue);
        };
        let row_count = schema.rows.row_count;
        let decoder = RowDecoder::new(schema, self.encoding);
        let batch = decoder.batch(page, row_count.saturating_sub(self.rows_emitted))?;
        tracing::debug!(page = page.index, rows = batch.len(), "decoding rows");

        let mut values = RowValues::new();
        for row in 0..batch.len() {
            decoder.decode_into(&batch, row, &mut values)?;
            self.rows_emitted += 1;
            if !consumer.row(self.rows_emitted, &values) {
                tracing::info!(rows = self.rows_emitted, "consumer requested stop");
                return Ok(PageOutcome::Finished(ReadOutcome::Stopped));
            }
        }

        if self.rows_emitted >= row_count {
            return Ok(PageOutcome::Finished(ReadOutcome::Completed));
        }
        Ok(PageOutcome::Continue)
    }
}
