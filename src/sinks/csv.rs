use std::borrow::Cow;
use std::io::Write;

use csv::{ByteRecord, Writer, WriterBuilder};
use itoa::Buffer as ItoaBuffer;
use ryu::Buffer as RyuBuffer;

use crate::error::{Error, Result};
use crate::metadata::ColumnDescriptor;
use crate::sinks::SasConsumer;
use crate::value::Value;

const DEFAULT_DELIMITER: u8 = b',';
const DEFAULT_SCRATCH_CAPACITY: usize = 32;

/// Largest magnitude below which every integral double is exactly an `i64`.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Writes decoded rows into a delimited text file (CSV/TSV).
///
/// Write failures cannot be reported through [`SasConsumer`], so the first
/// one stops the read and is returned by [`CsvSink::finish`].
pub struct CsvSink<W: Write> {
    output: Option<W>,
    writer: Option<Writer<W>>,
    delimiter: u8,
    write_headers: bool,
    header_written: bool,
    max_rows: Option<u64>,
    names: Vec<String>,
    rows_written: u64,
    record: ByteRecord,
    scratch: Vec<Vec<u8>>,
    ryu: RyuBuffer,
    itoa: ItoaBuffer,
    error: Option<Error>,
}

impl<W: Write> CsvSink<W> {
    #[must_use]
    pub fn new(output: W) -> Self {
        Self {
            output: Some(output),
            writer: None,
            delimiter: DEFAULT_DELIMITER,
            write_headers: true,
            header_written: false,
            max_rows: None,
            names: Vec::new(),
            rows_written: 0,
            record: ByteRecord::new(),
            scratch: Vec::new(),
            ryu: RyuBuffer::new(),
            itoa: ItoaBuffer::new(),
            error: None,
        }
    }

    #[must_use]
    pub const fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    #[must_use]
    pub const fn with_headers(mut self, headers: bool) -> Self {
        self.write_headers = headers;
        self
    }

    /// Stops the read after `max_rows` rows have been written.
    #[must_use]
    pub const fn with_max_rows(mut self, max_rows: u64) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    #[must_use]
    pub const fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Flushes buffered output and returns the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Sink`] carrying the first write failure seen during
    /// the read, or a failure while flushing.
    pub fn finish(mut self) -> Result<W> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.write_header()?;
        match self.writer.take() {
            Some(mut writer) => {
                writer
                    .flush()
                    .map_err(|e| sink_error(format!("csv flush failed: {e}")))?;
                writer
                    .into_inner()
                    .map_err(|e| sink_error(format!("csv into_inner failed: {}", e.error())))
            }
            None => self
                .output
                .take()
                .ok_or_else(|| sink_error("CSV sink output already taken")),
        }
    }

    fn build_writer(&mut self) -> Result<()> {
        if self.writer.is_some() {
            return Ok(());
        }
        let output = self
            .output
            .take()
            .ok_or_else(|| sink_error("CSV sink output already taken"))?;
        let mut builder = WriterBuilder::new();
        builder.delimiter(self.delimiter);
        self.writer = Some(builder.from_writer(output));
        Ok(())
    }

    fn write_header(&mut self) -> Result<()> {
        self.build_writer()?;
        if self.header_written || !self.write_headers || self.names.is_empty() {
            return Ok(());
        }
        self.header_written = true;
        let header: ByteRecord = self.names.iter().map(String::as_bytes).collect();
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| sink_error("csv writer missing"))?;
        writer
            .write_byte_record(&header)
            .map_err(|e| sink_error(format!("csv header write failed: {e}")))
    }

    fn write_row(&mut self, values: &[Value<'_>]) -> Result<()> {
        if values.len() != self.names.len() {
            return Err(sink_error(format!(
                "row length {} does not match expected {}",
                values.len(),
                self.names.len()
            )));
        }
        self.record.clear();
        for (value, buf) in values.iter().zip(self.scratch.iter_mut()) {
            encode_value(value, buf, &mut self.ryu, &mut self.itoa);
            self.record.push_field(buf);
        }
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| sink_error("csv writer missing"))?;
        writer
            .write_byte_record(&self.record)
            .map_err(|e| sink_error(format!("csv write failed: {e}")))
    }

    fn record_failure(&mut self, err: Error) -> bool {
        tracing::error!(error = %err, "csv sink stopped");
        self.error = Some(err);
        false
    }
}

impl<W: Write> SasConsumer for CsvSink<W> {
    fn column(&mut self, column: &ColumnDescriptor) {
        self.names.push(column.name.clone());
        self.scratch.push(Vec::with_capacity(DEFAULT_SCRATCH_CAPACITY));
    }

    fn read_data(&mut self) -> bool {
        if let Err(err) = self.write_header() {
            return self.record_failure(err);
        }
        self.max_rows != Some(0)
    }

    fn row(&mut self, _row_number: u64, values: &[Value<'_>]) -> bool {
        if self.error.is_some() {
            return false;
        }
        if let Err(err) = self.write_row(values) {
            return self.record_failure(err);
        }
        self.rows_written += 1;
        self.max_rows.is_none_or(|max| self.rows_written < max)
    }
}

fn sink_error(details: impl Into<Cow<'static, str>>) -> Error {
    Error::Sink {
        details: details.into(),
    }
}

/// Integral values print without a fraction; NaN and missing values are empty.
fn encode_value(value: &Value<'_>, out: &mut Vec<u8>, ryu: &mut RyuBuffer, itoa: &mut ItoaBuffer) {
    out.clear();
    match value {
        Value::Missing => {}
        Value::Float(v) if v.is_nan() => {}
        Value::Float(v) if v.fract() == 0.0 && v.abs() < MAX_EXACT_INTEGER => {
            #[allow(clippy::cast_possible_truncation)]
            let integral = *v as i64;
            out.extend_from_slice(itoa.format(integral).as_bytes());
        }
        Value::Float(v) => out.extend_from_slice(ryu.format(*v).as_bytes()),
        Value::Str(s) => out.extend_from_slice(s.as_bytes()),
    }
}
