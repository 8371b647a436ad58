use crate::metadata::ColumnDescriptor;
use crate::sinks::SasConsumer;
use crate::value::Value;

/// Owned copy of a decoded row.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedRow {
    pub row_number: u64,
    pub values: Vec<Value<'static>>,
}

/// Buffers the schema and rows of a dataset in memory.
#[derive(Debug, Default, Clone)]
pub struct RowCollector {
    pub columns: Vec<ColumnDescriptor>,
    pub rows: Vec<CollectedRow>,
    limit: Option<usize>,
    schema_only: bool,
}

impl RowCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops the read once `limit` rows have been collected.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Declines row data; only the columns are recorded.
    #[must_use]
    pub const fn schema_only(mut self) -> Self {
        self.schema_only = true;
        self
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

impl SasConsumer for RowCollector {
    fn column(&mut self, column: &ColumnDescriptor) {
        self.columns.push(column.clone());
    }

    fn read_data(&mut self) -> bool {
        !self.schema_only && self.limit != Some(0)
    }

    fn row(&mut self, row_number: u64, values: &[Value<'_>]) -> bool {
        self.rows.push(CollectedRow {
            row_number,
            values: values.iter().cloned().map(Value::into_owned).collect(),
        });
        self.limit.is_none_or(|limit| self.rows.len() < limit)
    }
}
