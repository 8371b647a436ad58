mod collect;
mod csv;

use crate::metadata::ColumnDescriptor;
use crate::value::Value;

pub use collect::{CollectedRow, RowCollector};
pub use self::csv::CsvSink;

/// Receives the decoded dataset as it streams out of a single read pass.
///
/// Calls arrive in a fixed order: [`column`](Self::column) once per column in
/// index order, then [`read_data`](Self::read_data) exactly once, then
/// [`row`](Self::row) for each row in file order.
pub trait SasConsumer {
    /// Reports one column of the resolved schema.
    fn column(&mut self, column: &ColumnDescriptor);

    /// Asked once after the schema has been reported. Returning `false` ends
    /// the pass before any row is decoded.
    fn read_data(&mut self) -> bool {
        true
    }

    /// Receives one decoded row. `row_number` starts at 1. Returning `false`
    /// stops the whole read immediately.
    fn row(&mut self, row_number: u64, values: &[Value<'_>]) -> bool;
}

impl<C: SasConsumer + ?Sized> SasConsumer for &mut C {
    fn column(&mut self, column: &ColumnDescriptor) {
        (**self).column(column);
    }

    fn read_data(&mut self) -> bool {
        (**self).read_data()
    }

    fn row(&mut self, row_number: u64, values: &[Value<'_>]) -> bool {
        (**self).row(row_number, values)
    }
}
