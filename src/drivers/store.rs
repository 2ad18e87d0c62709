use std::fmt;

use crate::drivers::frame::SampleBlock;
use crate::drivers::OxyError;

/// Fixed column set of the series store.
///
/// Device columns arrive over the wire; derived columns are only ever written
/// by the spectral analyzer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    Ts,
    A0,
    A1,
    A2,
    A3,
    A4,
    A5,
    A6,
    A7,
    F,
    Cadre,
    Signal,
    Fs,
    F2,
}
impl Column {
    pub const ALL: [Column; 14] = [
        Column::Ts,
        Column::A0,
        Column::A1,
        Column::A2,
        Column::A3,
        Column::A4,
        Column::A5,
        Column::A6,
        Column::A7,
        Column::F,
        Column::Cadre,
        Column::Signal,
        Column::Fs,
        Column::F2,
    ];
    pub fn name(self) -> &'static str {
        match self {
            Column::Ts => "ts",
            Column::A0 => "A0",
            Column::A1 => "A1",
            Column::A2 => "A2",
            Column::A3 => "A3",
            Column::A4 => "A4",
            Column::A5 => "A5",
            Column::A6 => "A6",
            Column::A7 => "A7",
            Column::F => "F",
            Column::Cadre => "cadre",
            Column::Signal => "signal",
            Column::Fs => "fs",
            Column::F2 => "F2",
        }
    }
    /// Columns the device may send.
    pub fn is_device(self) -> bool {
        matches!(self, Column::Ts | Column::F) || self.is_channel()
    }
    /// Raw analog inputs `A0`..`A7`.
    pub fn is_channel(self) -> bool {
        matches!(
            self,
            Column::A0
                | Column::A1
                | Column::A2
                | Column::A3
                | Column::A4
                | Column::A5
                | Column::A6
                | Column::A7
        )
    }
    /// Resolves a wire name. Derived column names are rejected.
    pub fn from_wire(name: &str) -> Option<Column> {
        Column::ALL
            .iter()
            .copied()
            .find(|c| c.is_device() && c.name() == name)
    }
    /// Resolves the name of a raw channel, as used in the configuration.
    pub fn channel(name: &str) -> Result<Column, OxyError> {
        Column::from_wire(name)
            .filter(|c| c.is_channel())
            .ok_or_else(|| OxyError::NotAChannel(name.to_string()))
    }
    fn index(self) -> usize {
        self as usize
    }
}
impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
/// Append-only table, one row per sample, every column sharing the row index.
/// Unset cells hold `NaN`.
#[derive(Clone, Debug)]
pub struct SeriesStore {
    columns: Vec<Vec<f64>>, // column -> rows
    rows: usize,
}
impl Default for SeriesStore {
    fn default() -> Self {
        Self::new()
    }
}
impl SeriesStore {
    pub fn new() -> Self {
        Self {
            columns: Column::ALL.iter().map(|_| Vec::new()).collect(),
            rows: 0,
        }
    }
    pub fn len(&self) -> usize {
        self.rows
    }
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }
    pub fn column(&self, column: Column) -> &[f64] {
        &self.columns[column.index()]
    }
    /// Last `n` values of a column (fewer if the store is shorter).
    pub fn tail(&self, column: Column, n: usize) -> &[f64] {
        let values = self.column(column);
        &values[values.len().saturating_sub(n)..]
    }
    /// Appends a block as new rows and returns how many were added.
    ///
    /// Each block column is front-padded to the block's row count; columns the
    /// block does not carry get `NaN` for the new rows.
    pub fn append_block(&mut self, block: &SampleBlock) -> usize {
        let added = block.rows();
        if added == 0 {
            return 0;
        }
        for column in Column::ALL {
            let target = &mut self.columns[column.index()];
            match block.get(column) {
                Some(values) => {
                    let pad = added.saturating_sub(values.len());
                    target.extend(std::iter::repeat(f64::NAN).take(pad));
                    target.extend_from_slice(values);
                }
                None => target.extend(std::iter::repeat(f64::NAN).take(added)),
            }
        }
        self.rows += added;
        added
    }
    /// Overwrites the last `values.len()` rows of `column`, anchored to the end
    /// of the store.
    pub fn write_tail(&mut self, column: Column, values: &[f64]) -> Result<(), OxyError> {
        if values.len() > self.rows {
            return Err(OxyError::InsufficientWindow {
                needed: values.len(),
                available: self.rows,
            });
        }
        let start = self.rows - values.len();
        self.columns[column.index()][start..].copy_from_slice(values);
        Ok(())
    }
    /// Read-only view of the trailing `n` rows, `None` until enough rows exist.
    pub fn window(&self, n: usize) -> Option<Window<'_>> {
        if n == 0 || self.rows < n {
            return None;
        }
        Some(Window {
            store: self,
            start: self.rows - n,
        })
    }
}
/// The last N rows of a [`SeriesStore`].
#[derive(Clone, Copy, Debug)]
pub struct Window<'a> {
    store: &'a SeriesStore,
    start: usize,
}
impl<'a> Window<'a> {
    pub fn len(&self) -> usize {
        self.store.rows - self.start
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Row index of the first row in the window.
    pub fn start(&self) -> usize {
        self.start
    }
    pub fn column(&self, column: Column) -> &'a [f64] {
        &self.store.columns[column.index()][self.start..]
    }
}
