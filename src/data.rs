use chrono::NaiveDateTime;
use log::debug;
use serde::Serialize;

use crate::types::ChangepointError;

/// A single named column of a [`Frame`].
#[derive(Clone, Debug, PartialEq)]
pub enum Column {
    Time(Vec<NaiveDateTime>),
    Numeric(Vec<f64>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Time(v) => v.len(),
            Column::Numeric(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Minimal column-oriented table handed over by the data-loading side.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use trend_changepoint::Frame;
///
/// let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let ts: Vec<_> = (0..3).map(|i| start + chrono::Duration::days(i)).collect();
/// let frame = Frame::new()
///     .with_time_column("ts", ts)
///     .with_numeric_column("y", vec![1.0, 2.0, 3.0]);
/// assert_eq!(frame.n_rows(), Some(3));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    columns: Vec<(String, Column)>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a time column.
    pub fn with_time_column(self, name: impl Into<String>, values: Vec<NaiveDateTime>) -> Self {
        self.with_column(name, Column::Time(values))
    }

    /// Add or replace a numeric column.
    pub fn with_numeric_column(self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.with_column(name, Column::Numeric(values))
    }

    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Self {
        let name = name.into();
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = column,
            None => self.columns.push((name, column)),
        }
        self
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    /// Row count of the first column, if any.
    pub fn n_rows(&self) -> Option<usize> {
        self.columns.first().map(|(_, c)| c.len())
    }

    fn time_column(&self, name: &str) -> Result<&[NaiveDateTime], ChangepointError> {
        match self.column(name) {
            Some(Column::Time(v)) => Ok(v),
            Some(Column::Numeric(_)) => Err(ChangepointError::ColumnKind {
                name: name.to_string(),
                expected: "time",
            }),
            None => Err(ChangepointError::MissingColumn(name.to_string())),
        }
    }

    fn numeric_column(&self, name: &str) -> Result<&[f64], ChangepointError> {
        match self.column(name) {
            Some(Column::Numeric(v)) => Ok(v),
            Some(Column::Time(_)) => Err(ChangepointError::ColumnKind {
                name: name.to_string(),
                expected: "numeric",
            }),
            None => Err(ChangepointError::MissingColumn(name.to_string())),
        }
    }
}

/// Univariate series with strictly increasing timestamps.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimeSeries {
    timestamps: Vec<NaiveDateTime>,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Build a series, validating lengths and strict time ordering.
    ///
    /// # Errors
    /// `LengthMismatch` if the vectors differ in length, `EmptyInput` if they
    /// are empty, `InvalidConfig` if timestamps are not strictly increasing.
    pub fn new(timestamps: Vec<NaiveDateTime>, values: Vec<f64>) -> Result<Self, ChangepointError> {
        if timestamps.len() != values.len() {
            return Err(ChangepointError::LengthMismatch);
        }
        if timestamps.is_empty() {
            return Err(ChangepointError::EmptyInput);
        }
        if let Some(w) = timestamps.windows(2).find(|w| w[1] <= w[0]) {
            return Err(ChangepointError::InvalidConfig(format!(
                "timestamps must be strictly increasing ({} follows {})",
                w[1], w[0]
            )));
        }
        Ok(Self { timestamps, values })
    }

    /// Extract `time_col` / `value_col` from a frame.
    ///
    /// Rows are sorted by time and rows with non-finite values are dropped.
    ///
    /// # Errors
    /// Missing or mistyped columns, mismatched column lengths, duplicate
    /// timestamps, or no finite rows.
    pub fn from_frame(
        frame: &Frame,
        time_col: &str,
        value_col: &str,
    ) -> Result<Self, ChangepointError> {
        let times = frame.time_column(time_col)?;
        let values = frame.numeric_column(value_col)?;
        if times.len() != values.len() {
            return Err(ChangepointError::LengthMismatch);
        }

        let mut rows: Vec<(NaiveDateTime, f64)> = times
            .iter()
            .copied()
            .zip(values.iter().copied())
            .filter(|(_, v)| v.is_finite())
            .collect();
        let dropped = times.len() - rows.len();
        if dropped > 0 {
            debug!("dropped {dropped} rows with non-finite `{value_col}`");
        }
        if rows.is_empty() {
            return Err(ChangepointError::EmptyInput);
        }

        rows.sort_by_key(|&(t, _)| t);
        if let Some(w) = rows.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(ChangepointError::DuplicateTimestamp(w[0].0));
        }

        let (timestamps, values) = rows.into_iter().unzip();
        Ok(Self { timestamps, values })
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn start(&self) -> NaiveDateTime {
        self.timestamps[0]
    }

    pub fn end(&self) -> NaiveDateTime {
        self.timestamps[self.timestamps.len() - 1]
    }
}
