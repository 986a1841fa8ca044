//! In-memory bundle rows and the overwrite merge

use datamarket_types::DataFrequency;
use std::collections::BTreeMap;

use crate::BundleError;

/// Bundle rows are unique and ordered on this key
pub type RowKey = (i64, String);

/// One observation: a symbol's values at a point in time
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Unix seconds
    pub date: i64,
    pub symbol: String,
    /// One entry per value column, `None` for a null cell
    pub values: Vec<Option<f64>>,
}

impl Row {
    pub fn new(date: i64, symbol: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            date,
            symbol: symbol.into(),
            values,
        }
    }

    pub fn key(&self) -> RowKey {
        (self.date, self.symbol.clone())
    }
}

/// The full contents of a bundle
#[derive(Debug, Clone, PartialEq)]
pub struct BundleData {
    pub frequency: DataFrequency,
    pub value_columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl BundleData {
    /// Build a bundle, sorting rows by key; later rows win on duplicate keys
    pub fn new(
        frequency: DataFrequency,
        value_columns: Vec<String>,
        rows: Vec<Row>,
    ) -> Result<Self, BundleError> {
        let data = Self {
            frequency,
            value_columns,
            rows: Vec::new(),
        };
        data.merged_with(rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows dated on or after `start`
    pub fn since(&self, start: i64) -> impl Iterator<Item = &Row> {
        self.rows.iter().filter(move |row| row.date >= start)
    }

    /// Combine with an incoming bundle; incoming rows replace existing rows
    /// that share their `(date, symbol)` key
    pub fn merge(self, incoming: BundleData) -> Result<Self, BundleError> {
        if incoming.frequency != self.frequency {
            return Err(BundleError::FrequencyMismatch {
                expected: self.frequency,
                found: incoming.frequency,
            });
        }
        if incoming.value_columns != self.value_columns {
            return Err(BundleError::SchemaMismatch {
                existing: self.value_columns,
                incoming: incoming.value_columns,
            });
        }
        self.merged_with(incoming.rows)
    }

    fn merged_with(self, incoming: Vec<Row>) -> Result<Self, BundleError> {
        let width = self.value_columns.len();
        let mut by_key: BTreeMap<RowKey, Row> = BTreeMap::new();

        for row in self.rows.into_iter().chain(incoming) {
            if row.values.len() != width {
                return Err(BundleError::RowWidth {
                    expected: width,
                    found: row.values.len(),
                });
            }
            by_key.insert(row.key(), row);
        }

        Ok(Self {
            frequency: self.frequency,
            value_columns: self.value_columns,
            rows: by_key.into_values().collect(),
        })
    }
}
