//! Materialized result sets.

use serde::Serialize;
use tokio_postgres::{Column, Row};

use crate::error::{ProbeError, Result};
use crate::value::Value;

/// Fully fetched output of a query.
///
/// Columns are addressed from 0. Name lookups ignore ASCII case, since the
/// server folds unquoted identifiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Decodes driver rows. `columns` comes from the prepared statement so
    /// that an empty result still reports its shape.
    pub fn from_rows(columns: &[Column], rows: &[Row]) -> Result<Self> {
        let names = columns.iter().map(|c| c.name().to_string()).collect();
        let mut decoded = Vec::with_capacity(rows.len());
        for row in rows {
            let mut values = Vec::with_capacity(row.len());
            for idx in 0..row.len() {
                values.push(Value::from_row(row, idx)?);
            }
            decoded.push(values);
        }
        Ok(Self::new(names, decoded))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, idx: usize) -> Option<&[Value]> {
        self.rows.get(idx).map(Vec::as_slice)
    }

    pub fn last_row(&self) -> Option<&[Value]> {
        self.rows.last().map(Vec::as_slice)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    pub fn get_by_name(&self, row: usize, name: &str) -> Option<&Value> {
        self.column_index(name).and_then(|col| self.get(row, col))
    }

    /// Integer at `(row, col)`; anything else is an assertion failure.
    pub fn int_at(&self, row: usize, col: usize) -> Result<i64> {
        match self.get(row, col) {
            Some(Value::Int(v)) => Ok(*v),
            Some(other) => Err(ProbeError::assertion(format!(
                "expected integer at row {} column {}, got {}",
                row, col, other
            ))),
            None => Err(ProbeError::assertion(format!(
                "no value at row {} column {} ({} rows, {} columns)",
                row,
                col,
                self.row_count(),
                self.column_count()
            ))),
        }
    }

    /// Text rendering of one row, one entry per column.
    pub fn row_strings(&self, idx: usize) -> Option<Vec<String>> {
        self.row(idx)
            .map(|r| r.iter().map(ToString::to_string).collect())
    }

    /// Every value of one column, top to bottom.
    pub fn column_values(&self, col: usize) -> Vec<&Value> {
        self.rows.iter().filter_map(|r| r.get(col)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResultSet {
        ResultSet::new(
            vec!["id".to_string(), "data".to_string()],
            vec![
                vec![Value::Int(1), Value::from("1961-06-16")],
                vec![Value::Int(2), Value::from("Full Clip")],
            ],
        )
    }

    #[test]
    fn test_shape() {
        let rs = sample();
        assert_eq!(rs.column_count(), 2);
        assert_eq!(rs.row_count(), 2);
        assert!(!rs.is_empty());
        assert!(ResultSet::new(vec!["id".into()], vec![]).is_empty());
    }

    #[test]
    fn test_lookup_by_name_ignores_case() {
        let rs = sample();
        assert_eq!(rs.column_index("DATA"), Some(1));
        assert_eq!(rs.get_by_name(1, "Data"), Some(&Value::from("Full Clip")));
        assert_eq!(rs.get_by_name(0, "missing"), None);
    }

    #[test]
    fn test_last_row_and_strings() {
        let rs = sample();
        assert_eq!(rs.last_row().unwrap()[0], Value::Int(2));
        assert_eq!(
            rs.row_strings(0).unwrap(),
            vec!["1".to_string(), "1961-06-16".to_string()]
        );
        assert!(rs.row_strings(5).is_none());
    }

    #[test]
    fn test_int_at() {
        let rs = sample();
        assert_eq!(rs.int_at(1, 0).unwrap(), 2);
        assert!(matches!(rs.int_at(0, 1), Err(ProbeError::Assertion(_))));
        assert!(matches!(rs.int_at(9, 0), Err(ProbeError::Assertion(_))));
    }

    #[test]
    fn test_column_values() {
        let rs = sample();
        assert_eq!(rs.column_values(0), vec![&Value::Int(1), &Value::Int(2)]);
    }
}
