// SPDX-License-Identifier: AGPL-3.0-or-later
//! Pending leaf payloads
//!
//! A payload is whatever a leaf hands to the asset store: a table, a chart
//! specification, a rendered figure, a JSON value, a file on disk, or an
//! opaque host object. Payloads are reference counted so that copying a
//! block never duplicates the underlying data.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// A single table cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Int(i) => write!(f, "{i}"),
            Cell::Float(x) => write!(f, "{x}"),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<i64> for Cell {
    fn from(i: i64) -> Self {
        Cell::Int(i)
    }
}

impl From<f64> for Cell {
    fn from(x: f64) -> Self {
        Cell::Float(x)
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Cell::Bool(b)
    }
}

/// Column-named tabular data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl TableData {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row, padding or truncating it to the column count
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Null);
        self.rows.push(row);
    }

    pub fn with_row(mut self, row: Vec<Cell>) -> Self {
        self.push_row(row);
        self
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    pub fn cell_count(&self) -> usize {
        self.rows.len() * self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_count() == 0
    }
}

/// Rendered figure format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FigureFormat {
    Svg,
    Png,
}

impl FigureFormat {
    pub const fn extension(&self) -> &'static str {
        match self {
            FigureFormat::Svg => ".svg",
            FigureFormat::Png => ".png",
        }
    }

    pub const fn mime(&self) -> &'static str {
        match self {
            FigureFormat::Svg => "image/svg+xml",
            FigureFormat::Png => "image/png",
        }
    }
}

/// A figure already rendered by a plotting library
#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub format: FigureFormat,
    pub bytes: Vec<u8>,
}

impl Figure {
    pub fn svg(markup: impl Into<String>) -> Self {
        Self {
            format: FigureFormat::Svg,
            bytes: markup.into().into_bytes(),
        }
    }

    pub fn png(bytes: Vec<u8>) -> Self {
        Self {
            format: FigureFormat::Png,
            bytes,
        }
    }
}

/// Host object with no dedicated encoder
///
/// Only the fallback encoder accepts these; it writes whatever
/// `write_serialized` produces.
pub trait OpaqueObject: fmt::Debug + Send + Sync {
    /// Concrete type name reported in errors
    fn type_name(&self) -> &str;

    fn write_serialized(&self, sink: &mut dyn Write) -> io::Result<()>;
}

/// Payload awaiting registration in the asset store
#[derive(Debug, Clone)]
pub enum Payload {
    Table(Arc<TableData>),
    /// Vega-Lite chart specification
    Chart(Arc<serde_json::Value>),
    Figure(Arc<Figure>),
    Json(Arc<serde_json::Value>),
    /// File on disk, copied into the store when converted
    File(PathBuf),
    Object(Arc<dyn OpaqueObject>),
}

impl Payload {
    /// Runtime type name used for dispatch errors
    pub fn type_name(&self) -> &str {
        match self {
            Payload::Table(_) => "table",
            Payload::Chart(_) => "vega-lite chart",
            Payload::Figure(figure) => match figure.format {
                FigureFormat::Svg => "svg figure",
                FigureFormat::Png => "png figure",
            },
            Payload::Json(_) => "json",
            Payload::File(_) => "file",
            Payload::Object(obj) => obj.type_name(),
        }
    }
}

/// Extension and MIME type of an encoded asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetMeta {
    pub ext: String,
    pub mime: String,
}

impl AssetMeta {
    pub fn new(ext: impl Into<String>, mime: impl Into<String>) -> Self {
        Self {
            ext: ext.into(),
            mime: mime.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_row_pads_to_columns() {
        let mut table = TableData::new(vec!["a".into(), "b".into(), "c".into()]);
        table.push_row(vec![Cell::Int(1)]);
        assert_eq!(table.rows[0], vec![Cell::Int(1), Cell::Null, Cell::Null]);
        assert_eq!(table.shape(), (1, 3));
        assert_eq!(table.cell_count(), 3);
    }

    #[test]
    fn test_cells_serialize_untagged() {
        let row: Vec<Cell> = vec![Cell::Null, true.into(), 2i64.into(), 0.5.into(), "x".into()];
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"[null,true,2,0.5,"x"]"#);
    }

    #[test]
    fn test_payload_type_names() {
        let figure = Payload::Figure(Arc::new(Figure::png(vec![0x89])));
        assert_eq!(figure.type_name(), "png figure");
        assert_eq!(Payload::File(PathBuf::from("a.csv")).type_name(), "file");
    }
}
