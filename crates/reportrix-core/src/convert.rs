// SPDX-License-Identifier: AGPL-3.0-or-later
//! Blockifying primitive values

use crate::block::Block;
use crate::payload::{Figure, OpaqueObject, Payload, TableData};
use crate::traits::{Blockify, BuildError, Result};
use std::path::PathBuf;
use std::sync::Arc;

/// Tables with more cells than this become data tables
pub const TABLE_CELL_THRESHOLD: usize = 250;

/// A value that may be placed in a container without wrapping it first
#[derive(Debug, Clone)]
pub enum Value {
    Block(Block),
    Text(String),
    Table(TableData),
    /// Vega-Lite specification
    Chart(serde_json::Value),
    Figure(Figure),
    Path(PathBuf),
    Json(serde_json::Value),
    Opaque(Arc<dyn OpaqueObject>),
}

impl From<Block> for Value {
    fn from(block: Block) -> Self {
        Value::Block(block)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl From<TableData> for Value {
    fn from(table: TableData) -> Self {
        Value::Table(table)
    }
}

impl From<Figure> for Value {
    fn from(figure: Figure) -> Self {
        Value::Figure(figure)
    }
}

impl From<PathBuf> for Value {
    fn from(path: PathBuf) -> Self {
        Value::Path(path)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::Json(json)
    }
}

/// Built-in conversion rules
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConverter;

impl Blockify for DefaultConverter {
    fn blockify(&self, value: Value) -> Result<Block> {
        match value {
            Value::Block(block) => Ok(block),
            Value::Text(text) => Ok(Block::text(text)),
            Value::Table(table) if table.cell_count() <= TABLE_CELL_THRESHOLD => {
                Ok(Block::table(table))
            }
            Value::Table(table) => Ok(Block::data_table(table)),
            Value::Chart(spec) => Ok(Block::plot(Payload::Chart(Arc::new(spec)))),
            Value::Figure(figure) => Ok(Block::plot(Payload::Figure(Arc::new(figure)))),
            Value::Path(path) => Ok(Block::attachment(Payload::File(path))),
            Value::Json(json) if json.is_object() || json.is_array() => {
                Ok(Block::attachment(Payload::Json(Arc::new(json))))
            }
            Value::Json(json) => Err(BuildError::UnsupportedValue {
                type_name: format!("json {}", json_kind(&json)),
            }),
            Value::Opaque(obj) => Err(BuildError::UnsupportedValue {
                type_name: obj.type_name().to_string(),
            }),
        }
    }
}

fn json_kind(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::Cell;
    use serde_json::json;

    fn table(rows: usize, cols: usize) -> TableData {
        let columns = (0..cols).map(|c| format!("c{c}")).collect();
        let mut table = TableData::new(columns);
        for r in 0..rows {
            table.push_row((0..cols).map(|c| Cell::Int((r * cols + c) as i64)).collect());
        }
        table
    }

    #[test]
    fn test_string_becomes_text() {
        let block = DefaultConverter.blockify("  hello ".into()).unwrap();
        assert_eq!(block.tag_name(), "Text");
        assert_eq!(block.as_leaf().unwrap().content(), Some("hello"));
    }

    #[test]
    fn test_table_threshold() {
        let small = DefaultConverter.blockify(table(25, 10).into()).unwrap();
        assert_eq!(small.tag_name(), "Table");
        let large = DefaultConverter.blockify(table(26, 10).into()).unwrap();
        assert_eq!(large.tag_name(), "DataTable");
        assert_eq!(large.as_leaf().unwrap().attributes()["rows"], "26");
    }

    #[test]
    fn test_json_containers_become_attachments() {
        let block = DefaultConverter.blockify(json!({"k": [1, 2]}).into()).unwrap();
        assert_eq!(block.tag_name(), "Attachment");
        let err = DefaultConverter.blockify(json!(3).into()).unwrap_err();
        assert!(matches!(err, BuildError::UnsupportedValue { type_name } if type_name == "json number"));
    }

    #[derive(Debug)]
    struct Model;

    impl OpaqueObject for Model {
        fn type_name(&self) -> &str {
            "sklearn.LinearRegression"
        }

        fn write_serialized(&self, sink: &mut dyn std::io::Write) -> std::io::Result<()> {
            sink.write_all(b"model")
        }
    }

    #[test]
    fn test_opaque_rejected_with_type_name() {
        let err = DefaultConverter
            .blockify(Value::Opaque(Arc::new(Model)))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "sklearn.LinearRegression not supported directly, wrap it in an explicit block"
        );
    }
}
