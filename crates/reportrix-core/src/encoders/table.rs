// SPDX-License-Identifier: AGPL-3.0-or-later
//! Table encoders: rendered HTML for small tables, JSON data for large ones

use crate::block::LeafTag;
use crate::payload::{AssetMeta, Payload, TableData};
use crate::traits::AssetEncoder;
use serde::Serialize;
use std::io::{self, Write};

/// Tables above this size render slowly in the viewer
const LARGE_TABLE_CELLS: usize = 500;

/// Static HTML table
pub struct HtmlTableEncoder;

impl HtmlTableEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HtmlTableEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetEncoder for HtmlTableEncoder {
    fn name(&self) -> &'static str {
        "html-table"
    }

    fn accepts(&self, tag: LeafTag, payload: &Payload) -> bool {
        tag == LeafTag::Table && matches!(payload, Payload::Table(_))
    }

    fn meta(&self, _payload: &Payload) -> AssetMeta {
        AssetMeta::new(".tbl.html", "application/vnd.reportrix.table+html")
    }

    fn encode(&self, payload: &Payload, sink: &mut dyn Write) -> io::Result<()> {
        let table = expect_table(payload)?;
        if table.cell_count() > LARGE_TABLE_CELLS {
            tracing::warn!(
                cells = table.cell_count(),
                "large table rendered as HTML, consider a DataTable instead"
            );
        }
        sink.write_all(render_html(table).as_bytes())
    }
}

fn render_html(table: &TableData) -> String {
    let mut output = String::from("<table class=\"dataframe\">\n<thead>\n<tr>");
    for column in &table.columns {
        output.push_str("<th>");
        output.push_str(&html_escape::encode_text(column));
        output.push_str("</th>");
    }
    output.push_str("</tr>\n</thead>\n<tbody>\n");
    for row in &table.rows {
        output.push_str("<tr>");
        for cell in row {
            output.push_str("<td>");
            output.push_str(&html_escape::encode_text(&cell.to_string()));
            output.push_str("</td>");
        }
        output.push_str("</tr>\n");
    }
    output.push_str("</tbody>\n</table>");
    output
}

/// Column-oriented JSON for interactive tables
pub struct DataTableEncoder;

impl DataTableEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DataTableEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct DataTableJson<'a> {
    columns: &'a [String],
    data: &'a [Vec<crate::payload::Cell>],
}

impl AssetEncoder for DataTableEncoder {
    fn name(&self) -> &'static str {
        "data-table"
    }

    fn accepts(&self, tag: LeafTag, payload: &Payload) -> bool {
        matches!(tag, LeafTag::DataTable | LeafTag::Attachment) && matches!(payload, Payload::Table(_))
    }

    fn meta(&self, _payload: &Payload) -> AssetMeta {
        AssetMeta::new(".dt.json", "application/vnd.reportrix.datatable+json")
    }

    fn encode(&self, payload: &Payload, sink: &mut dyn Write) -> io::Result<()> {
        let table = expect_table(payload)?;
        if table.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "empty table provided",
            ));
        }
        let json = DataTableJson {
            columns: &table.columns,
            data: &table.rows,
        };
        serde_json::to_writer(sink, &json).map_err(io::Error::from)
    }
}

fn expect_table(payload: &Payload) -> io::Result<&TableData> {
    match payload {
        Payload::Table(table) => Ok(&**table),
        other => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("expected a table, got {}", other.type_name()),
        )),
    }
}
