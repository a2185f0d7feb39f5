use crate::cache::QueryStatus;
use crate::core::Record;

pub const COLUMNS: [&str; 3] = ["Price", "Quantity", "Total"];

/// Display rows for a list of records.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordTable {
    pub status: QueryStatus,
    pub rows: Vec<[String; 3]>,
}

impl RecordTable {
    pub fn new(status: QueryStatus, records: &[Record]) -> Self {
        let rows = records
            .iter()
            .map(|r| [r.price.to_string(), r.quantity.to_string(), r.total.to_string()])
            .collect();
        Self { status, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self) -> String {
        if self.status == QueryStatus::Loading && self.rows.is_empty() {
            return "Loading...".to_string();
        }

        // Calculate column widths
        let mut widths: Vec<usize> = COLUMNS.iter().map(|c| c.len()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.len());
            }
        }

        let mut out = String::new();
        let header: Vec<String> = COLUMNS
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{:width$}", col, width = widths[i]))
            .collect();
        out.push_str(header.join(" | ").trim_end());
        out.push('\n');

        let separator: String = widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-");
        out.push_str(&separator);
        out.push('\n');

        for row in &self.rows {
            let line: Vec<String> = row
                .iter()
                .enumerate()
                .map(|(i, cell)| format!("{:>width$}", cell, width = widths[i]))
                .collect();
            out.push_str(&line.join(" | "));
            out.push('\n');
        }

        out.push_str(&format!("\n{} row(s)", self.rows.len()));
        if self.status == QueryStatus::Error {
            out.push_str(" (last refresh failed)");
        }
        out
    }

    pub fn print(&self) {
        println!("{}", self.render());
    }
}
