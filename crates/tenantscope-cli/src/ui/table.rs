//! Plain-text table rendering for terminal output.

use tenantscope_core::utils::{contains_ignore_case, truncate_string};

/// Widest a column may grow before cells are truncated.
const MAX_COLUMN_WIDTH: usize = 48;

const COLUMN_GAP: &str = "  ";

#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Keep rows with any cell containing `query`.
    pub fn retain_matching(&mut self, query: &str) {
        let query = query.to_lowercase();
        self.rows
            .retain(|row| row.iter().any(|cell| contains_ignore_case(cell, &query)));
    }

    pub fn truncate(&mut self, limit: usize) {
        self.rows.truncate(limit);
    }

    pub fn render(&self) -> String {
        let widths: Vec<usize> = (0..self.headers.len())
            .map(|i| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(i))
                    .map(|cell| cell.chars().count())
                    .chain(std::iter::once(self.headers[i].chars().count()))
                    .max()
                    .unwrap_or(0)
                    .min(MAX_COLUMN_WIDTH)
            })
            .collect();

        let mut out = String::new();
        out.push_str(&Self::line(&self.headers, &widths));
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        out.push_str(&Self::line(&rule, &widths));
        for row in &self.rows {
            out.push_str(&Self::line(row, &widths));
        }
        out
    }

    fn line(cells: &[String], widths: &[usize]) -> String {
        let padded: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, width)| {
                let cell = cells.get(i).map(String::as_str).unwrap_or("");
                let cell = truncate_string(&cell.replace(['\r', '\n'], " "), *width);
                let pad = width.saturating_sub(cell.chars().count());
                format!("{}{}", cell, " ".repeat(pad))
            })
            .collect();
        let mut line = padded.join(COLUMN_GAP).trim_end().to_string();
        line.push('\n');
        line
    }
}
