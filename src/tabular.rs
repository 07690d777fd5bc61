//! Tabular data → structured narrative text.
//!
//! Spreadsheets and delimited files are converted into a header line plus
//! one labelled block per record:
//!
//! ```text
//! Columns: name, age
//!
//! Entry 1:
//! name: Alice
//! age: 30
//!
//! Entry 2:
//! name: Bob
//! ```
//!
//! Blocks are separated by a blank line (`\n\n`), which the chunker treats
//! as its preferred split point, so a record is never split across chunks
//! unless it is larger than a chunk on its own.

/// Row/column data with optional cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row. Short rows are padded with missing cells; cells past
    /// the last known column get a generated `Unnamed: <n>` column.
    pub fn push_row(&mut self, mut row: Vec<Option<String>>) {
        while self.columns.len() < row.len() {
            let n = self.columns.len();
            self.columns.push(unnamed_column(n));
            for existing in &mut self.rows {
                existing.push(None);
            }
        }
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }
}

/// Column label used when a header cell is empty.
pub fn unnamed_column(position: usize) -> String {
    format!("Unnamed: {}", position)
}

/// Convert a cell string into a value. Only the empty string is missing;
/// whitespace-only text is kept as a value.
pub fn cell(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Render a table as normalized text.
///
/// Columns with no values and rows with no values (over the surviving
/// columns) are dropped. Entry numbers are the row's 1-based position in
/// the source table, so dropping an empty row does not renumber later rows.
pub fn normalize(table: &Table) -> String {
    let kept_columns: Vec<usize> = (0..table.columns.len())
        .filter(|&c| {
            table
                .rows
                .iter()
                .any(|row| row.get(c).and_then(present).is_some())
        })
        .collect();

    let header = kept_columns
        .iter()
        .map(|&c| table.columns[c].as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let mut sections = vec![format!("Columns: {}", header)];

    for (position, row) in table.rows.iter().enumerate() {
        let fields: Vec<String> = kept_columns
            .iter()
            .filter_map(|&c| {
                row.get(c)
                    .and_then(present)
                    .map(|value| format!("{}: {}", table.columns[c], value))
            })
            .collect();
        if fields.is_empty() {
            continue;
        }

        let mut block = format!("Entry {}:", position + 1);
        for field in fields {
            block.push('\n');
            block.push_str(&field);
        }
        sections.push(block);
    }

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: &[&[&str]]) -> Table {
        let mut t = Table::new(columns.iter().map(|c| c.to_string()).collect());
        for row in rows {
            t.push_row(row.iter().map(|v| cell(v)).collect());
        }
        t
    }

    #[test]
    fn renders_header_and_entries() {
        let t = table(&["name", "age"], &[&["Alice", "30"], &["Bob", "25"]]);
        assert_eq!(
            normalize(&t),
            "Columns: name, age\n\nEntry 1:\nname: Alice\nage: 30\n\nEntry 2:\nname: Bob\nage: 25"
        );
    }

    #[test]
    fn omits_missing_values() {
        let t = table(&["name", "age"], &[&["Alice", ""], &["", "25"]]);
        assert_eq!(
            normalize(&t),
            "Columns: name, age\n\nEntry 1:\nname: Alice\n\nEntry 2:\nage: 25"
        );
    }

    #[test]
    fn drops_empty_columns_and_rows_keeping_positions() {
        let t = table(
            &["name", "notes", "age"],
            &[&["Alice", "", "30"], &["", "", ""], &["Carol", "", "41"]],
        );
        assert_eq!(
            normalize(&t),
            "Columns: name, age\n\nEntry 1:\nname: Alice\nage: 30\n\nEntry 3:\nname: Carol\nage: 41"
        );
    }

    #[test]
    fn all_empty_reduces_to_header() {
        let t = table(&["a", "b"], &[&["", ""], &["", ""]]);
        assert_eq!(normalize(&t), "Columns: ");
        assert_eq!(normalize(&Table::new(vec!["x".into()])), "Columns: ");
    }

    #[test]
    fn whitespace_values_are_kept() {
        let t = table(&["name", "notes"], &[&["Alice", "  "]]);
        assert_eq!(cell(" "), Some(" ".to_string()));
        assert_eq!(
            normalize(&t),
            "Columns: name, notes\n\nEntry 1:\nname: Alice\nnotes:   "
        );
    }

    #[test]
    fn values_are_written_verbatim() {
        let t = table(&["price"], &[&["2.50"], &["1e3"]]);
        let text = normalize(&t);
        assert!(text.contains("price: 2.50"));
        assert!(text.contains("price: 1e3"));
    }

    #[test]
    fn long_rows_get_unnamed_columns() {
        let mut t = Table::new(vec!["a".into()]);
        t.push_row(vec![cell("1")]);
        t.push_row(vec![cell("2"), cell("extra")]);
        assert_eq!(t.columns, vec!["a".to_string(), "Unnamed: 1".to_string()]);
        assert_eq!(t.rows[0], vec![Some("1".to_string()), None]);
        assert!(normalize(&t).contains("Unnamed: 1: extra"));
    }
}
