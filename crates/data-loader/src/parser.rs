//! Parser for catalog exports.
//!
//! Two comma-separated exports are understood:
//! - interactions.csv: user_id,item_id,quantity
//! - orders.csv: order_id,item_id
//!
//! A leading header row is skipped, blank lines are ignored and every field is
//! trimmed. Fields may be quoted, so ids can contain commas. Exports come out
//! of the ERP in Latin-1, so files are decoded byte by byte rather than as
//! UTF-8.

use crate::error::{DataLoadError, Result};
use crate::types::*;
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Read a whole ISO-8859-1 (Latin-1) file.
///
/// Each Latin-1 byte maps directly to the Unicode code point of the same value.
fn read_latin1(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DataLoadError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => DataLoadError::IoError(e),
    })?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    Ok(bytes.iter().map(|&b| b as char).collect())
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Records of `content` with their line numbers.
///
/// Skips blank rows and a first-line header whose first column is
/// `header`. Every record has exactly `expected` fields.
fn read_records(content: &str, expected: usize, header: &str, file: &str) -> Result<Vec<(usize, StringRecord)>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(content.as_bytes());

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| DataLoadError::ParseError {
            file: file.to_string(),
            line: e.position().map(|p| p.line() as usize).unwrap_or(0),
            reason: format!("Malformed row: {}", e),
        })?;
        let line_no = record.position().map(|p| p.line() as usize).unwrap_or(0);

        if record.iter().all(str::is_empty) {
            continue;
        }
        if line_no == 1 && record.get(0).is_some_and(|f| f.eq_ignore_ascii_case(header)) {
            continue;
        }
        if record.len() != expected {
            return Err(DataLoadError::FieldCountMismatch {
                file: file.to_string(),
                expected,
                found: record.len(),
                line: line_no,
            });
        }
        records.push((line_no, record));
    }
    Ok(records)
}

fn require_id(value: &str, what: &str, file: &str, line_no: usize) -> Result<String> {
    if value.is_empty() {
        return Err(DataLoadError::ParseError {
            file: file.to_string(),
            line: line_no,
            reason: format!("Missing {}", what),
        });
    }
    Ok(value.to_string())
}

/// Parse interaction rows from already-decoded text
pub fn parse_interactions_str(content: &str, file: &str) -> Result<Vec<Interaction>> {
    let mut interactions = Vec::new();

    for (line_no, record) in read_records(content, 3, "user_id", file)? {
        let user_id = require_id(&record[0], "user_id", file, line_no)?;
        let item_id = require_id(&record[1], "item_id", file, line_no)?;
        let quantity: f32 = record[2].parse().map_err(|e| DataLoadError::ParseError {
            file: file.to_string(),
            line: line_no,
            reason: format!("Invalid quantity: {}", e),
        })?;

        if !quantity.is_finite() || quantity < 0.0 {
            return Err(DataLoadError::InvalidValue {
                field: "quantity".to_string(),
                value: record[2].to_string(),
            });
        }

        interactions.push(Interaction {
            user_id,
            item_id,
            quantity,
        });
    }

    Ok(interactions)
}

/// Parse order lines from already-decoded text
pub fn parse_order_lines_str(content: &str, file: &str) -> Result<Vec<OrderLine>> {
    read_records(content, 2, "order_id", file)?
        .into_iter()
        .map(|(line_no, record)| {
            Ok(OrderLine {
                order_id: require_id(&record[0], "order_id", file, line_no)?,
                item_id: require_id(&record[1], "item_id", file, line_no)?,
            })
        })
        .collect()
}

/// Parse the interactions export
///
/// Format: user_id,item_id,quantity
pub fn parse_interactions(path: &Path) -> Result<Vec<Interaction>> {
    let content = read_latin1(path)?;
    parse_interactions_str(&content, &file_label(path))
}

/// Parse the order-lines export
///
/// Format: order_id,item_id
pub fn parse_order_lines(path: &Path) -> Result<Vec<OrderLine>> {
    let content = read_latin1(path)?;
    parse_order_lines_str(&content, &file_label(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interactions_with_header() {
        let content = "user_id,item_id,quantity\nC001, A10 ,2\n\nC002,B20,1.5\n";
        let rows = parse_interactions_str(content, "interactions.csv").unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], Interaction::new("C001", "A10", 2.0));
        assert_eq!(rows[1].quantity, 1.5);
    }

    #[test]
    fn test_parse_interactions_rejects_negative_quantity() {
        let result = parse_interactions_str("C001,A10,-1", "interactions.csv");
        assert!(matches!(result, Err(DataLoadError::InvalidValue { .. })));
    }

    #[test]
    fn test_parse_interactions_reports_line_number() {
        let content = "C001,A10,2\nC002,B20,lots\n";
        match parse_interactions_str(content, "interactions.csv") {
            Err(DataLoadError::ParseError { line, file, .. }) => {
                assert_eq!(line, 2);
                assert_eq!(file, "interactions.csv");
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_order_lines_field_count() {
        let result = parse_order_lines_str("O1,A10,extra", "orders.csv");
        assert!(matches!(
            result,
            Err(DataLoadError::FieldCountMismatch { expected: 2, found: 3, .. })
        ));
    }

    #[test]
    fn test_parse_order_lines() {
        let content = "order_id,item_id\nO1,A\nO1,B\nO2,A\n";
        let lines = parse_order_lines_str(content, "orders.csv").unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], OrderLine::new("O1", "B"));
    }

    #[test]
    fn test_quoted_fields_keep_commas() {
        let content = "user_id,item_id,quantity\n\"C,001\",\"Bolt \"\"M8\"\", zinc\",3\n";
        let rows = parse_interactions_str(content, "interactions.csv").unwrap();

        assert_eq!(rows, vec![Interaction::new("C,001", "Bolt \"M8\", zinc", 3.0)]);
    }

    #[test]
    fn test_whitespace_only_rows_are_skipped() {
        let content = "O1,A\n   \nO2,B\n";
        let lines = parse_order_lines_str(content, "orders.csv").unwrap();
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_missing_id_reports_line() {
        let content = "order_id,item_id\nO1,A\n,B\n";
        assert!(matches!(
            parse_order_lines_str(content, "orders.csv"),
            Err(DataLoadError::ParseError { line: 3, .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = parse_interactions(Path::new("/nonexistent/interactions.csv"));
        assert!(matches!(result, Err(DataLoadError::FileNotFound { .. })));
    }
}
