//! Delimited text encoding and scanning.
//!
//! # Responsibility
//! - Encode rows with RFC 4180 style quoting.
//! - Split text back into rows of raw cells with a single-pass scanner.
//!
//! # Invariants
//! - A cell is quoted iff it contains the delimiter, a quote or a line break.
//! - Inside quotes, a doubled quote decodes to one literal quote and neither
//!   the delimiter nor line breaks split anything.
//! - `\r\n` and `\n` both terminate rows; blank lines produce no row.

pub const DELIMITER: char = ',';
const QUOTE: char = '"';
const BOM: char = '\u{feff}';

/// Encodes one cell, quoting only when required.
pub fn encode_field(value: &str) -> String {
    let needs_quotes = value
        .chars()
        .any(|ch| ch == DELIMITER || ch == QUOTE || ch == '\n' || ch == '\r');
    if !needs_quotes {
        return value.to_string();
    }

    let mut encoded = String::with_capacity(value.len() + 2);
    encoded.push(QUOTE);
    for ch in value.chars() {
        if ch == QUOTE {
            encoded.push(QUOTE);
        }
        encoded.push(ch);
    }
    encoded.push(QUOTE);
    encoded
}

/// Encodes one row without its terminator.
pub fn encode_row<I, T>(cells: I) -> String
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    cells
        .into_iter()
        .map(|cell| encode_field(cell.as_ref()))
        .collect::<Vec<_>>()
        .join(&DELIMITER.to_string())
}

/// Encodes a header plus body rows, each terminated by `\n`.
pub fn encode_table(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut out = encode_row(header.iter().copied());
    out.push('\n');
    for row in rows {
        out.push_str(&encode_row(row));
        out.push('\n');
    }
    out
}

/// One scanned row with the 1-based line number it started on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedRow {
    pub line: usize,
    pub cells: Vec<String>,
}

/// Splits delimited text into rows of raw cells.
///
/// An unterminated quoted cell runs to end of input. A leading UTF-8 BOM is
/// ignored.
pub fn parse_rows(text: &str) -> Vec<ScannedRow> {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    let mut rows = Vec::new();
    let mut cells: Vec<String> = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut row_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                QUOTE if chars.peek() == Some(&QUOTE) => {
                    chars.next();
                    cell.push(QUOTE);
                }
                QUOTE => in_quotes = false,
                '\n' => {
                    line += 1;
                    cell.push(ch);
                }
                _ => cell.push(ch),
            }
            continue;
        }

        match ch {
            QUOTE => in_quotes = true,
            DELIMITER => cells.push(std::mem::take(&mut cell)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                cells.push(std::mem::take(&mut cell));
                push_row(&mut rows, std::mem::take(&mut cells), row_line);
                line += 1;
                row_line = line;
            }
            _ => cell.push(ch),
        }
    }

    if !cell.is_empty() || !cells.is_empty() {
        cells.push(cell);
        push_row(&mut rows, cells, row_line);
    }
    rows
}

fn push_row(rows: &mut Vec<ScannedRow>, cells: Vec<String>, line: usize) {
    let blank = cells.len() == 1 && cells[0].is_empty();
    if !blank {
        rows.push(ScannedRow { line, cells });
    }
}

/// Canonical header form: lowercase with whitespace, `_` and `-` removed.
pub fn normalize_header(name: &str) -> String {
    name.chars()
        .filter(|ch| !ch.is_whitespace() && *ch != '_' && *ch != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{encode_field, encode_row, normalize_header, parse_rows};

    fn cells(text: &str) -> Vec<Vec<String>> {
        parse_rows(text).into_iter().map(|row| row.cells).collect()
    }

    #[test]
    fn plain_fields_stay_bare() {
        assert_eq!(encode_field("Riyadh"), "Riyadh");
        assert_eq!(encode_field(""), "");
    }

    #[test]
    fn special_fields_are_quoted_with_doubled_quotes() {
        assert_eq!(encode_field("a,b"), "\"a,b\"");
        assert_eq!(encode_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(encode_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn encode_row_joins_with_commas() {
        assert_eq!(encode_row(["a", "b,c", ""]), "a,\"b,c\",");
    }

    #[test]
    fn scanner_handles_quotes_delimiters_and_newlines() {
        let rows = cells("id,name\r\n1,\"Acme, \"\"Ltd\"\"\nHQ\"\r\n2,Plain\n");
        assert_eq!(
            rows,
            vec![
                vec!["id".to_string(), "name".to_string()],
                vec!["1".to_string(), "Acme, \"Ltd\"\nHQ".to_string()],
                vec!["2".to_string(), "Plain".to_string()],
            ]
        );
    }

    #[test]
    fn scanner_tracks_starting_line_numbers_and_skips_blank_lines() {
        let rows = parse_rows("h1,h2\n\n\"a\nb\",c\nd,e");
        let lines = rows.iter().map(|row| row.line).collect::<Vec<_>>();
        assert_eq!(lines, vec![1, 3, 5]);
    }

    #[test]
    fn trailing_empty_cell_is_kept() {
        assert_eq!(cells("a,\n"), vec![vec!["a".to_string(), String::new()]]);
    }

    #[test]
    fn bom_is_ignored() {
        assert_eq!(cells("\u{feff}id\n1"), vec![vec!["id"], vec!["1"]]);
    }

    #[test]
    fn header_normalization_ignores_case_and_separators() {
        assert_eq!(normalize_header(" Organizer_Number "), "organizernumber");
        assert_eq!(normalize_header("created-at"), "createdat");
        assert_eq!(normalize_header("Full Name"), "fullname");
    }
}
