//! CSV Output
//!
//! The result table format:
//!
//! ```text
//! implementation,language,size,time_sec,max_rss_kb,nodes,solutions
//! BuDDy,C,8,0.0123,2048,2057,92.0
//! ```
//!
//! Floats use Rust's shortest round-trip representation, so reading a table
//! back yields bit-identical values.

use crate::ReportError;
use crate::record::{CSV_COLUMNS, ResultRecord, ResultTable};
use std::fmt::Write as _;

/// Render the full table, header included.
pub fn to_csv_string(table: &ResultTable) -> String {
    let mut out = String::new();
    out.push_str(&CSV_COLUMNS.join(","));
    out.push('\n');

    for record in table {
        let _ = writeln!(
            out,
            "{},{},{},{:?},{},{},{:?}",
            escape_field(&record.implementation),
            escape_field(&record.language),
            record.size,
            record.time_sec,
            record.max_rss_kb,
            record.nodes,
            record.solutions,
        );
    }

    out
}

/// Parse a table produced by [`to_csv_string`].
pub fn parse_csv(text: &str) -> Result<ResultTable, ReportError> {
    let mut lines = text.lines().enumerate();

    let header = lines
        .next()
        .map(|(_, line)| line.trim_end_matches('\r'))
        .unwrap_or_default();
    if header != CSV_COLUMNS.join(",") {
        return Err(ReportError::Header {
            found: header.to_string(),
        });
    }

    let mut table = ResultTable::new();
    for (idx, line) in lines {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let row = idx + 1;
        table.push(parse_row(line).map_err(|message| ReportError::Row { row, message })?);
    }

    Ok(table)
}

fn parse_row(line: &str) -> Result<ResultRecord, String> {
    let fields = split_fields(line)?;
    if fields.len() != CSV_COLUMNS.len() {
        return Err(format!(
            "expected {} fields, found {}",
            CSV_COLUMNS.len(),
            fields.len()
        ));
    }

    fn num<T: std::str::FromStr>(fields: &[String], idx: usize) -> Result<T, String> {
        fields[idx]
            .parse()
            .map_err(|_| format!("invalid {}: {:?}", CSV_COLUMNS[idx], fields[idx]))
    }

    Ok(ResultRecord {
        implementation: fields[0].clone(),
        language: fields[1].clone(),
        size: num(&fields, 2)?,
        time_sec: num(&fields, 3)?,
        max_rss_kb: num(&fields, 4)?,
        nodes: num(&fields, 5)?,
        solutions: num(&fields, 6)?,
    })
}

/// Split one row into fields, honoring double-quoted fields with `""` escapes.
fn split_fields(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        match (in_quotes, c) {
            (true, '"') => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            (true, c) => current.push(c),
            (false, '"') if current.is_empty() => in_quotes = true,
            (false, ',') => fields.push(std::mem::take(&mut current)),
            (false, c) => current.push(c),
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(current);
    Ok(fields)
}

fn escape_field(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
