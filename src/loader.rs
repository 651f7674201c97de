use crate::error::IngestError;
use serde::{Deserialize, Serialize};

/// Numeric decision trajectory extracted from an uploaded CSV
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    /// Header of the column the values were read from
    pub column: String,

    /// One value per data row, invalid cells coerced to zero
    pub values: Vec<f64>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Load a decision trajectory from raw CSV bytes
///
/// The first line is the header row. The value column is picked with
/// [`select_value_column`] and every data row is coerced with
/// [`coerce_numeric`]; rows too short to reach the column read as zero.
/// A quoted field may span line breaks without starting a new row.
///
/// # Errors
/// * `IngestError::Encoding` if the bytes are not UTF-8
/// * `IngestError::Empty` if there is no header row
/// * `IngestError::NoValueColumn` if every header mentions time
/// * `IngestError::NoRows` if only the header row is present
///
/// # Examples
/// ```
/// use aoc_portal::loader::load_trajectory;
///
/// let t = load_trajectory(b"timestamp,weight\n1,0.5\n2,abc\n").unwrap();
/// assert_eq!(t.column, "weight");
/// assert_eq!(t.values, vec![0.5, 0.0]);
/// ```
pub fn load_trajectory(bytes: &[u8]) -> Result<Trajectory, IngestError> {
    let text = std::str::from_utf8(bytes).map_err(|_| IngestError::Encoding)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut lines = split_records(text)
        .into_iter()
        .filter(|line| !line.trim().is_empty());
    let header_line = lines.next().ok_or(IngestError::Empty)?;
    let headers = parse_csv_row(header_line);

    let index = select_value_column(&headers[..])?;

    let values: Vec<f64> = lines
        .map(|line| {
            parse_csv_row(line)
                .get(index)
                .map(|cell| coerce_numeric(cell))
                .unwrap_or(0.0)
        })
        .collect();

    if values.is_empty() {
        return Err(IngestError::NoRows);
    }

    Ok(Trajectory {
        column: headers[index].trim().to_string(),
        values,
    })
}

/// Pick the value column: the first header that does not contain "time"
///
/// Matching is case-insensitive, so `Timestamp`, `datetime` and `TIME` are
/// all skipped. When several headers qualify the leftmost wins.
pub fn select_value_column<S: AsRef<str>>(headers: &[S]) -> Result<usize, IngestError> {
    headers
        .iter()
        .position(|h| !h.as_ref().to_lowercase().contains("time"))
        .ok_or_else(|| {
            let names: Vec<&str> = headers.iter().map(|h| h.as_ref().trim()).collect();
            IngestError::NoValueColumn(names.join(", "))
        })
}

/// Coerce a CSV cell to a number, anything unparseable becomes zero
pub fn coerce_numeric(cell: &str) -> f64 {
    match cell.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

// Split text into records on newlines outside quoted fields
fn split_records(text: &str) -> Vec<&str> {
    let mut records = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match c {
            // A doubled quote flips twice, leaving the state unchanged
            '"' => in_quotes = !in_quotes,
            '\n' if !in_quotes => {
                records.push(text[start..i].trim_end_matches('\r'));
                start = i + 1;
            }
            _ => {}
        }
    }

    if start < text.len() {
        records.push(text[start..].trim_end_matches('\r'));
    }
    records
}

// Parse a CSV row into a vector of strings
fn parse_csv_row(line: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current_field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    // Escaped quote inside a quoted field
                    current_field.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                result.push(std::mem::take(&mut current_field));
            }
            _ => current_field.push(c),
        }
    }

    result.push(current_field);
    result
}
