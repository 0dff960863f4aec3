// Persistence helpers shared by the promotion, order and item files
// Every collection is a header line followed by one comma-separated record per entity,
// and the whole file is rewritten on every mutation.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Errors raised while reading or rewriting a data file
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed record in {} at line {line}: {message}", .path.display())]
    Malformed {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

impl PersistenceError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A parsed data line together with its 1-based line number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub line: usize,
    pub fields: Vec<String>,
}

/// Read all records of a data file, skipping the header, blank lines and `#` comments.
///
/// Returns `Ok(None)` when the file does not exist yet.
pub async fn read_records(path: &Path) -> Result<Option<Vec<Record>>, PersistenceError> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(PersistenceError::io(path, e)),
    };

    let records = contents
        .lines()
        .enumerate()
        .skip(1)
        .filter(|(_, line)| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
        .map(|(index, line)| Record {
            line: index + 1,
            fields: split_record(line),
        })
        .collect();

    Ok(Some(records))
}

/// Rewrite a data file in full.
///
/// The contents go to a sibling temporary file first and are then renamed over the
/// target, so a reader never observes a half-written collection.
pub async fn write_atomically(
    path: &Path,
    header: &str,
    records: Vec<String>,
) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PersistenceError::io(parent, e))?;
        }
    }

    let mut contents = String::with_capacity(header.len() + records.len() * 64);
    contents.push_str(header);
    contents.push('\n');
    for record in records {
        contents.push_str(&record);
        contents.push('\n');
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, contents)
        .await
        .map_err(|e| PersistenceError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| PersistenceError::io(path, e))?;

    tracing::debug!("Rewrote {}", path.display());
    Ok(())
}

/// Split one record into fields.
///
/// Unquoted fields are trimmed; quoted fields keep their contents verbatim with `""`
/// standing for a literal quote.
pub fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut was_quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    quoted = false;
                }
            }
            '"' if current.trim().is_empty() && !was_quoted => {
                current.clear();
                quoted = true;
                was_quoted = true;
            }
            ',' if !quoted => {
                fields.push(finish_field(&current, was_quoted));
                current.clear();
                was_quoted = false;
            }
            _ => current.push(c),
        }
    }
    fields.push(finish_field(&current, was_quoted));

    fields
}

fn finish_field(raw: &str, was_quoted: bool) -> String {
    if was_quoted {
        raw.to_string()
    } else {
        raw.trim().to_string()
    }
}

/// Join fields into one record, quoting any field that would not survive `split_record`.
///
/// Line breaks are flattened to spaces since every record must stay on one line.
pub fn join_record<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fields
        .into_iter()
        .map(|field| {
            let field = field.as_ref().replace(['\r', '\n'], " ");
            let needs_quotes = field.contains(',')
                || field.contains('"')
                || field.starts_with(char::is_whitespace)
                || field.ends_with(char::is_whitespace);
            if needs_quotes {
                format!("\"{}\"", field.replace('"', "\"\""))
            } else {
                field
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Escape a component of a delimited sub-list (`\`, `:` and `;` are reserved)
pub fn escape_component(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | ':' | ';') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Split on an unescaped delimiter, leaving escape sequences in place for the next level
pub fn split_escaped(value: &str, delimiter: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            current.push(c);
            if let Some(next) = chars.next() {
                current.push(next);
            }
        } else if c == delimiter {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    parts.push(current);

    parts
}

/// Remove one level of backslash escaping
pub fn unescape_component(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                unescaped.push(next);
            }
        } else {
            unescaped.push(c);
        }
    }
    unescaped
}

pub fn parse_decimal(value: &str) -> Option<Decimal> {
    Decimal::from_str(value.trim()).ok()
}

/// Timestamps are written as RFC 3339 with the full sub-second precision held in memory,
/// and read as RFC 3339 or unix seconds
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    value
        .parse::<i64>()
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}

/// Human-readable timestamp for tables
pub fn format_display_time(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Money is only rounded when displayed
pub fn format_money(amount: Decimal) -> String {
    format!(
        "{:.2}",
        amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    #[test]
    fn test_split_record_trims_plain_fields() {
        assert_eq!(
            split_record("PROMO001, Spring sale ,DISCOUNT"),
            vec!["PROMO001", "Spring sale", "DISCOUNT"]
        );
    }

    #[test]
    fn test_split_record_keeps_empty_fields() {
        assert_eq!(split_record("a,,b,"), vec!["a", "", "b", ""]);
    }

    #[test]
    fn test_quoted_fields_survive_join_and_split() {
        let fields = vec!["ORD1", "12 Main St, Apt \"B\"", " padded "];
        let line = join_record(&fields);
        assert_eq!(split_record(&line), fields);
    }

    #[test]
    fn test_join_record_flattens_line_breaks() {
        assert_eq!(join_record(["a\nb", "c"]), "a b,c");
    }

    #[test]
    fn test_escaped_sub_list() {
        let name = escape_component("Tea: green; loose \\ leaf");
        let encoded = format!("I1:{}:3.50:2;I2:Mug:8:1", name);

        let items = split_escaped(&encoded, ';');
        assert_eq!(items.len(), 2);

        let parts: Vec<String> = split_escaped(&items[0], ':')
            .iter()
            .map(|part| unescape_component(part))
            .collect();
        assert_eq!(parts, vec!["I1", "Tea: green; loose \\ leaf", "3.50", "2"]);
    }

    #[test]
    fn test_parse_timestamp_accepts_unix_seconds() {
        let parsed = parse_timestamp("1700000000").unwrap();
        assert_eq!(parsed.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_timestamp_round_trip_keeps_millis() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(parse_timestamp(&format_timestamp(&at)), Some(at));
    }

    #[test]
    fn test_timestamp_round_trip_keeps_nanos() {
        let at = Utc.timestamp_opt(1_700_000_000, 49_437_090).unwrap();
        let text = format_timestamp(&at);
        assert_eq!(text, "2023-11-14T22:13:20.049437090Z");
        assert_eq!(parse_timestamp(&text), Some(at));
    }

    #[test]
    fn test_whole_second_timestamp_has_no_fraction() {
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(format_timestamp(&at), "2023-11-14T22:13:20Z");
    }

    #[test]
    fn test_format_money_rounds_for_display_only() {
        assert_eq!(format_money(dec!(80)), "80.00");
        assert_eq!(format_money(dec!(19.995)), "20.00");
        assert_eq!(format_money(dec!(0.1)), "0.10");
    }

    #[tokio::test]
    async fn test_read_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let result = read_records(&dir.path().join("missing.csv")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_write_then_read_skips_header_and_comments() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("data.csv");

        write_atomically(
            &path,
            "a,b",
            vec!["1,2".to_string(), "# note".to_string(), "3,4".to_string()],
        )
        .await
        .unwrap();

        let records = read_records(&path).await.unwrap().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].fields, vec!["1", "2"]);
        assert_eq!(records[1].line, 4);
        assert!(!dir.path().join("nested").join("data.csv.tmp").exists());
    }

    #[tokio::test]
    async fn test_write_fails_when_parent_is_a_file() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();

        let result = write_atomically(&blocker.join("data.csv"), "a", vec![]).await;
        assert!(matches!(result, Err(PersistenceError::Io { .. })));
    }
}
