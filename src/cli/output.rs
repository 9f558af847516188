//! Terminal output formatting with colors
//!
//! Respects NO_COLOR, CLICOLOR, CLICOLOR_FORCE automatically.
//! Values go to stdout untouched; everything else is decoration.

use std::io::Write;

use colored::Colorize;
use itertools::Itertools;

use crate::domain::{format_duration, BucketStatus, Entry};

/// Print error (red bold "error:" prefix) to stderr
pub fn error(msg: &(impl std::fmt::Display + ?Sized)) {
    eprintln!("{}: {}", "error".red().bold(), msg);
}

/// Print warning (yellow "Warning:" prefix) to stderr
pub fn warning(msg: &(impl std::fmt::Display + ?Sized)) {
    eprintln!("{}: {}", "Warning".yellow(), msg);
}

/// Print success status (green checkmark)
pub fn success(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{} {}", "✓".green(), msg);
}

/// Print section header (cyan bold)
pub fn header(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}", msg.to_string().cyan().bold());
}

/// Print indented detail (no color)
pub fn detail(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("  {}", msg);
}

/// Print plain output (no color, for data)
pub fn info(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}", msg);
}

/// Print prompt without newline (cyan) to stderr
pub fn prompt(msg: &(impl std::fmt::Display + ?Sized)) {
    eprint!("{} ", msg.to_string().cyan());
    std::io::stderr().flush().ok();
}

/// Write a value byte for byte, followed by a newline.
pub fn write_value(out: &mut dyn Write, value: &[u8]) -> std::io::Result<()> {
    out.write_all(value)?;
    out.write_all(b"\n")?;
    out.flush()
}

/// Write an entry: header line, then the value.
pub fn write_entry(out: &mut dyn Write, entry: &Entry) -> std::io::Result<()> {
    writeln!(out, "{}", entry_header(entry).cyan().bold())?;
    write_value(out, &entry.value)
}

/// Print bucket status as an indented block.
pub fn bucket_status(status: &BucketStatus) {
    header(&format!("Information for Key-Value Store Bucket {}", status.bucket));
    println!();
    for line in status_lines(status) {
        detail(&line);
    }
}

/// Print one row per revision.
pub fn history(entries: &[Entry]) {
    if let Some(first) = entries.first() {
        header(&format!("History for {} > {}", first.bucket, first.key));
    }
    for line in entries.iter().map(history_row) {
        info(&line);
    }
}

/// `<bucket> > <key> revision: <rev> created @ <time>`
pub fn entry_header(entry: &Entry) -> String {
    format!(
        "{} > {} revision: {} created @ {}",
        entry.bucket,
        entry.key,
        entry.revision,
        entry.created.format("%d %b %y %H:%M:%S UTC")
    )
}

pub fn status_lines(status: &BucketStatus) -> Vec<String> {
    let max_age = if status.max_age.is_zero() {
        "unlimited".to_string()
    } else {
        format_duration(status.max_age)
    };
    let max_value_size = if status.max_value_size < 0 {
        "unlimited".to_string()
    } else {
        status.max_value_size.to_string()
    };
    vec![
        format!("Bucket Name: {}", status.bucket),
        format!("History Kept: {}", status.history),
        format!("Values Stored: {}", status.values),
        format!("Backing Store Size: {} bytes", status.bytes),
        format!("Maximum Age: {}", max_age),
        format!("Maximum Value Size: {}", max_value_size),
    ]
}

/// `<revision> <op> <time> <value>`, tombstones without a value.
pub fn history_row(entry: &Entry) -> String {
    let mut columns = vec![
        entry.revision.to_string(),
        entry.operation.to_string(),
        entry.created.format("%Y-%m-%d %H:%M:%S").to_string(),
    ];
    if entry.is_live() {
        columns.push(String::from_utf8_lossy(&entry.value).into_owned());
    }
    columns.iter().join("\t")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    use crate::domain::Operation;

    fn sample(operation: Operation, value: &[u8]) -> Entry {
        Entry {
            bucket: "T".into(),
            key: "X".into(),
            value: value.to_vec(),
            revision: 7,
            delta: 0,
            created: Utc.with_ymd_and_hms(2024, 3, 5, 14, 2, 9).unwrap(),
            operation,
        }
    }

    #[test]
    fn given_entry_when_formatting_header_then_names_bucket_key_and_revision() {
        let header = entry_header(&sample(Operation::Put, b"v"));
        assert_eq!(header, "T > X revision: 7 created @ 05 Mar 24 14:02:09 UTC");
    }

    #[test]
    fn given_value_when_writing_then_bytes_are_unchanged_plus_newline() {
        let mut out = Vec::new();

        write_value(&mut out, &[0, 159, b'v']).unwrap();

        assert_eq!(out, vec![0, 159, b'v', b'\n']);
    }

    #[test]
    fn given_entry_when_writing_then_header_precedes_value() {
        colored::control::set_override(false);
        let mut out = Vec::new();

        write_entry(&mut out, &sample(Operation::Put, b"VAL")).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "T > X revision: 7 created @ 05 Mar 24 14:02:09 UTC\nVAL\n"
        );
    }

    #[test]
    fn given_delete_marker_when_formatting_history_then_value_is_omitted() {
        let row = history_row(&sample(Operation::Delete, b""));
        assert_eq!(row, "7\tDEL\t2024-03-05 14:02:09");
    }

    #[test]
    fn given_put_when_formatting_history_then_value_is_last_column() {
        let row = history_row(&sample(Operation::Put, b"hello"));
        assert!(row.ends_with("\thello"));
        assert!(row.starts_with("7\tPUT\t"));
    }

    #[test]
    fn given_bucket_with_ttl_when_formatting_status_then_shows_age_and_history() {
        let status = BucketStatus {
            bucket: "T".into(),
            values: 3,
            history: 5,
            max_age: Duration::from_secs(120),
            max_value_size: -1,
            bytes: 42,
        };

        let lines = status_lines(&status);

        assert!(lines.contains(&"History Kept: 5".to_string()));
        assert!(lines.contains(&"Maximum Age: 2m0s".to_string()));
        assert!(lines.contains(&"Maximum Value Size: unlimited".to_string()));
    }
}
