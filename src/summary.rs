//! Human-readable descriptions of a session's contents.

use std::collections::BTreeMap;

use crate::check::file_extension;
use crate::config::UploadLimits;

/// Group used for files whose extension is not in any accepted group.
const OTHER_GROUP: &str = "Other";

const UNITS: &[&str] = &["KB", "MB", "GB", "TB"];

/// Decimal megabytes.
pub fn bytes_to_mb(bytes: i64) -> f64 {
    bytes as f64 / 1_000_000.0
}

/// Size with a base-1000 unit: `"512 B"`, `"2.00 MB"`, `"1.25 GB"`.
pub fn human_readable_size(bytes: i64) -> String {
    if bytes.abs() < 1000 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = UNITS[0];
    for candidate in UNITS {
        value /= 1000.0;
        unit = candidate;
        if value.abs() < 1000.0 {
            break;
        }
    }
    format!("{:.2} {}", value, unit)
}

/// `"1 Document file and 2 Image files, totalling 2.00 MB"`.
///
/// Files are counted per accepted-file group, groups listed alphabetically.
pub fn extent_statement<'a>(
    files: impl IntoIterator<Item = (&'a str, i64)>,
    limits: &UploadLimits,
) -> String {
    let mut groups: BTreeMap<&str, usize> = BTreeMap::new();
    let mut total = 0;

    for (name, size) in files {
        let group = file_extension(name)
            .and_then(|ext| limits.group_for_extension(&ext))
            .unwrap_or(OTHER_GROUP);
        *groups.entry(group).or_default() += 1;
        total += size;
    }

    if groups.is_empty() {
        return "0 files".to_string();
    }

    let parts: Vec<String> = groups
        .iter()
        .map(|(group, count)| {
            let noun = if *count == 1 { "file" } else { "files" };
            format!("{} {} {}", count, group, noun)
        })
        .collect();

    format!("{}, totalling {}", join_with_and(&parts), human_readable_size(total))
}

fn join_with_and(parts: &[String]) -> String {
    match parts {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_readable_size() {
        assert_eq!(human_readable_size(0), "0 B");
        assert_eq!(human_readable_size(999), "999 B");
        assert_eq!(human_readable_size(1000), "1.00 KB");
        assert_eq!(human_readable_size(2_000_000), "2.00 MB");
        assert_eq!(human_readable_size(1_250_000_000), "1.25 GB");
    }

    #[test]
    fn test_extent_statement_groups_by_type() {
        let files = [
            ("report.pdf", 1_000_000),
            ("front.jpg", 600_000),
            ("back.PNG", 400_000),
        ];
        assert_eq!(
            extent_statement(files, &UploadLimits::default()),
            "1 Document file and 2 Image files, totalling 2.00 MB"
        );
    }

    #[test]
    fn test_extent_statement_lists_many_groups() {
        let files = [
            ("a.zip", 1000),
            ("b.csv", 1000),
            ("c.mp4", 1000),
            ("d.bin", 1000),
        ];
        assert_eq!(
            extent_statement(files, &UploadLimits::default()),
            "1 Archive file, 1 Other file, 1 Spreadsheet file and 1 Video file, totalling 4.00 KB"
        );
    }

    #[test]
    fn test_extent_statement_without_files() {
        assert_eq!(extent_statement(Vec::<(&str, i64)>::new(), &UploadLimits::default()), "0 files");
    }
}
