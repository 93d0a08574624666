use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::models::{DuplicateReport, Isbn, IsbnLines};

pub const ISBN_COLUMN: &str = "isbn13";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("File '{}' not found.", path.to_string_lossy())]
    NotFound { path: PathBuf },

    #[error("Failed to read '{}': {source}", path.to_string_lossy())]
    Io { path: PathBuf, source: io::Error },

    #[error("{0}")]
    Csv(#[from] csv::Error),
}

/// Groups the data rows of `path` by their `isbn13` value and returns every
/// ISBN seen on more than one row.
pub fn find_duplicates(path: &Path) -> Result<DuplicateReport, ReportError> {
    let content = fs::read(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => ReportError::NotFound {
            path: path.to_path_buf(),
        },
        _ => ReportError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;
    debug!(path = %path.to_string_lossy(), "scanning for duplicate ISBNs");
    find_duplicates_in(&content[..])
}

pub fn find_duplicates_in<R: Read>(input: R) -> Result<DuplicateReport, ReportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    // a repeated header name resolves to its last column
    let column = reader
        .headers()?
        .iter()
        .enumerate()
        .filter(|&(_, name)| name == ISBN_COLUMN)
        .map(|(i, _)| i)
        .last();

    let mut index = IsbnLines::new();
    let mut rows = 0usize;
    // line 1 is the header
    for (line, result) in (2usize..).zip(reader.records()) {
        let record = result?;
        rows += 1;
        let isbn = match column.and_then(|c| record.get(c)) {
            Some(isbn) if !isbn.is_empty() => isbn,
            _ => continue,
        };
        index.get_or_insert(Isbn(isbn.to_string())).push(line);
    }
    debug!(rows, distinct = index.len(), "finished reading rows");

    Ok(index.into_report())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn report(content: &str) -> DuplicateReport {
        find_duplicates_in(content.as_bytes()).unwrap()
    }

    #[test]
    fn reports_lines_of_repeated_isbn() {
        let report = report("title,isbn13\nA,123\nB,456\nC,123\n");
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].to_string(), "ISBN 123: Lines 2, 4");
    }

    #[test]
    fn column_is_found_by_name() {
        let report = report("isbn13,title,isbn\n9,a,1\n8,b,1\n9,c,2\n");
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].isbn.0, "9");
        assert_eq!(report.groups[0].lines, [2, 4]);
    }

    #[test]
    fn repeated_column_uses_the_last_one() {
        let first = report("isbn13,isbn13\n1,9\n1,8\n");
        assert!(!first.has_duplicates());

        let second = report("isbn13,isbn13\n9,1\n8,1\n");
        assert_eq!(second.groups[0].isbn.0, "1");
    }

    #[test]
    fn io_error_names_the_path() {
        let dir = tempdir().unwrap();
        let err = find_duplicates(dir.path()).unwrap_err();
        assert!(matches!(err, ReportError::Io { .. }), "{err}");
        let message = err.to_string();
        assert!(message.starts_with("Failed to read '"), "{message}");
        assert!(message.contains(&*dir.path().to_string_lossy()), "{message}");
    }

    #[test]
    fn empty_isbns_are_ignored() {
        let report = report("title,isbn13\nA,\nB,\nC,1\nD\n");
        assert!(!report.has_duplicates());
        assert_eq!(report.to_string(), "No duplicate ISBNs found.\n");
    }

    #[test]
    fn skipped_rows_still_count_towards_line_numbers() {
        let report = report("title,isbn13\nA,1\nB,\nC,1\n");
        assert_eq!(report.groups[0].lines, [2, 4]);
    }

    #[test]
    fn values_are_compared_verbatim() {
        let report = report("title,isbn13\nA,123\nB, 123\n");
        assert!(!report.has_duplicates());
    }

    #[test]
    fn missing_column_means_no_duplicates() {
        let report = report("title,isbn\nA,1\nB,1\n");
        assert!(!report.has_duplicates());
    }

    #[test]
    fn header_only() {
        assert!(!report("title,isbn13\n").has_duplicates());
    }

    #[test]
    fn quoted_fields() {
        let report = report("title,isbn13\n\"Hello, World\",1\n\"x\"\"y\",1\n");
        assert_eq!(report.groups[0].lines, [2, 3]);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("books.csv");
        let err = find_duplicates(&path).unwrap_err();
        assert!(matches!(err, ReportError::NotFound { .. }));
        assert_eq!(
            err.to_string(),
            format!("File '{}' not found.", path.display())
        );
    }

    #[test]
    fn invalid_utf8_is_a_csv_error() {
        let content: &[u8] = b"title,isbn13\n\xff\xfe,1\n";
        let err = find_duplicates_in(content).unwrap_err();
        assert!(matches!(err, ReportError::Csv(_)));
    }

    #[test]
    fn reads_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("books.csv");
        fs::write(&path, "bookID,isbn13\n1,111\n2,222\n3,111\n4,222\n5,111\n").unwrap();
        let report = find_duplicates(&path).unwrap();
        assert_eq!(
            report.to_string(),
            "Duplicate ISBNs found at line numbers:\n\
             ISBN 111: Lines 2, 4, 6\n\
             ISBN 222: Lines 3, 5\n"
        );
    }
}
