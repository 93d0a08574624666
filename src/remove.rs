use std::collections::HashSet;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{bail, Context as _, Result};
use csv::StringRecord;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::models::{RemovalSummary, WriteMode};

/// Zero-based position of the ISBN in every row.
pub const ISBN_INDEX: usize = 1;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug)]
struct Deduplicated {
    /// The input started with a UTF-8 byte order mark, written back before the header.
    bom: bool,
    header: StringRecord,
    rows: Vec<StringRecord>,
    removed: usize,
}

/// Maps byte offsets in the input to 1-based physical line numbers.
struct LineCounter<'a> {
    body: &'a [u8],
    offset: usize,
    line: usize,
}

impl<'a> LineCounter<'a> {
    fn new(body: &'a [u8]) -> LineCounter<'a> {
        LineCounter {
            body,
            offset: 0,
            line: 1,
        }
    }

    /// Offsets must be requested in non-decreasing order.
    fn line_at(&mut self, offset: usize) -> usize {
        let end = offset.min(self.body.len());
        if end > self.offset {
            self.line += self.body[self.offset..end]
                .iter()
                .filter(|&&b| b == b'\n')
                .count();
            self.offset = end;
        }
        self.line
    }
}

/// Where the next record starts, given where the reader stopped. The reader
/// may stop between the `\r` and `\n` of a CRLF terminator.
fn next_start(body: &[u8], end: usize) -> usize {
    if end > 0 && body[end - 1] == b'\r' && body.get(end) == Some(&b'\n') {
        end + 1
    } else {
        end
    }
}

impl Deduplicated {
    fn read<R: Read>(mut input: R) -> Result<Deduplicated> {
        let mut content = Vec::new();
        input
            .read_to_end(&mut content)
            .context("Failed to read input")?;
        let bom = content.starts_with(UTF8_BOM);
        let body = if bom {
            &content[UTF8_BOM.len()..]
        } else {
            &content[..]
        };
        let mut lines = LineCounter::new(body);

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(body);

        let mut header = StringRecord::new();
        if !reader
            .read_record(&mut header)
            .context("Failed to read the header row")?
        {
            bail!("Empty file: no header row");
        }

        let mut seen = HashSet::new();
        let mut rows = Vec::new();
        let mut removed = 0;
        let mut record = StringRecord::new();
        loop {
            let start = next_start(body, reader.position().byte() as usize);
            let line = lines.line_at(start);
            // the reader skips empty lines silently, but they have no ISBN column either
            if matches!(body.get(start), Some(b'\n' | b'\r')) {
                bail!(
                    "Line {line} is blank, expected an ISBN in column {}",
                    ISBN_INDEX + 1,
                );
            }
            if !reader
                .read_record(&mut record)
                .with_context(|| format!("Failed to read line {line}"))?
            {
                break;
            }

            let isbn = match record.get(ISBN_INDEX) {
                Some(isbn) => isbn.trim(),
                None => bail!(
                    "Line {line} has {} column(s), expected an ISBN in column {}",
                    record.len(),
                    ISBN_INDEX + 1,
                ),
            };
            if seen.insert(isbn.to_string()) {
                rows.push(std::mem::take(&mut record));
            } else {
                debug!(line, isbn, "dropping duplicate row");
                removed += 1;
            }
        }

        Ok(Deduplicated {
            bom,
            header,
            rows,
            removed,
        })
    }

    fn write<W: Write>(&self, mut output: W) -> Result<()> {
        if self.bom {
            output
                .write_all(UTF8_BOM)
                .context("Failed to write the byte order mark")?;
        }
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .terminator(csv::Terminator::CRLF)
            .from_writer(output);
        writer
            .write_record(&self.header)
            .context("Failed to write the header row")?;
        for row in &self.rows {
            writer.write_record(row).context("Failed to write a row")?;
        }
        writer.flush().context("Failed to flush rows")?;
        Ok(())
    }

    fn summary(&self) -> RemovalSummary {
        RemovalSummary {
            kept: self.rows.len(),
            removed: self.removed,
        }
    }
}

/// Copies `input` to `output`, keeping the header and only the first row for
/// each trimmed ISBN in column 1.
pub fn dedup_rows<R: Read, W: Write>(input: R, output: W) -> Result<RemovalSummary> {
    let deduplicated = Deduplicated::read(input)?;
    deduplicated.write(output)?;
    Ok(deduplicated.summary())
}

fn write_in_place(path: &Path, deduplicated: &Deduplicated) -> Result<()> {
    let file = fs::File::create(path).with_context(|| {
        format!("Failed to open for writing: {}", path.to_string_lossy())
    })?;
    deduplicated
        .write(file)
        .with_context(|| format!("Failed to rewrite: {}", path.to_string_lossy()))
}

fn write_atomic(path: &Path, deduplicated: &Deduplicated) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let permissions = fs::metadata(path)
        .with_context(|| format!("Failed to fs::metadata: {}", path.to_string_lossy()))?
        .permissions();

    let mut temp = NamedTempFile::new_in(dir).with_context(|| {
        format!(
            "Failed to create a temporary file in: {}",
            dir.to_string_lossy(),
        )
    })?;
    deduplicated
        .write(&mut temp)
        .with_context(|| format!("Failed to write: {}", temp.path().to_string_lossy()))?;
    temp.as_file()
        .sync_all()
        .with_context(|| format!("Failed to sync: {}", temp.path().to_string_lossy()))?;
    fs::set_permissions(temp.path(), permissions).with_context(|| {
        format!(
            "Failed to set permissions: {}",
            temp.path().to_string_lossy(),
        )
    })?;
    temp.persist(path)
        .with_context(|| format!("Failed to replace: {}", path.to_string_lossy()))?;
    Ok(())
}

/// Rewrites `path` so that only the first row for each ISBN survives.
///
/// With [`WriteMode::InPlace`] the file is truncated before the new content is
/// written, so an interrupted run can leave it corrupted. No backup is kept in
/// either mode.
pub fn remove_duplicates(path: &Path, mode: WriteMode) -> Result<RemovalSummary> {
    let file = fs::File::open(path)
        .with_context(|| format!("Failed to open: {}", path.to_string_lossy()))?;
    let deduplicated = Deduplicated::read(file)
        .with_context(|| format!("Failed to read: {}", path.to_string_lossy()))?;

    match mode {
        WriteMode::InPlace => write_in_place(path, &deduplicated)?,
        WriteMode::Atomic => write_atomic(path, &deduplicated)?,
    }

    let summary = deduplicated.summary();
    info!(
        path = %path.to_string_lossy(),
        kept = summary.kept,
        removed = summary.removed,
        "removed duplicate ISBNs",
    );
    Ok(summary)
}
