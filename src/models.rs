use std::collections::HashMap;
use std::fmt;

/// An ISBN as it appears in the file. Never validated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Isbn(pub String);

impl fmt::Display for Isbn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 1-based line numbers, header included, keyed by ISBN in first-seen order.
#[derive(Debug)]
#[warn(clippy::new_without_default)]
pub struct IsbnLines {
    positions: HashMap<Isbn, usize>,
    entries: Vec<(Isbn, Vec<usize>)>,
}

impl IsbnLines {
    pub fn new() -> IsbnLines {
        IsbnLines {
            positions: HashMap::new(),
            entries: Vec::new(),
        }
    }

    pub fn get_or_insert(&mut self, isbn: Isbn) -> &mut Vec<usize> {
        let index = match self.positions.get(&isbn) {
            Some(&index) => index,
            None => {
                let index = self.entries.len();
                self.positions.insert(isbn.clone(), index);
                self.entries.push((isbn, Vec::new()));
                index
            }
        };
        &mut self.entries[index].1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_report(self) -> DuplicateReport {
        let groups = self
            .entries
            .into_iter()
            .filter(|(_, lines)| lines.len() > 1)
            .map(|(isbn, lines)| DuplicateGroup { isbn, lines })
            .collect();
        DuplicateReport { groups }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub isbn: Isbn,
    pub lines: Vec<usize>,
}

impl fmt::Display for DuplicateGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ISBN {}: Lines ", self.isbn)?;
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{line}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DuplicateReport {
    pub groups: Vec<DuplicateGroup>,
}

impl DuplicateReport {
    pub fn has_duplicates(&self) -> bool {
        !self.groups.is_empty()
    }
}

impl fmt::Display for DuplicateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.has_duplicates() {
            return writeln!(f, "No duplicate ISBNs found.");
        }
        writeln!(f, "Duplicate ISBNs found at line numbers:")?;
        for group in &self.groups {
            writeln!(f, "{group}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovalSummary {
    /// Data rows written back, header excluded.
    pub kept: usize,
    pub removed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Truncate and rewrite the source file directly.
    #[default]
    InPlace,
    /// Write a sibling temporary file and rename it over the source.
    Atomic,
}
