use crate::error::{Error, Result};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// File-name prefix the catalog's export bundles use for their CSV members.
pub const FRAGMENT_PREFIX: &str = "comp-engine-export";

/// The two tables each category is consolidated into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Datapoints,
    Metadata,
}

impl TableKind {
    pub const ALL: [TableKind; 2] = [TableKind::Datapoints, TableKind::Metadata];

    pub fn as_str(self) -> &'static str {
        match self {
            TableKind::Datapoints => "datapoints",
            TableKind::Metadata => "metadata",
        }
    }

    /// Fragment files for this kind are named `<prefix>-<kind>-*.csv`.
    pub fn fragment_prefix(self) -> String {
        format!("{FRAGMENT_PREFIX}-{}-", self.as_str())
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An in-memory CSV table whose first column is the series identifier.
/// Identifiers are unique within one fragment but not across fragments.
#[derive(Debug, Default, Clone)]
pub struct Table {
    pub header: csv::StringRecord,
    pub rows: Vec<csv::StringRecord>,
}

impl Table {
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)?;
        let header = reader.headers()?.clone();
        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record?);
        }
        Ok(Self { header, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|row| row.get(0).unwrap_or(""))
    }

    /// Appends another fragment's rows. All fragments of one kind must share
    /// the same header.
    pub fn append(&mut self, other: Table) -> Result<()> {
        if self.header.is_empty() {
            self.header = other.header;
        } else if self.header != other.header {
            return Err(Error::Schema(format!(
                "fragment header {:?} does not match {:?}",
                other.header, self.header
            )));
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    /// Drops rows that are identical across every column (identifier
    /// included), keeping the first occurrence. Rows that share an identifier
    /// but differ in any column all survive; deduplication is full-row
    /// equality, never key-based.
    pub fn dedup_full_rows(&mut self) {
        let mut seen: HashSet<Vec<String>> = HashSet::with_capacity(self.rows.len());
        self.rows
            .retain(|row| seen.insert(row.iter().map(str::to_owned).collect()));
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.header)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(header: &[&str], rows: &[&[&str]]) -> Table {
        Table {
            header: csv::StringRecord::from(header.to_vec()),
            rows: rows
                .iter()
                .map(|r| csv::StringRecord::from(r.to_vec()))
                .collect(),
        }
    }

    #[test]
    fn identical_rows_collapse_to_one() {
        let mut t = table(
            &["id", "v"],
            &[&["A", "1"], &["B", "2"], &["B", "2"], &["C", "3"]],
        );
        t.dedup_full_rows();
        assert_eq!(t.len(), 3);
        assert_eq!(t.ids().collect::<Vec<_>>(), vec!["A", "B", "C"]);
    }

    #[test]
    fn same_id_with_different_content_survives() {
        let mut t = table(&["id", "v"], &[&["B", "2"], &["B", "3"]]);
        t.dedup_full_rows();
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn dedup_keeps_first_occurrence_order() {
        let mut t = table(&["id", "v"], &[&["B", "2"], &["A", "1"], &["B", "2"]]);
        t.dedup_full_rows();
        assert_eq!(t.ids().collect::<Vec<_>>(), vec!["B", "A"]);
    }

    #[test]
    fn append_concatenates_matching_fragments() {
        let mut t = table(&["id", "v"], &[&["A", "1"]]);
        t.append(table(&["id", "v"], &[&["B", "2"]])).unwrap();
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn append_rejects_mismatched_headers() {
        let mut t = table(&["id", "v"], &[&["A", "1"]]);
        let err = t.append(table(&["id", "w"], &[&["B", "2"]])).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn append_into_empty_table_adopts_the_header() {
        let mut t = Table::default();
        t.append(table(&["id", "v"], &[&["A", "1"]])).unwrap();
        assert_eq!(&t.header, &csv::StringRecord::from(vec!["id", "v"]));
    }

    #[test]
    fn load_and_write_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        std::fs::write(&path, "id,v\nA,1\nB,2\n").unwrap();

        let t = Table::load(&path).unwrap();
        assert_eq!(t.len(), 2);

        let out = dir.path().join("out.csv");
        t.write(&out).unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "id,v\nA,1\nB,2\n");
    }
}
