//! Record store: per-machine histories loaded from a directory of CSV files.
//!
//! # Source format
//!
//! One file per machine. The file stem names the machine, with underscores
//! read as spaces (`Lathe_01.csv` → `Lathe 01`). The first non-blank line is
//! the header; every following non-blank line is one [`ReadingRecord`].
//! Cells are trimmed and may be double-quoted.
//!
//! Loading is all-or-nothing. Any unreadable or malformed file aborts the
//! load with a [`LoadError`]; the store is never built from a partial set.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::record::ReadingRecord;

/// File extension of machine history files.
pub const SOURCE_EXTENSION: &str = "csv";

/// Stable machine identifier, derived from the source file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MachineId(String);

impl MachineId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the id from a source path: file stem, `_` replaced by a space.
    pub fn from_path(path: &Path) -> Option<Self> {
        let stem = path.file_stem()?.to_str()?;
        Some(Self(stem.replace('_', " ")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl Borrow<str> for MachineId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MachineId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Everything that can stop the store from loading.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read data directory {}: {source}", .path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read machine file {}: {source}", .path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no machine files (*.csv) found in {}", .path.display())]
    NoMachines { path: PathBuf },

    #[error("{}: missing or empty header row", .path.display())]
    EmptyHeader { path: PathBuf },

    #[error("{}:{line}: expected {expected} fields, found {found}", .path.display())]
    RowLength {
        path: PathBuf,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("machine '{machine}' has no data rows")]
    EmptySequence { machine: MachineId },

    #[error("machine id '{machine}' is defined more than once")]
    DuplicateMachine { machine: MachineId },
}

/// The full replay history of one machine.
#[derive(Debug, Clone)]
pub struct MachineHistory {
    id: MachineId,
    records: Vec<ReadingRecord>,
}

impl MachineHistory {
    pub fn id(&self) -> &MachineId {
        &self.id
    }

    /// The record sequence, indexed `0..len`. Never empty.
    pub fn records(&self) -> &[ReadingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Immutable store of machine histories, in load order.
#[derive(Debug, Clone)]
pub struct RecordStore {
    machines: Vec<MachineHistory>,
    index: HashMap<MachineId, usize>,
}

impl RecordStore {
    /// Load every `*.csv` file in `dir`, in file-name order.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, LoadError> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir).map_err(|source| LoadError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| LoadError::ReadDir {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            let is_source = path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(SOURCE_EXTENSION));
            if is_source {
                paths.push(path);
            }
        }
        paths.sort();

        let mut histories = Vec::with_capacity(paths.len());
        for path in &paths {
            let Some(id) = MachineId::from_path(path) else {
                log::warn!("skipping {}: file name is not valid UTF-8", path.display());
                continue;
            };
            let text = fs::read_to_string(path).map_err(|source| LoadError::ReadFile {
                path: path.clone(),
                source,
            })?;
            let records = parse_table(path, &text)?;
            log::info!("loaded {} rows for {id}", records.len());
            histories.push((id, records));
        }

        if histories.is_empty() {
            return Err(LoadError::NoMachines {
                path: dir.to_path_buf(),
            });
        }

        let store = Self::from_histories(histories)?;
        log::info!(
            "total machines loaded: {} ({} rows)",
            store.len(),
            store.total_rows()
        );
        Ok(store)
    }

    /// Build a store from in-memory histories, keeping their order.
    pub fn from_histories<I>(histories: I) -> Result<Self, LoadError>
    where
        I: IntoIterator<Item = (MachineId, Vec<ReadingRecord>)>,
    {
        let mut machines = Vec::new();
        let mut index = HashMap::new();
        for (id, records) in histories {
            if records.is_empty() {
                return Err(LoadError::EmptySequence { machine: id });
            }
            if index.contains_key(&id) {
                return Err(LoadError::DuplicateMachine { machine: id });
            }
            index.insert(id.clone(), machines.len());
            machines.push(MachineHistory { id, records });
        }
        Ok(Self { machines, index })
    }

    pub fn get(&self, id: &str) -> Option<&MachineHistory> {
        self.index.get(id).map(|&i| &self.machines[i])
    }

    /// Machine histories in load order.
    pub fn iter(&self) -> impl Iterator<Item = &MachineHistory> {
        self.machines.iter()
    }

    pub fn machine_ids(&self) -> impl Iterator<Item = &MachineId> {
        self.machines.iter().map(|m| &m.id)
    }

    /// Number of machines.
    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    /// Rows across all machines.
    pub fn total_rows(&self) -> usize {
        self.machines.iter().map(MachineHistory::len).sum()
    }
}

/// Parse one machine file. `path` is only used for error context.
pub fn parse_table(path: &Path, text: &str) -> Result<Vec<ReadingRecord>, LoadError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| !line.trim().is_empty());

    let header = match lines.next() {
        Some((_, line)) => split_row(line),
        None => {
            return Err(LoadError::EmptyHeader {
                path: path.to_path_buf(),
            });
        }
    };
    if header.iter().all(|h| h.is_empty()) {
        return Err(LoadError::EmptyHeader {
            path: path.to_path_buf(),
        });
    }

    let mut records = Vec::new();
    for (line_no, line) in lines {
        let cells = split_row(line);
        if cells.len() != header.len() {
            return Err(LoadError::RowLength {
                path: path.to_path_buf(),
                line: line_no,
                expected: header.len(),
                found: cells.len(),
            });
        }
        records.push(ReadingRecord::from_pairs(header.iter().cloned().zip(cells)));
    }
    Ok(records)
}

/// Split a CSV line into trimmed cells. Double quotes group a cell and `""`
/// inside quotes is a literal quote.
fn split_row(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                cell.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => {
                cells.push(cell.trim().to_string());
                cell.clear();
            }
            _ => cell.push(c),
        }
    }
    cells.push(cell.trim().to_string());
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn test_machine_id_from_path() {
        let id = MachineId::from_path(Path::new("/data/CNC_Lathe_01.csv")).unwrap();
        assert_eq!(id.as_str(), "CNC Lathe 01");
    }

    #[test]
    fn test_split_row_trims_and_unquotes() {
        assert_eq!(split_row(" a , b,c "), vec!["a", "b", "c"]);
        assert_eq!(split_row(r#""x, y",2"#), vec!["x, y", "2"]);
        assert_eq!(split_row(r#""say ""hi""",1"#), vec![r#"say "hi""#, "1"]);
        assert_eq!(split_row("a,,b"), vec!["a", "", "b"]);
    }

    #[test]
    fn test_parse_table_skips_blank_lines() {
        let text = "temperature, vibration\n\n 80 , 2.5\n   \n81,2.6\n";
        let records = parse_table(Path::new("m.csv"), text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].raw("vibration"), Some("2.5"));
        assert_eq!(records[1].float("temperature"), 81.0);
    }

    #[test]
    fn test_parse_table_strips_bom() {
        let text = "\u{feff}temperature\n70\n";
        let records = parse_table(Path::new("m.csv"), text).unwrap();
        assert_eq!(records[0].float("temperature"), 70.0);
    }

    #[test]
    fn test_parse_table_row_length_mismatch() {
        let text = "a,b\n1,2\n3\n";
        match parse_table(Path::new("m.csv"), text) {
            Err(LoadError::RowLength {
                line,
                expected,
                found,
                ..
            }) => {
                assert_eq!(line, 3);
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
            }
            other => panic!("expected RowLength, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_table_empty_file() {
        assert!(matches!(
            parse_table(Path::new("m.csv"), "\n  \n"),
            Err(LoadError::EmptyHeader { .. })
        ));
    }

    #[test]
    fn test_non_numeric_values_are_kept_as_text() {
        let records = parse_table(Path::new("m.csv"), "temperature\nhot\n").unwrap();
        assert_eq!(records[0].raw("temperature"), Some("hot"));
        assert!(records[0].float("temperature").is_nan());
    }

    #[test]
    fn test_load_orders_by_file_name() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "Press_B.csv", "temperature\n1\n2\n");
        write(tmp.path(), "Drill_A.csv", "temperature\n3\n");
        write(tmp.path(), "notes.txt", "ignored");

        let store = RecordStore::load(tmp.path()).unwrap();
        let ids: Vec<&str> = store.machine_ids().map(MachineId::as_str).collect();
        assert_eq!(ids, vec!["Drill A", "Press B"]);
        assert_eq!(store.total_rows(), 3);
        assert_eq!(store.get("Press B").unwrap().len(), 2);
    }

    #[test]
    fn test_load_missing_directory_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope");
        assert!(matches!(
            RecordStore::load(&missing),
            Err(LoadError::ReadDir { .. })
        ));
    }

    #[test]
    fn test_load_without_machine_files_fails() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "readme.md", "# nothing");
        assert!(matches!(
            RecordStore::load(tmp.path()),
            Err(LoadError::NoMachines { .. })
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_load_with_only_unnamed_files_fails() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tmp = tempfile::tempdir().unwrap();
        let name = OsStr::from_bytes(b"Mill_\xff.csv");
        fs::write(tmp.path().join(name), "temperature\n1\n").unwrap();
        assert!(matches!(
            RecordStore::load(tmp.path()),
            Err(LoadError::NoMachines { .. })
        ));
    }

    #[test]
    fn test_load_header_only_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "Good.csv", "temperature\n1\n");
        write(tmp.path(), "Idle_Mill.csv", "temperature,vibration\n");
        match RecordStore::load(tmp.path()) {
            Err(LoadError::EmptySequence { machine }) => assert_eq!(machine.as_str(), "Idle Mill"),
            other => panic!("expected EmptySequence, got {other:?}"),
        }
    }

    #[test]
    fn test_load_duplicate_machine_ids_fail() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "Mill_1.csv", "temperature\n1\n");
        write(tmp.path(), "Mill 1.csv", "temperature\n2\n");
        assert!(matches!(
            RecordStore::load(tmp.path()),
            Err(LoadError::DuplicateMachine { .. })
        ));
    }

    #[test]
    fn test_error_messages_name_the_file() {
        let err = LoadError::RowLength {
            path: PathBuf::from("feed/Mill.csv"),
            line: 4,
            expected: 3,
            found: 2,
        };
        assert_eq!(err.to_string(), "feed/Mill.csv:4: expected 3 fields, found 2");
    }
}
