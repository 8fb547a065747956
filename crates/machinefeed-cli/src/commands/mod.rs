pub mod replay;
pub mod scan;
pub mod serve;

use std::path::Path;
use std::sync::Arc;

use machinefeed_core::{LoadError, RecordStore};

/// Load the record store or exit. Nothing runs on a partial fleet.
pub fn load_store(data_dir: &str) -> Arc<RecordStore> {
    match try_load_store(data_dir) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

pub fn try_load_store(data_dir: &str) -> Result<Arc<RecordStore>, LoadError> {
    RecordStore::load(Path::new(data_dir)).map(Arc::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // try_load_store tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_load_store_reads_directory() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("Mill_1.csv"), "temperature\n70\n71\n").unwrap();
        let store = try_load_store(tmp.path().to_str().unwrap()).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.get("Mill 1").is_some());
    }

    #[test]
    fn test_load_store_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("absent");
        let err = try_load_store(missing.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("cannot read data directory"));
    }

    #[test]
    fn test_load_store_empty_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let err = try_load_store(tmp.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, LoadError::NoMachines { .. }));
    }
}
