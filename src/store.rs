//! File-backed content store for canonical datasets
//!
//! Datasets are addressed by generated unique identifiers; the id prefix
//! records the declared file kind so later operations can check it without a
//! side-channel metadata file. The interface stays small (put/get/delete) so
//! the backend can be swapped without touching pipeline logic.

use crate::dataset::Dataset;
use crate::error::{DeckError, Result};
use crate::validate::FileKind;
use std::fs;
use std::path::{Path, PathBuf};

pub struct DatasetStore {
    root: PathBuf,
}

impl DatasetStore {
    /// Open (creating if needed) a store rooted at `root`
    ///
    /// # Errors
    /// Returns error if the directory cannot be created
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Persist a dataset in canonical CSV form under a fresh generated id
    ///
    /// # Errors
    /// Returns error if serialization or the write fails
    pub fn put(&self, dataset: &Dataset, kind: FileKind) -> Result<String> {
        let id = format!("{}-{:016x}", kind.as_str(), rand::random::<u64>());
        let bytes = dataset.to_canonical_csv()?;
        fs::write(self.path_for(&id)?, bytes)?;
        Ok(id)
    }

    /// Load a dataset back by id
    ///
    /// # Errors
    /// Returns `NotFound` if no dataset exists under the id
    pub fn get(&self, id: &str) -> Result<Dataset> {
        let path = self.path_for(id)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DeckError::NotFound(id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Dataset::from_canonical_csv(&bytes)
    }

    /// Remove a stored dataset; missing ids are reported as `NotFound`
    ///
    /// # Errors
    /// Returns `NotFound` if no dataset exists under the id
    pub fn delete(&self, id: &str) -> Result<()> {
        let path = self.path_for(id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(DeckError::NotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The file kind a stored id was uploaded as, read from the id prefix
    ///
    /// # Errors
    /// Returns `NotFound` for ids without a recognized prefix
    pub fn kind_of(id: &str) -> Result<FileKind> {
        for kind in [FileKind::Omics, FileKind::Clinical] {
            if id.starts_with(kind.as_str()) {
                return Ok(kind);
            }
        }
        Err(DeckError::NotFound(id.to_string()))
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        // Generated ids are [a-z0-9-]; anything else never names a dataset
        if id.is_empty()
            || !id
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(DeckError::NotFound(id.to_string()));
        }
        Ok(self.root.join(format!("{id}.csv")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_dataset() -> Dataset {
        Dataset {
            sample_ids: vec!["s1".into(), "s2".into()],
            feature_names: vec!["g1".into()],
            cells: vec![vec!["1.0".into()], vec!["2.0".into()]],
        }
    }

    #[test]
    fn test_put_get_round_trip() {
        let dir = TempDir::new().expect("temp dir");
        let store = DatasetStore::open(dir.path()).expect("open");

        let ds = sample_dataset();
        let id = store.put(&ds, FileKind::Omics).expect("put");
        assert!(id.starts_with("omics-"));

        let back = store.get(&id).expect("get");
        assert_eq!(ds, back);
    }

    #[test]
    fn test_ids_are_unique() {
        let dir = TempDir::new().expect("temp dir");
        let store = DatasetStore::open(dir.path()).expect("open");
        let ds = sample_dataset();
        let a = store.put(&ds, FileKind::Omics).expect("put");
        let b = store.put(&ds, FileKind::Omics).expect("put");
        assert_ne!(a, b);
    }

    #[test]
    fn test_missing_id_is_not_found() {
        let dir = TempDir::new().expect("temp dir");
        let store = DatasetStore::open(dir.path()).expect("open");
        let err = store.get("omics-0000000000000000").unwrap_err();
        assert!(matches!(err, DeckError::NotFound(_)));
    }

    #[test]
    fn test_delete_removes_dataset() {
        let dir = TempDir::new().expect("temp dir");
        let store = DatasetStore::open(dir.path()).expect("open");
        let id = store.put(&sample_dataset(), FileKind::Clinical).expect("put");

        store.delete(&id).expect("delete");
        assert!(matches!(store.get(&id), Err(DeckError::NotFound(_))));
        assert!(matches!(store.delete(&id), Err(DeckError::NotFound(_))));
    }

    #[test]
    fn test_kind_prefix() {
        assert_eq!(
            DatasetStore::kind_of("clinical-00ff").expect("kind"),
            FileKind::Clinical
        );
        assert!(DatasetStore::kind_of("mystery-00ff").is_err());
    }

    #[test]
    fn test_path_traversal_rejected() {
        let dir = TempDir::new().expect("temp dir");
        let store = DatasetStore::open(dir.path()).expect("open");
        assert!(matches!(
            store.get("../../etc/passwd"),
            Err(DeckError::NotFound(_))
        ));
    }
}
