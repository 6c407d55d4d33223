use std::fs;
use std::io::{Read as _, Seek, SeekFrom, Write as _};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CoreError;

fn lock_error(path: &Path, source: std::io::Error) -> CoreError {
    CoreError::Lock {
        path: path.display().to_string(),
        source,
    }
}

/// Read a JSON document under a shared lock. A missing file yields `None`.
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, CoreError> {
    let file = match fs::OpenOptions::new().read(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CoreError::Io(e)),
    };
    fs2::FileExt::lock_shared(&file).map_err(|e| lock_error(path, e))?;
    let mut data = String::new();
    let read = (&file).read_to_string(&mut data);
    fs2::FileExt::unlock(&file).ok();
    read?;
    Ok(Some(serde_json::from_str(&data)?))
}

/// Rewrite the whole document under an exclusive lock, creating parent
/// directories as needed.
///
/// The lock only serializes writers inside one machine; the stores still
/// assume a single writing process.
pub fn save<T: Serialize>(path: &Path, value: &T) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(value)?;
    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    fs2::FileExt::lock_exclusive(&file).map_err(|e| lock_error(path, e))?;

    // Truncate only once we hold the lock so readers never see a half-empty file
    let written = (|| -> Result<(), CoreError> {
        file.set_len(0)?;
        (&file).seek(SeekFrom::Start(0))?;
        (&file).write_all(json.as_bytes())?;
        (&file).flush()?;
        Ok(())
    })();

    fs2::FileExt::unlock(&file).map_err(|e| lock_error(path, e))?;
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        items: Vec<u32>,
    }

    #[test]
    fn test_save_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/dir/store.json");

        save(&path, &Doc { items: vec![1, 2, 3] }).unwrap();
        let loaded: Doc = load(&path).unwrap().unwrap();
        assert_eq!(loaded.items, vec![1, 2, 3]);

        // Shorter rewrite must not leave trailing bytes behind
        save(&path, &Doc { items: vec![] }).unwrap();
        let loaded: Doc = load(&path).unwrap().unwrap();
        assert!(loaded.items.is_empty());
    }

    #[test]
    fn test_load_missing_is_none() {
        let tmp = TempDir::new().unwrap();
        let loaded: Option<Doc> = load(&tmp.path().join("absent.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_corrupt_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();
        let err = load::<Doc>(&path).unwrap_err();
        assert!(matches!(err, CoreError::InvalidDocument(_)));
    }

    #[test]
    fn test_save_into_directory_path_fails() {
        let tmp = TempDir::new().unwrap();
        assert!(save(tmp.path(), &Doc { items: vec![] }).is_err());
    }
}
