//! Workspace identifier generation and storage.
//!
//! An identifier is a 10-digit decimal string (two concatenated five-digit
//! random numbers) stored as an empty marker file in the workspace metadata
//! directory, named by the identifier value. Identifiers are immutable once
//! created: deleting a workspace removes only its registry link, so the
//! marker survives and the old identifier is simply orphaned when the
//! directory is re-added under a fresh one.

use std::path::Path;

use rand::Rng;
use tracing::warn;

use crate::error::{BurrowError, Result};

/// Generates a fresh identifier: two five-digit random numbers concatenated.
pub fn generate() -> String {
    let mut rng = rand::thread_rng();
    let hi: u32 = rng.gen_range(10_000..100_000);
    let lo: u32 = rng.gen_range(10_000..100_000);
    format!("{hi}{lo}")
}

/// Returns true if `name` has the shape of an identifier marker.
pub fn is_identifier(name: &str) -> bool {
    name.len() == 10 && name.bytes().all(|b| b.is_ascii_digit())
}

/// Reads the identifier marker from a metadata directory.
pub fn read(meta_dir: &Path) -> Result<Option<String>> {
    let entries = match fs_err::read_dir(meta_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(BurrowError::io(
                format!("scanning metadata dir {}", meta_dir.display()),
                err,
            ))
        }
    };

    for entry in entries {
        let entry = entry.map_err(|err| BurrowError::io("reading metadata dir entry", err))?;
        if let Some(name) = entry.file_name().to_str() {
            if is_identifier(name) {
                return Ok(Some(name.to_string()));
            }
        }
    }

    Ok(None)
}

/// Creates the identifier marker file in a metadata directory.
///
/// Refuses to overwrite: if a marker already exists the existing identifier
/// is returned unchanged with a warning.
pub fn create(meta_dir: &Path) -> Result<String> {
    if let Some(existing) = read(meta_dir)? {
        warn!(
            id = %existing,
            dir = %meta_dir.display(),
            "identifier already exists; refusing to overwrite"
        );
        return Ok(existing);
    }

    let id = generate();
    fs_err::write(meta_dir.join(&id), b"").map_err(|err| {
        BurrowError::io(
            format!("writing identifier marker in {}", meta_dir.display()),
            err,
        )
    })?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn generated_identifiers_are_ten_digits() {
        for _ in 0..100 {
            let id = generate();
            assert!(is_identifier(&id), "bad identifier: {id}");
        }
    }

    #[test]
    fn read_empty_dir_finds_nothing() {
        let temp = tempdir().unwrap();
        assert_eq!(read(temp.path()).unwrap(), None);
    }

    #[test]
    fn read_missing_dir_finds_nothing() {
        let temp = tempdir().unwrap();
        assert_eq!(read(&temp.path().join("absent")).unwrap(), None);
    }

    #[test]
    fn create_then_read_roundtrips() {
        let temp = tempdir().unwrap();
        let id = create(temp.path()).unwrap();
        assert_eq!(read(temp.path()).unwrap(), Some(id));
    }

    #[test]
    fn create_is_idempotent() {
        let temp = tempdir().unwrap();
        let first = create(temp.path()).unwrap();
        let second = create(temp.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn non_identifier_files_are_ignored() {
        let temp = tempdir().unwrap();
        fs_err::write(temp.path().join("enter.sh"), b"").unwrap();
        fs_err::write(temp.path().join("12345"), b"").unwrap(); // too short
        assert_eq!(read(temp.path()).unwrap(), None);
    }
}
