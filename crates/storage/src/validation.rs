use std::path::{Component, Path};

use crate::StorageError;

/// Validates that an object key stays inside its bucket.
///
/// Rejects:
/// - Empty keys
/// - Absolute keys (Unix `/` or Windows `C:\`)
/// - Parent directory traversal (`..`)
/// - Windows prefix components (`C:`, `\\server`)
/// - Keys that name no file (`.` or `./`)
pub fn validate_object_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("empty key".into()));
    }

    let path = Path::new(key);

    if path.is_absolute() {
        return Err(StorageError::InvalidKey(format!(
            "absolute key not allowed: {key}"
        )));
    }

    let mut named = false;
    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(StorageError::InvalidKey(format!(
                    "parent directory traversal not allowed: {key}"
                )));
            }
            Component::Prefix(_) => {
                return Err(StorageError::InvalidKey(format!(
                    "path prefix not allowed: {key}"
                )));
            }
            Component::RootDir => {
                return Err(StorageError::InvalidKey(format!(
                    "absolute key not allowed: {key}"
                )));
            }
            Component::Normal(_) => named = true,
            Component::CurDir => {}
        }
    }

    if !named {
        return Err(StorageError::InvalidKey(format!("key names no object: {key}")));
    }

    Ok(())
}
