use std::path::Path;

use crate::error::{PixelioError, PixelioResult};

/// Byte-source seam so callers can swap the filesystem for a blob store.
pub trait ByteStore {
    fn read(&self, path: &Path) -> PixelioResult<Vec<u8>>;
    fn write(&self, path: &Path, bytes: &[u8]) -> PixelioResult<()>;
}

/// `std::fs` implementation. Writes create missing parent directories.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsStore;

impl ByteStore for FsStore {
    fn read(&self, path: &Path) -> PixelioResult<Vec<u8>> {
        std::fs::read(path)
            .map_err(|e| PixelioError::io(format!("failed to read '{}': {e}", path.display())))
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> PixelioResult<()> {
        ensure_parent_dir(path)?;
        std::fs::write(path, bytes)
            .map_err(|e| PixelioError::io(format!("failed to write '{}': {e}", path.display())))
    }
}

pub fn ensure_parent_dir(path: &Path) -> PixelioResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_missing_path_is_io_kind() {
        let err = FsStore
            .read(Path::new("definitely/not/here.bin"))
            .unwrap_err();
        assert!(err.to_string().contains("io error:"));
    }

    #[test]
    fn write_then_read_round_trips_and_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.bin");
        FsStore.write(&path, b"payload").unwrap();
        assert_eq!(FsStore.read(&path).unwrap(), b"payload");
    }
}
