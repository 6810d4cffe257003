use std::path::PathBuf;

use crate::Result;

/// Files and directories the relay owns on disk. The publication directory
/// is the shared location the out-of-process consumer reads from, so it is
/// kept apart from the private cache file.
#[derive(Clone, Debug)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub cache_path: PathBuf,
    pub publication_dir: PathBuf,
}

impl AppPaths {
    pub fn new(data_dir: PathBuf) -> Self {
        let cache_path = data_dir.join("usage-cache.json");
        let publication_dir = data_dir.join("shared");
        Self {
            data_dir,
            cache_path,
            publication_dir,
        }
    }
}

pub fn ensure_data_dirs(paths: &AppPaths) -> Result<()> {
    std::fs::create_dir_all(&paths.data_dir).map_err(relay_store::StoreError::Io)?;
    std::fs::create_dir_all(&paths.publication_dir).map_err(relay_store::StoreError::Io)?;
    Ok(())
}
