use std::path::PathBuf;

const DATA_DIR_NAME: &str = "quota-relay";

#[derive(Debug, Clone)]
pub struct DataDirResolution {
    pub dir: PathBuf,
    pub matched_existing: bool,
}

pub fn resolve_data_dir(override_dir: Option<PathBuf>) -> Result<DataDirResolution, String> {
    if let Some(dir) = override_dir {
        return Ok(DataDirResolution {
            matched_existing: dir.exists(),
            dir,
        });
    }

    let base = dirs::data_dir().ok_or_else(|| "resolve data directory".to_string())?;
    let dir = base.join(DATA_DIR_NAME);
    Ok(DataDirResolution {
        matched_existing: dir.join("usage-cache.json").exists(),
        dir,
    })
}
