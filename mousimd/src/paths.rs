//! Cross-platform application paths.

use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppPaths {
    data_dir: PathBuf,
}

impl AppPaths {
    pub fn new() -> Result<Self, String> {
        let data_dir = Self::get_data_dir()?;

        fs::create_dir_all(&data_dir)
            .map_err(|e| format!("Failed to create data directory: {}", e))?;
        fs::create_dir_all(data_dir.join("mazes"))
            .map_err(|e| format!("Failed to create maze directory: {}", e))?;

        Ok(Self { data_dir })
    }

    fn get_data_dir() -> Result<PathBuf, String> {
        let base = dirs::data_dir().ok_or("Could not determine data directory")?;
        Ok(base.join("mousim"))
    }

    pub fn registry_file(&self) -> PathBuf {
        self.data_dir.join("algorithms.json")
    }

    /// Default location for maze files referenced by bare name.
    pub fn maze_dir(&self) -> PathBuf {
        self.data_dir.join("mazes")
    }
}
