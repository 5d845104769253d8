use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Destination for encoded exports.
pub trait ExportSink {
    fn save(&mut self, file_name: &str, bytes: &[u8]) -> Result<()>;
}

/// Writes exports into a directory, creating it on first save.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, file_name: &str) -> Result<PathBuf> {
        let name = Path::new(file_name);
        let mut components = name.components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.dir.join(name)),
            _ => Err(anyhow!("invalid export file name: {}", file_name)),
        }
    }
}

impl ExportSink for FileSink {
    fn save(&mut self, file_name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(file_name)?;
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create output dir: {}", self.dir.display()))?;
        fs::write(&path, bytes)
            .with_context(|| format!("failed to write export: {}", path.display()))?;
        Ok(())
    }
}

/// Keeps exports in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub saved: Vec<(String, Vec<u8>)>,
}

impl ExportSink for MemorySink {
    fn save(&mut self, file_name: &str, bytes: &[u8]) -> Result<()> {
        self.saved.push((file_name.to_string(), bytes.to_vec()));
        Ok(())
    }
}
