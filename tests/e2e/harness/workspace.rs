use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// An isolated directory tree standing in for a host filesystem, for
/// scenarios that need the tracker to watch a real path.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Result<Self> {
        let dir = TempDir::new().context("failed to create temp workspace")?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn canonical(&self, relative: &str) -> String {
        self.dir.path().join(relative).to_string_lossy().into_owned()
    }

    pub fn write_file(&self, relative: &str, content: &str) -> Result<()> {
        let full = self.dir.path().join(relative);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full, content).with_context(|| format!("writing {relative}"))
    }

    pub fn remove_file(&self, relative: &str) -> Result<()> {
        fs::remove_file(self.dir.path().join(relative)).with_context(|| format!("removing {relative}"))
    }

    pub fn read_file(&self, relative: &str) -> Result<String> {
        fs::read_to_string(self.dir.path().join(relative)).with_context(|| format!("reading {relative}"))
    }
}
