//! Artifact payload files on disk.
//!
//! Layout: `<root>/<project_id>/<filename>`. Writes go through a temp file in
//! the same directory and are renamed into place.

use anyhow::{Context, Result};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct PayloadStore {
    root: PathBuf,
}

impl PayloadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_dir(&self, project_id: &str) -> Result<PathBuf> {
        ensure_plain_name(project_id)?;
        Ok(self.root.join(project_id))
    }

    pub fn payload_path(&self, project_id: &str, filename: &str) -> Result<PathBuf> {
        ensure_plain_name(filename)?;
        Ok(self.project_dir(project_id)?.join(filename))
    }

    pub fn write_json(&self, project_id: &str, filename: &str, data: &Value) -> Result<PathBuf> {
        let dir = self.project_dir(project_id)?;
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating payload dir {}", dir.display()))?;
        let path = self.payload_path(project_id, filename)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .with_context(|| format!("creating temp file in {}", dir.display()))?;
        serde_json::to_writer_pretty(&mut tmp, data)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path)
            .with_context(|| format!("persisting payload {}", path.display()))?;

        log::debug!("wrote payload {}", path.display());
        Ok(path)
    }

    /// Read a payload. `Ok(None)` when the file is missing.
    pub fn read_json(&self, project_id: &str, filename: &str) -> Result<Option<Value>> {
        let path = self.payload_path(project_id, filename)?;
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("reading payload {}", path.display()));
            }
        };
        let value = serde_json::from_str(&contents)
            .with_context(|| format!("parsing payload {}", path.display()))?;
        Ok(Some(value))
    }

    pub fn remove(&self, project_id: &str, filename: &str) -> Result<bool> {
        let path = self.payload_path(project_id, filename)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err).with_context(|| format!("removing payload {}", path.display())),
        }
    }

    /// Remove a project's payload directory. Returns the number of files removed.
    pub fn remove_project(&self, project_id: &str) -> Result<usize> {
        let dir = self.project_dir(project_id)?;
        if !dir.is_dir() {
            return Ok(0);
        }
        let count = self.file_count(project_id)?;
        std::fs::remove_dir_all(&dir)
            .with_context(|| format!("removing payload dir {}", dir.display()))?;
        log::info!("Removed {} payload files for project {}", count, project_id);
        Ok(count)
    }

    /// Remove every project's payload directory under the root. Returns the
    /// number of files removed.
    pub fn remove_all(&self) -> Result<usize> {
        if !self.root.is_dir() {
            return Ok(0);
        }
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.root)
            .with_context(|| format!("listing payload root {}", self.root.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            match entry.file_name().to_str() {
                Some(project_id) => removed += self.remove_project(project_id)?,
                None => log::warn!("Skipping non UTF-8 payload dir {}", entry.path().display()),
            }
        }
        Ok(removed)
    }

    pub fn file_count(&self, project_id: &str) -> Result<usize> {
        let dir = self.project_dir(project_id)?;
        if !dir.is_dir() {
            return Ok(0);
        }
        let mut count = 0;
        for entry in std::fs::read_dir(&dir)? {
            if entry?.file_type()?.is_file() {
                count += 1;
            }
        }
        Ok(count)
    }
}

fn ensure_plain_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.contains('\0');
    if !valid {
        anyhow::bail!("invalid payload path component '{name}'");
    }
    Ok(())
}
