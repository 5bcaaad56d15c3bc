//! Append-only JSONL log of finished activities

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::domain::ActivityResult;
use crate::error::{AgentLoopError, Result};

/// One ActivityResult per line, in completion order
#[derive(Debug, Clone)]
pub struct ActivityLog {
    path: PathBuf,
}

impl ActivityLog {
    /// Log at `path`; parent directories are created on demand
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a finished activity
    pub fn append(&self, result: &ActivityResult) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(result)?)?;
        log::debug!("Recorded activity {} to {}", result.activity_id, self.path.display());
        Ok(())
    }

    /// Every recorded activity; a missing file is an empty log
    pub fn load_all(&self) -> Result<Vec<ActivityResult>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let mut results = Vec::new();
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let result = serde_json::from_str(&line).map_err(|e| {
                AgentLoopError::Storage(format!("{}:{}: {}", self.path.display(), number + 1, e))
            })?;
            results.push(result);
        }
        Ok(results)
    }

    /// Most recent record for `activity_id`
    pub fn get(&self, activity_id: &str) -> Result<Option<ActivityResult>> {
        Ok(self
            .load_all()?
            .into_iter()
            .rev()
            .find(|r| r.activity_id == activity_id))
    }
}
