//! Step checkpointing: a newline-separated file of step names that have
//! already completed for the current scratch area, so re-running a recipe
//! after an interruption skips work it already finished.

use crate::error::{ChefError, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const COMPONENT: &str = "oven/checkpoint";
const FILE_NAME: &str = ".checkpoint";

pub struct Checkpoint {
    path: PathBuf,
    done: HashSet<String>,
}

impl Checkpoint {
    pub fn open(scratch_root: &Path) -> Result<Self> {
        let path = scratch_root.join(FILE_NAME);
        let done = if path.exists() {
            std::fs::read_to_string(&path)
                .map_err(|e| ChefError::io(COMPONENT, &path, e))?
                .lines()
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        } else {
            HashSet::new()
        };
        Ok(Checkpoint { path, done })
    }

    pub fn contains(&self, step: &str) -> bool {
        self.done.contains(step)
    }

    /// Record `step` as complete, appending to the checkpoint file so a
    /// crash partway through a recipe doesn't lose earlier progress.
    pub fn create(&mut self, step: &str) -> Result<()> {
        if self.done.insert(step.to_string()) {
            use std::io::Write;
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(|e| ChefError::io(COMPONENT, &self.path, e))?;
            writeln!(file, "{step}").map_err(|e| ChefError::io(COMPONENT, &self.path, e))?;
        }
        Ok(())
    }

    /// Drop a single step's checkpoint, forcing it to re-run next time.
    pub fn remove(&mut self, step: &str) -> Result<()> {
        self.done.remove(step);
        self.rewrite()
    }

    /// Drop every checkpoint, forcing the whole recipe to re-run.
    pub fn clear(&mut self) -> Result<()> {
        self.done.clear();
        self.rewrite()
    }

    fn rewrite(&self) -> Result<()> {
        let mut contents = String::new();
        for step in &self.done {
            contents.push_str(step);
            contents.push('\n');
        }
        std::fs::write(&self.path, contents).map_err(|e| ChefError::io(COMPONENT, &self.path, e))
    }
}
