use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::analysis::Selection;
use crate::error::Result;

/// Summary of one explained prediction, written next to the figure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionReport {
    /// Dump the figure was produced from
    pub dump: String,
    pub predicted_class: usize,
    /// Trees that voted for `predicted_class`
    pub votes_for_class: usize,
    pub total_trees: usize,
    pub rng_seed: u64,
    pub selections: Vec<Selection>,
}

impl SelectionReport {
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        println!("💾 Selection summary saved to: {}", path.as_ref().display());
        Ok(())
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&json)?)
    }
}
