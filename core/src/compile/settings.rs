use std::path::Path;

use serde::{Deserialize, Serialize};

/// Compiler switches shared by every program of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileSettings {
    /// Append a serialization request to methods that write synced
    /// variables, for programs using manual sync.
    pub auto_request_serialization: bool,
    /// Merge a module's built-in event methods into the caller's.
    pub include_event_hooks: bool,
    /// Worker threads for batch compiles; `None` uses available parallelism.
    pub threads: Option<usize>,
}

impl Default for CompileSettings {
    fn default() -> Self {
        CompileSettings {
            auto_request_serialization: true,
            include_event_hooks: true,
            threads: None,
        }
    }
}

impl CompileSettings {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<CompileSettings, String> {
        let raw = std::fs::read_to_string(&path).map_err(|e| format!("read settings: {}", e))?;
        serde_json::from_str(&raw).map_err(|e| format!("parse settings: {}", e))
    }

    pub fn worker_count(&self) -> usize {
        self.threads
            .filter(|n| *n > 0)
            .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
            .unwrap_or(1)
    }
}
