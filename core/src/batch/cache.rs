use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::ir::Program;
use crate::trigger::ModuleInterface;

/// Unfinished program of a module, ready to be merged into callers.
#[derive(Debug, Clone)]
pub struct LinkableProgram {
    pub key: String,
    pub interface: ModuleInterface,
    pub program: Program,
    /// Modules already merged into `program`, with the prefix each got there.
    pub nested: Vec<NestedModule>,
}

#[derive(Debug, Clone)]
pub struct NestedModule {
    pub module: Arc<LinkableProgram>,
    pub prefix: String,
}

/// Linkable module programs shared by every compile of a batch.
///
/// Written only between dependency levels; compiles within a level only read.
#[derive(Debug, Default)]
pub struct ModuleCache {
    programs: RwLock<HashMap<String, Arc<LinkableProgram>>>,
}

impl ModuleCache {
    pub fn new() -> Self {
        ModuleCache::default()
    }

    pub fn get(&self, key: &str) -> Option<Arc<LinkableProgram>> {
        self.programs.read().get(key).cloned()
    }

    pub fn insert(&self, program: LinkableProgram) {
        log::debug!("module '{}' is now linkable", program.key);
        self.programs.write().insert(program.key.clone(), Arc::new(program));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.programs.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.programs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.read().is_empty()
    }
}
