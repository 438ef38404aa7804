//! file: core/src/batch/mod.rs
//! description: compiles a set of programs in module dependency order.
//!
//! Programs of one dependency level compile in parallel on scoped threads.
//! Module programs produced by a level are published to the shared cache
//! before the next level starts, so every compile sees the modules it uses.

mod cache;
pub mod order;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub use cache::{LinkableProgram, ModuleCache, NestedModule};
pub use order::{BuildOrder, build_order};

use crate::actions::ActionRegistry;
use crate::compile::{CompileOutcome, CompileSettings, CompiledProgram, compile_program};
use crate::error::{CompileError, Diagnostics};
use crate::ir::Assembler;
use crate::trigger::ProgramSource;

const ISSUER: &str = "sigil.batch";

/// Results of a batch, keyed by program.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub programs: BTreeMap<String, CompiledProgram>,
}

impl BatchReport {
    /// Per-program success flags.
    pub fn successes(&self) -> BTreeMap<String, bool> {
        self.programs.iter().map(|(k, p)| (k.clone(), p.is_success())).collect()
    }

    pub fn failed(&self) -> impl Iterator<Item = &CompiledProgram> {
        self.programs.values().filter(|p| !p.is_success())
    }

    pub fn get(&self, key: &str) -> Option<&CompiledProgram> {
        self.programs.get(key)
    }
}

pub fn compile_batch(
    sources: &[ProgramSource],
    settings: &CompileSettings,
    registry: &ActionRegistry,
    assembler: &dyn Assembler,
) -> BatchReport {
    let mut report = BatchReport::default();
    let mut by_key: BTreeMap<&str, &ProgramSource> = BTreeMap::new();
    for source in sources {
        if by_key.insert(source.key.as_str(), source).is_some() {
            log::warn!("program '{}' appears more than once; keeping the last", source.key);
        }
    }
    let graph: BTreeMap<String, BTreeSet<String>> =
        by_key.iter().map(|(k, s)| (k.to_string(), s.dependencies())).collect();
    let order = build_order(&graph);

    for (key, cycle) in &order.blocked {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(CompileError::DependencyCycle(cycle.clone()).into_diagnostic(ISSUER));
        report.programs.insert(key.clone(), CompiledProgram::failed(key, diagnostics));
    }

    let modules = ModuleCache::new();
    let workers = settings.worker_count();
    log::info!(
        "compiling {} program(s) in {} level(s) on up to {} thread(s)",
        by_key.len(),
        order.levels.len(),
        workers
    );
    for level in &order.levels {
        let level: Vec<&ProgramSource> = level.iter().filter_map(|k| by_key.get(k.as_str()).copied()).collect();
        for chunk in level.chunks(workers.max(1)) {
            let outcomes: Vec<CompileOutcome> = std::thread::scope(|scope| {
                let handles: Vec<_> = chunk
                    .iter()
                    .map(|source| {
                        let modules = &modules;
                        scope.spawn(move || compile_program(source, registry, modules, settings, assembler))
                    })
                    .collect();
                handles
                    .into_iter()
                    .zip(chunk.iter())
                    .map(|(handle, source)| {
                        handle.join().unwrap_or_else(|_| {
                            let mut diagnostics = Diagnostics::new();
                            diagnostics.error(ISSUER, None, "compile thread panicked");
                            CompileOutcome { compiled: CompiledProgram::failed(&source.key, diagnostics), linkable: None }
                        })
                    })
                    .collect()
            });
            for outcome in outcomes {
                if let Some(linkable) = outcome.linkable {
                    modules.insert(linkable);
                }
                report.programs.insert(outcome.compiled.key.clone(), outcome.compiled);
            }
        }
    }
    let failed = report.failed().count();
    if failed > 0 {
        log::warn!("{} of {} program(s) failed", failed, report.programs.len());
    }
    report
}
