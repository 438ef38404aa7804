//! file: core/src/compile/mod.rs
//! description: single-program compile pipeline.
//!
//! Declaring variables, emitting every event, snapshotting the linkable
//! program for dependants, running the finishing passes and handing the
//! image to the assembler. Structural failures stop the pipeline at once;
//! semantic errors let emission finish so every message is reported, then
//! skip finishing.

mod action;
mod context;
mod event;
pub mod finish;
pub mod module;
pub mod refs;
pub mod scope;
pub mod settings;

use serde::{Deserialize, Serialize};

pub use context::{CompileContext, change_method};
pub use finish::{FinishReport, finish_program, requires_network};
pub use module::{InstanceCopies, ModuleLinker, Translation};
pub use refs::{ChainLink, EventChain, LinkKind, ReferenceIndex};
pub use scope::{FrameKind, PreviousScope, ScopeFrame, ScopeStack};
pub use settings::CompileSettings;

use crate::actions::ActionRegistry;
use crate::batch::{LinkableProgram, ModuleCache, NestedModule};
use crate::error::{CompileError, Diagnostic, Diagnostics, Level};
use crate::ir::{Assembler, Executable, HeapEntry, Program, ProgramImage};
use crate::trigger::ProgramSource;

use context::ISSUER;

/// Everything a compile produces for one program.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompiledProgram {
    pub key: String,
    pub assembly: String,
    pub executable: Option<Executable>,
    pub heap_defaults: Vec<HeapEntry>,
    pub references: Vec<ReferenceIndex>,
    pub chains: Vec<EventChain>,
    pub exported_methods: Vec<String>,
    pub exported_variables: Vec<String>,
    pub synced: Vec<String>,
    pub requires_network: bool,
    pub warnings: Vec<Diagnostic>,
    pub errors: Vec<Diagnostic>,
    /// Finished program, kept for inspection by tests and tooling.
    #[serde(skip)]
    pub program: Option<Program>,
}

impl CompiledProgram {
    /// Empty artifact carrying only the messages of a failed compile.
    pub fn failed(key: &str, diagnostics: Diagnostics) -> Self {
        let (warnings, errors) = diagnostics.into_split();
        CompiledProgram { key: key.to_string(), warnings, errors, ..CompiledProgram::default() }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A compiled program plus, for modules, the snapshot dependants merge.
#[derive(Debug, Clone)]
pub struct CompileOutcome {
    pub compiled: CompiledProgram,
    pub linkable: Option<LinkableProgram>,
}

pub fn compile_program(
    source: &ProgramSource,
    registry: &ActionRegistry,
    modules: &ModuleCache,
    settings: &CompileSettings,
    assembler: &dyn Assembler,
) -> CompileOutcome {
    log::debug!("compiling program '{}' ({} event(s))", source.key, source.data.events.len());
    let mut ctx = CompileContext::new(source, registry, modules, settings);
    match emit_program(&mut ctx) {
        Ok(()) => {}
        Err(fatal) => return fatal_outcome(source, ctx.diagnostics, fatal),
    }
    if ctx.diagnostics.has_errors() {
        log::info!("program '{}' has errors; skipping finishing passes", source.key);
        return CompileOutcome { compiled: CompiledProgram::failed(&source.key, ctx.diagnostics), linkable: None };
    }

    let linkable = source.module.as_ref().map(|interface| LinkableProgram {
        key: source.key.clone(),
        interface: interface.clone(),
        program: ctx.program.clone(),
        nested: ctx
            .linker
            .merged()
            .filter_map(|t| {
                let module = ctx.modules.get(&t.module)?;
                Some(NestedModule { module, prefix: t.prefix.clone() })
            })
            .collect(),
    });

    let CompileContext { mut program, mut diagnostics, references, chains, .. } = ctx;
    let report = match finish_program(&mut program, source.data.sync, settings) {
        Ok(report) => report,
        Err(fatal) => return fatal_outcome(source, diagnostics, fatal),
    };

    let image = ProgramImage::from_program(&program);
    let assembly = image.render();
    let executable = match assembler.assemble(&image, image.heap_size()) {
        Ok(executable) => Some(executable),
        Err(e) => {
            let error = CompileError::Assembler(e.to_string());
            diagnostics.push(Diagnostic::with(Level::Error, error.to_string(), ISSUER, None));
            None
        }
    };

    let exported_methods = program.methods.iter().filter(|m| m.exported).map(|m| m.name.clone()).collect();
    let exported_variables = image.heap.iter().filter(|h| h.exported).map(|h| h.name.clone()).collect();
    let synced = image.heap.iter().filter(|h| h.sync.is_synced()).map(|h| h.name.clone()).collect();
    let (warnings, errors) = diagnostics.into_split();
    log::info!(
        "compiled program '{}': {} method(s), heap {}, {} warning(s)",
        source.key,
        program.methods.len(),
        image.heap_size(),
        warnings.len()
    );

    let compiled = CompiledProgram {
        key: source.key.clone(),
        assembly,
        executable,
        heap_defaults: image.heap,
        references,
        chains,
        exported_methods,
        exported_variables,
        synced,
        requires_network: report.requires_network,
        warnings,
        errors,
        program: Some(program),
    };
    let linkable = if compiled.is_success() { linkable } else { None };
    CompileOutcome { compiled, linkable }
}

fn emit_program(ctx: &mut CompileContext<'_>) -> Result<(), CompileError> {
    ctx.declare_variables();
    let source = ctx.source;
    for (index, event) in source.data.events.iter().enumerate() {
        event::emit_event(ctx, index, event)?;
    }
    Ok(())
}

fn fatal_outcome(source: &ProgramSource, mut diagnostics: Diagnostics, fatal: CompileError) -> CompileOutcome {
    log::warn!("program '{}' failed: {}", source.key, fatal);
    diagnostics.push(fatal.into_diagnostic(ISSUER));
    CompileOutcome { compiled: CompiledProgram::failed(&source.key, diagnostics), linkable: None }
}
