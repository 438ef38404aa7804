/// cli/src/output.rs
/// Terminal rendering for build results
/// description: styles, the per-program summary table and diagnostic lines.

use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL};
use console::Style;
use sigil_core::{ActionRegistry, BatchReport, CompiledProgram, Diagnostic, Level, SigilErrorExt, generate_error_report};

/// Styles for different output elements
pub struct FormatStyle {
    pub title: Style,
    pub info: Style,
    pub warning: Style,
    pub error: Style,
    pub success: Style,
}

impl Default for FormatStyle {
    fn default() -> Self {
        FormatStyle {
            title: Style::new().bold().underlined(),
            info: Style::new().cyan(),
            warning: Style::new().yellow(),
            error: Style::new().red().bold(),
            success: Style::new().green().bold(),
        }
    }
}

impl FormatStyle {
    pub fn diagnostic(&self, diagnostic: &Diagnostic) -> String {
        let line = generate_error_report(diagnostic);
        match diagnostic.level() {
            Level::Info => self.info.apply_to(line).to_string(),
            Level::Warning => self.warning.apply_to(line).to_string(),
            Level::Error | Level::Critical => self.error.apply_to(line).to_string(),
        }
    }
}

fn status_cell(program: &CompiledProgram) -> Cell {
    if program.is_success() {
        Cell::new("ok").fg(Color::Green)
    } else {
        Cell::new("failed").fg(Color::Red)
    }
}

/// One row per program: status, size and message counts.
pub fn summary_table(report: &BatchReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Program", "Status", "Methods", "Heap", "Network", "Warnings", "Errors"]);
    for (key, program) in &report.programs {
        table.add_row(vec![
            Cell::new(key),
            status_cell(program),
            Cell::new(program.exported_methods.len()),
            Cell::new(program.heap_defaults.len()),
            Cell::new(if program.requires_network { "yes" } else { "no" }),
            Cell::new(program.warnings.len()),
            Cell::new(program.errors.len()),
        ]);
    }
    table
}

/// Registered actions and events, for `sigil actions`.
pub fn actions_table(registry: &ActionRegistry) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Action", "Parameters", "Notes"]);
    for def in registry.primitives() {
        let params = def
            .params
            .iter()
            .map(|p| if p.output { format!("out {}: {}", p.name, p.ty) } else { format!("{}: {}", p.name, p.ty) })
            .collect::<Vec<_>>()
            .join(", ");
        let mut notes = Vec::new();
        if def.repeatable_first {
            notes.push("repeatable".to_string());
        }
        if let Some(hint) = &def.deprecated {
            notes.push(format!("deprecated: {}", hint));
        }
        table.add_row(vec![Cell::new(&def.id), Cell::new(params), Cell::new(notes.join("; "))]);
    }
    for event in registry.events() {
        table.add_row(vec![
            Cell::new(format!("event {}", event.name)),
            Cell::new(event.params.iter().map(|p| format!("{}: {}", p.name, p.ty)).collect::<Vec<_>>().join(", ")),
            Cell::new(&event.method),
        ]);
    }
    table
}
