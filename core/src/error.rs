//! file: core/src/error.rs
//! description: diagnostic levels, the diagnostic extension trait and the
//! fatal compile error type.
//!
//! Semantic and advisory problems are collected as [`Diagnostic`] values and
//! never abort a compile. Structural problems (unbalanced scopes, unresolved
//! labels, broken module slots) are raised as [`CompileError`] and end the
//! compile of the program they occur in.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::location::ActionLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level_str = match self {
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        };
        write!(f, "{}", level_str)
    }
}

pub trait SigilErrorExt {
    fn level(&self) -> Level;
    fn message(&self) -> String;
    fn issuer(&self) -> String;
    fn location(&self) -> Option<ActionLocation>;
}

impl fmt::Debug for dyn SigilErrorExt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let loc_str = match self.location() {
            Some(loc) => loc.to_string(),
            None => "program".to_string(),
        };
        write!(
            f,
            "SIGIL | {} | {} | {} | {}",
            self.level(),
            loc_str,
            self.issuer(),
            self.message()
        )
    }
}

impl fmt::Display for dyn SigilErrorExt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One message produced while compiling a program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    level: Level,
    message: String,
    issuer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    location: Option<ActionLocation>,
}

impl Diagnostic {
    pub fn with(
        level: Level,
        message: impl Into<String>,
        issuer: impl Into<String>,
        location: Option<ActionLocation>,
    ) -> Self {
        Diagnostic {
            level,
            message: message.into(),
            issuer: issuer.into(),
            location,
        }
    }

    pub fn is_error(&self) -> bool {
        self.level >= Level::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ext: &dyn SigilErrorExt = self;
        write!(f, "{}", ext)
    }
}

impl SigilErrorExt for Diagnostic {
    fn level(&self) -> Level {
        self.level
    }

    fn message(&self) -> String {
        self.message.clone()
    }

    fn issuer(&self) -> String {
        self.issuer.clone()
    }

    fn location(&self) -> Option<ActionLocation> {
        self.location
    }
}

/// Ordered message sink for one program compile.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics { items: Vec::new() }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.level {
            Level::Info => log::debug!("{}", diagnostic),
            Level::Warning => log::warn!("{}", diagnostic),
            Level::Error | Level::Critical => log::debug!("{}", diagnostic),
        }
        self.items.push(diagnostic);
    }

    pub fn warn(&mut self, issuer: &str, location: Option<ActionLocation>, message: impl Into<String>) {
        self.push(Diagnostic::with(Level::Warning, message, issuer, location));
    }

    pub fn error(&mut self, issuer: &str, location: Option<ActionLocation>, message: impl Into<String>) {
        self.push(Diagnostic::with(Level::Error, message, issuer, location));
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    /// Split into (warnings, errors). Info messages travel with warnings.
    pub fn into_split(self) -> (Vec<Diagnostic>, Vec<Diagnostic>) {
        self.items.into_iter().partition(|d| !d.is_error())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }
}

/// Structural failures. Any of these abandons the compile of the program.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("scope end without a matching block at {location}")]
    UnbalancedScope { location: ActionLocation },

    #[error("event {event} ends with {open} unclosed block(s)")]
    UnclosedScope { event: usize, open: usize },

    #[error("unresolved jump label '{0}'")]
    UnresolvedLabel(String),

    #[error("label '{0}' is defined more than once")]
    DuplicateLabel(String),

    #[error("module '{module}' is missing expected slot '{slot}'")]
    MissingModuleSlot { module: String, slot: String },

    #[error("failed to merge module '{module}': {reason}")]
    ModuleMerge { module: String, reason: String },

    #[error("dependency cycle: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    #[error("assembler rejected program: {0}")]
    Assembler(String),
}

impl CompileError {
    pub fn location(&self) -> Option<ActionLocation> {
        match self {
            CompileError::UnbalancedScope { location } => Some(*location),
            CompileError::UnclosedScope { event, .. } => Some(ActionLocation::event(*event)),
            _ => None,
        }
    }

    pub fn into_diagnostic(self, issuer: &str) -> Diagnostic {
        let location = self.location();
        Diagnostic::with(Level::Critical, self.to_string(), issuer, location)
    }
}

pub type CompileResult<T> = Result<T, CompileError>;
