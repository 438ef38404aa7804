pub mod data;
pub mod value;

pub use data::*;
pub use value::{Value, VarType};

/// Identifier rule shared by variables and custom events.
pub fn is_legal_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
