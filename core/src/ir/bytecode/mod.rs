//! Reference bytecode assembler
//!
//! Serializes a finished `ProgramImage` into a compact byte sequence. Hosts
//! that ship their own VM tooling plug it in through the `Assembler` trait;
//! this implementation keeps the pipeline usable end to end.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ir::asm::ProgramImage;
use crate::ir::op::{Instruction, Target};
use crate::trigger::Value;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssembleError {
    #[error("heap size {given} is smaller than the {required} slot(s) the program declares")]
    HeapTooSmall { given: u32, required: u32 },
    #[error("instruction in '{method}' references unknown symbol '{symbol}'")]
    UnknownSymbol { method: String, symbol: String },
    #[error("jump in '{method}' still targets label '{label}'")]
    UnresolvedTarget { method: String, label: String },
}

/// Assembled program plus the heap size it needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Executable {
    pub bytes: Vec<u8>,
    pub heap_size: u32,
}

/// VM assembler service.
pub trait Assembler: Send + Sync {
    fn assemble(&self, image: &ProgramImage, heap_size: u32) -> Result<Executable, AssembleError>;
}

/// Emits the sigil bytecode container.
///
/// Format (little-endian):
/// - 4 bytes: magic: b"SGBC"
/// - 4 bytes: u32 version (1)
/// - u32 heap_count, then per slot: name, type name, value
/// - u32 export_count, then per exported method: name, u32 address
/// - u32 extern_count, then each extern signature
/// - u32 code_size, then the code: u32 opcode + u32 operand for 8-byte
///   instructions, u32 opcode alone for 4-byte ones
///
/// Strings are encoded as u32 length + UTF-8 bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytecodeAssembler;

impl Assembler for BytecodeAssembler {
    fn assemble(&self, image: &ProgramImage, heap_size: u32) -> Result<Executable, AssembleError> {
        let required = image.heap_size();
        if heap_size < required {
            return Err(AssembleError::HeapTooSmall { given: heap_size, required });
        }

        let mut out: Vec<u8> = Vec::new();
        out.extend_from_slice(b"SGBC");
        write_u32(&mut out, 1);

        write_u32(&mut out, image.heap.len() as u32);
        for entry in &image.heap {
            write_string(&mut out, &entry.name);
            write_string(&mut out, entry.ty.vm_name());
            write_value(&mut out, &entry.default);
        }

        let mut exports = Vec::new();
        let mut addr = 0u32;
        for method in &image.methods {
            if method.exported {
                exports.push((method.name.as_str(), addr));
            }
            addr += method.size();
        }
        write_u32(&mut out, exports.len() as u32);
        for (name, at) in &exports {
            write_string(&mut out, name);
            write_u32(&mut out, *at);
        }

        let mut externs: Vec<&str> = Vec::new();
        for instruction in image.methods.iter().flat_map(|m| m.instructions.iter()) {
            if let Instruction::Extern(sig) = instruction {
                if !externs.contains(&sig.as_str()) {
                    externs.push(sig);
                }
            }
        }
        write_u32(&mut out, externs.len() as u32);
        for sig in &externs {
            write_string(&mut out, sig);
        }

        write_u32(&mut out, addr);
        for method in &image.methods {
            let heap = |symbol: &str| {
                image.heap_index(symbol).ok_or_else(|| AssembleError::UnknownSymbol {
                    method: method.name.clone(),
                    symbol: symbol.to_string(),
                })
            };
            let address = |target: &Target| match target {
                Target::Address(a) => Ok(*a),
                Target::Label(label) => Err(AssembleError::UnresolvedTarget {
                    method: method.name.clone(),
                    label: label.clone(),
                }),
            };
            for instruction in &method.instructions {
                match instruction {
                    Instruction::Nop | Instruction::Sentinel => write_u32(&mut out, 0x00),
                    Instruction::Push(s) => {
                        write_u32(&mut out, 0x01);
                        write_u32(&mut out, heap(s)?);
                    }
                    Instruction::Pop => write_u32(&mut out, 0x02),
                    Instruction::JumpIfFalse(t) => {
                        write_u32(&mut out, 0x04);
                        write_u32(&mut out, address(t)?);
                    }
                    Instruction::Jump(t) => {
                        write_u32(&mut out, 0x05);
                        write_u32(&mut out, address(t)?);
                    }
                    Instruction::Extern(sig) => {
                        write_u32(&mut out, 0x06);
                        let index = externs.iter().position(|e| *e == sig.as_str()).unwrap_or_default();
                        write_u32(&mut out, index as u32);
                    }
                    Instruction::JumpIndirect(s) => {
                        write_u32(&mut out, 0x08);
                        write_u32(&mut out, heap(s)?);
                    }
                    Instruction::Copy => write_u32(&mut out, 0x09),
                    Instruction::Label(_) | Instruction::Comment(_) => {}
                }
            }
        }

        Ok(Executable { bytes: out, heap_size })
    }
}

fn write_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    let b = s.as_bytes();
    write_u32(out, b.len() as u32);
    out.extend_from_slice(b);
}

fn write_value(out: &mut Vec<u8>, v: &Value) {
    match v {
        Value::Null => out.push(0x00),
        Value::Bool(b) => {
            out.push(0x01);
            out.push(if *b { 1 } else { 0 });
        }
        Value::Int(i) => {
            out.push(0x02);
            out.extend_from_slice(&i.to_le_bytes());
        }
        Value::UInt(u) => {
            out.push(0x03);
            write_u32(out, *u);
        }
        Value::Float(f) => {
            out.push(0x04);
            out.extend_from_slice(&f.to_le_bytes());
        }
        Value::Str(s) | Value::Method(s) => {
            out.push(0x05);
            write_string(out, s);
        }
        Value::Vector3(xyz) => {
            out.push(0x06);
            for c in xyz {
                out.extend_from_slice(&c.to_le_bytes());
            }
        }
        Value::This => out.push(0x07),
        Value::Label(l) => {
            // only reachable when assembling an image whose labels were never resolved
            out.push(0x08);
            write_string(out, l);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::method::Method;

    #[test]
    fn rejects_small_heap() {
        let image = ProgramImage::default();
        assert!(BytecodeAssembler.assemble(&image, 0).is_ok());
        let mut image = ProgramImage::default();
        image.heap.push(crate::ir::asm::HeapEntry {
            name: "x".to_string(),
            ty: crate::trigger::VarType::Int,
            default: Value::Int(0),
            exported: false,
            sync: Default::default(),
        });
        assert_eq!(
            BytecodeAssembler.assemble(&image, 0),
            Err(AssembleError::HeapTooSmall { given: 0, required: 1 })
        );
    }

    #[test]
    fn rejects_unresolved_jump() {
        let mut method = Method::new("_start");
        method.emit(Instruction::jump("nowhere"));
        let image = ProgramImage { heap: Vec::new(), methods: vec![method] };
        assert!(matches!(
            BytecodeAssembler.assemble(&image, 0),
            Err(AssembleError::UnresolvedTarget { .. })
        ));
    }
}
