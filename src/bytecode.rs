//! Symbolic decoding of JVM method bodies.
//!
//! Only the instructions that name other classes or members, plus the few the
//! accessor analyses pattern-match on (local loads and returns), keep their
//! operands. Everything else is kept as [`Instruction::Other`] so instruction
//! counts stay faithful.

use serde::{Deserialize, Serialize};

use crate::classfile::ConstantPool;
use crate::descriptor::class_constant_target;
use crate::error::ClassFormatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    Int,
    Long,
    Float,
    Double,
    Reference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dispatch {
    Virtual,
    Special,
    Static,
    Interface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldAccess {
    GetStatic,
    PutStatic,
    GetField,
    PutField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeOp {
    New,
    NewArray,
    MultiNewArray,
    CheckCast,
    InstanceOf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    Load {
        local: u16,
        kind: ValueKind,
    },
    Invoke {
        dispatch: Dispatch,
        owner: String,
        name: String,
        descriptor: String,
    },
    InvokeDynamic {
        name: String,
        descriptor: String,
    },
    Field {
        access: FieldAccess,
        owner: String,
        name: String,
        descriptor: String,
    },
    /// `class` is the designated element class; primitive arrays carry none.
    Type {
        op: TypeOp,
        class: Option<String>,
    },
    ClassConstant {
        class: Option<String>,
    },
    /// `None` for a `void` return.
    Return {
        kind: Option<ValueKind>,
    },
    Other {
        opcode: u8,
    },
}

pub fn decode(code: &[u8], pool: &ConstantPool) -> Result<Vec<Instruction>, ClassFormatError> {
    let mut out = Vec::new();
    let mut pc = 0usize;
    while pc < code.len() {
        let opcode = code[pc];
        let (instruction, len) = decode_one(code, pc, opcode, pool)?;
        out.push(instruction);
        pc += len;
    }
    Ok(out)
}

fn decode_one(
    code: &[u8],
    pc: usize,
    opcode: u8,
    pool: &ConstantPool,
) -> Result<(Instruction, usize), ClassFormatError> {
    let other = Instruction::Other { opcode };
    Ok(match opcode {
        // iload..aload with explicit index
        0x15..=0x19 => (
            Instruction::Load {
                local: u16::from(u1(code, pc + 1)?),
                kind: load_kind(opcode - 0x15),
            },
            2,
        ),
        // iload_0..aload_3
        0x1a..=0x2d => {
            let n = opcode - 0x1a;
            (
                Instruction::Load {
                    local: u16::from(n % 4),
                    kind: load_kind(n / 4),
                },
                1,
            )
        }
        0x12 => (loadable(pool, u16::from(u1(code, pc + 1)?), opcode), 2),
        0x13 => (loadable(pool, u2(code, pc + 1)?, opcode), 3),
        0xac..=0xb0 => (
            Instruction::Return {
                kind: Some(load_kind(opcode - 0xac)),
            },
            1,
        ),
        0xb1 => (Instruction::Return { kind: None }, 1),
        0xb2..=0xb5 => {
            let (owner, name, descriptor) = pool.member_ref(u2(code, pc + 1)?)?;
            let access = match opcode {
                0xb2 => FieldAccess::GetStatic,
                0xb3 => FieldAccess::PutStatic,
                0xb4 => FieldAccess::GetField,
                _ => FieldAccess::PutField,
            };
            (
                Instruction::Field {
                    access,
                    owner,
                    name,
                    descriptor,
                },
                3,
            )
        }
        0xb6..=0xb9 => {
            let (owner, name, descriptor) = pool.member_ref(u2(code, pc + 1)?)?;
            let dispatch = match opcode {
                0xb6 => Dispatch::Virtual,
                0xb7 => Dispatch::Special,
                0xb8 => Dispatch::Static,
                _ => Dispatch::Interface,
            };
            let len = if opcode == 0xb9 { 5 } else { 3 };
            (
                Instruction::Invoke {
                    dispatch,
                    owner,
                    name,
                    descriptor,
                },
                len,
            )
        }
        0xba => {
            let (name, descriptor) = pool.dynamic_name_and_type(u2(code, pc + 1)?)?;
            (Instruction::InvokeDynamic { name, descriptor }, 5)
        }
        0xbb | 0xbd | 0xc0 | 0xc1 | 0xc5 => {
            let class = class_constant_target(&pool.class_name(u2(code, pc + 1)?)?);
            let op = match opcode {
                0xbb => TypeOp::New,
                0xbd => TypeOp::NewArray,
                0xc0 => TypeOp::CheckCast,
                0xc1 => TypeOp::InstanceOf,
                _ => TypeOp::MultiNewArray,
            };
            let len = if opcode == 0xc5 { 4 } else { 3 };
            (Instruction::Type { op, class }, len)
        }
        0xaa => (other, table_switch_len(code, pc)?),
        0xab => (other, lookup_switch_len(code, pc)?),
        0xc4 => {
            let len = if u1(code, pc + 1)? == 0x84 { 6 } else { 4 };
            (other, len)
        }
        _ => (other, 1 + fixed_operand_len(opcode, pc)?),
    })
}

fn load_kind(n: u8) -> ValueKind {
    match n {
        0 => ValueKind::Int,
        1 => ValueKind::Long,
        2 => ValueKind::Float,
        3 => ValueKind::Double,
        _ => ValueKind::Reference,
    }
}

fn loadable(pool: &ConstantPool, index: u16, opcode: u8) -> Instruction {
    match pool.class_name_opt(index) {
        Some(name) => Instruction::ClassConstant {
            class: class_constant_target(name),
        },
        None => Instruction::Other { opcode },
    }
}

fn fixed_operand_len(opcode: u8, pc: usize) -> Result<usize, ClassFormatError> {
    Ok(match opcode {
        0x00..=0x0f => 0,
        0x10 => 1,
        0x11 => 2,
        0x14 => 2,
        0x2e..=0x35 => 0,
        0x36..=0x3a => 1,
        0x3b..=0x83 => 0,
        0x84 => 2,
        0x85..=0x98 => 0,
        0x99..=0xa8 => 2,
        0xa9 => 1,
        0xbc => 1,
        0xbe | 0xbf | 0xc2 | 0xc3 => 0,
        0xc6 | 0xc7 => 2,
        0xc8 | 0xc9 => 4,
        _ => return Err(ClassFormatError::UnknownOpcode { opcode, pc }),
    })
}

fn switch_padding(pc: usize) -> usize {
    (4 - (pc + 1) % 4) % 4
}

fn table_switch_len(code: &[u8], pc: usize) -> Result<usize, ClassFormatError> {
    let base = pc + 1 + switch_padding(pc);
    let low = i4(code, base + 4)?;
    let high = i4(code, base + 8)?;
    let count = usize::try_from(i64::from(high) - i64::from(low) + 1).unwrap_or(0);
    let len = base + 12 + count * 4 - pc;
    ensure(code, pc + len)?;
    Ok(len)
}

fn lookup_switch_len(code: &[u8], pc: usize) -> Result<usize, ClassFormatError> {
    let base = pc + 1 + switch_padding(pc);
    let pairs = usize::try_from(i4(code, base + 4)?).unwrap_or(0);
    let len = base + 8 + pairs * 8 - pc;
    ensure(code, pc + len)?;
    Ok(len)
}

fn ensure(code: &[u8], end: usize) -> Result<(), ClassFormatError> {
    if end > code.len() {
        return Err(ClassFormatError::Truncated {
            offset: code.len(),
            wanted: end - code.len(),
        });
    }
    Ok(())
}

fn u1(code: &[u8], at: usize) -> Result<u8, ClassFormatError> {
    ensure(code, at + 1)?;
    Ok(code[at])
}

fn u2(code: &[u8], at: usize) -> Result<u16, ClassFormatError> {
    ensure(code, at + 2)?;
    Ok(u16::from_be_bytes([code[at], code[at + 1]]))
}

fn i4(code: &[u8], at: usize) -> Result<i32, ClassFormatError> {
    ensure(code, at + 4)?;
    Ok(i32::from_be_bytes([
        code[at],
        code[at + 1],
        code[at + 2],
        code[at + 3],
    ]))
}
