//! The instruction set (spec.md §4.4 "Instruction set").
//!
//! Grounded on the teacher's `common::opcode::Opcode` (a `#[repr(u8)]` enum
//! over the chunk's byte stream) and the original source's
//! `include/common/opcode.h`, whose numeric byte values this reimplements
//! exactly so the container byte layout (spec.md §6) round-trips with any
//! tool built against the original encoding. Unlike the teacher's
//! `Opcode::from_byte`, which reads a raw byte with `mem::transmute`, this
//! decodes through a checked `TryFrom` — an unknown opcode byte is a
//! runtime error (spec.md §7), not undefined behavior.
//!
//! `Pop` is not in the original encoding — it resolves spec.md §9's open
//! question about `SET_GLOBAL`/`SET_LOCAL`/expression-statements leaving a
//! value on the stack (see the generator's handling of `ExprStmt`). It
//! takes the first unused byte after the original set.

use std::convert::TryFrom;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Return        = 0x00,
    Call          = 0x01,
    Const         = 0x02,
    WriteOut      = 0x04,
    WriteErr      = 0x05,
    Flush         = 0x06,
    Add           = 0x07,
    Subtract      = 0x08,
    Multiply      = 0x09,
    Divide        = 0x0A,
    DefineGlobal  = 0x0B,
    GetGlobal     = 0x0C,
    SetGlobal     = 0x0D,
    GetLocal      = 0x0E,
    SetLocal      = 0x0F,
    Convert       = 0x10,
    Pop           = 0x11,
}

impl Opcode {
    pub fn to_byte(self) -> u8 { self as u8 }
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        Ok(match byte {
            0x00 => Opcode::Return,
            0x01 => Opcode::Call,
            0x02 => Opcode::Const,
            0x04 => Opcode::WriteOut,
            0x05 => Opcode::WriteErr,
            0x06 => Opcode::Flush,
            0x07 => Opcode::Add,
            0x08 => Opcode::Subtract,
            0x09 => Opcode::Multiply,
            0x0A => Opcode::Divide,
            0x0B => Opcode::DefineGlobal,
            0x0C => Opcode::GetGlobal,
            0x0D => Opcode::SetGlobal,
            0x0E => Opcode::GetLocal,
            0x0F => Opcode::SetLocal,
            0x10 => Opcode::Convert,
            0x11 => Opcode::Pop,
            other => return Err(other),
        })
    }
}
