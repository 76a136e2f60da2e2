//! A hand-written decoder for the WebAssembly binary module format: magic
//! and version, the thirteen section kinds, and a full instruction-stream
//! reader shared by function bodies, global initializers, and element/data
//! offset expressions.

mod cursor;
mod instruction;
mod leb128;
mod module;
mod section;
mod types;

pub use cursor::Cursor;
pub use instruction::{read_body, BlockType, InstrOp, Instruction, MemArg, MiscOpcode, Opcode, Operand};
pub use leb128::{read_sleb128_i32, read_sleb128_i64, read_uleb128_u32, read_uleb128_u64};
pub use module::Module;
pub use section::{
    Data, Element, Export, ExportKind, FunctionBody, Global, Import, ImportDesc, LocalGroup,
    NameEntry, NameSection, Section, SectionBody, SectionKind,
};
pub use types::{FuncType, GlobalType, Limits, MemType, NumType, RefType, TableType, ValType};

use core::fmt::Formatter;

pub const WASM_MAGIC: [u8; 4] = *b"\0asm";
pub const WASM_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    Truncated,
    Overlong,
    InvalidMagic,
    InvalidVersion,
    InvalidUtf8,
    InvalidSection(u8),
    UnsupportedOpPrefix(u8),
    MalformedInstruction(&'static str),
    AllocFailed,
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            DecodeError::Truncated => write!(f, "unexpected end of input"),
            DecodeError::Overlong => write!(f, "overlong LEB128 encoding"),
            DecodeError::InvalidMagic => write!(f, "not a wasm binary (bad magic)"),
            DecodeError::InvalidVersion => write!(f, "unsupported wasm version"),
            DecodeError::InvalidUtf8 => write!(f, "name is not valid utf-8"),
            DecodeError::InvalidSection(k) => write!(f, "unknown section kind {k}"),
            DecodeError::UnsupportedOpPrefix(b) => write!(f, "unsupported opcode prefix 0x{b:02x}"),
            DecodeError::MalformedInstruction(why) => write!(f, "malformed instruction: {why}"),
            DecodeError::AllocFailed => write!(f, "module allocator exhausted"),
        }
    }
}
