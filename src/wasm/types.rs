use alloc::vec::Vec;

use super::{Cursor, DecodeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumType {
    I32,
    I64,
    F32,
    F64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefType {
    FuncRef,
    ExternRef,
    ExnRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValType {
    Num(NumType),
    Ref(RefType),
}

impl ValType {
    pub fn decode(cur: &mut Cursor) -> Result<Self, DecodeError> {
        match cur.read_u8()? {
            0x7f => Ok(ValType::Num(NumType::I32)),
            0x7e => Ok(ValType::Num(NumType::I64)),
            0x7d => Ok(ValType::Num(NumType::F32)),
            0x7c => Ok(ValType::Num(NumType::F64)),
            0x70 => Ok(ValType::Ref(RefType::FuncRef)),
            0x6f => Ok(ValType::Ref(RefType::ExternRef)),
            0x69 => Ok(ValType::Ref(RefType::ExnRef)),
            _ => Err(DecodeError::MalformedInstruction("unknown value type")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncType {
    pub params: Vec<ValType>,
    pub results: Vec<ValType>,
}

impl FuncType {
    pub fn decode(cur: &mut Cursor) -> Result<Self, DecodeError> {
        let form = cur.read_u8()?;
        if form != 0x60 {
            return Err(DecodeError::MalformedInstruction("function type must start with 0x60"));
        }
        let params = decode_val_vec(cur)?;
        let results = decode_val_vec(cur)?;
        Ok(Self { params, results })
    }
}

fn decode_val_vec(cur: &mut Cursor) -> Result<Vec<ValType>, DecodeError> {
    let count = super::read_uleb128_u32(cur)? as usize;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(ValType::decode(cur)?);
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub min: u32,
    pub max: Option<u32>,
}

impl Limits {
    pub fn decode(cur: &mut Cursor) -> Result<Self, DecodeError> {
        let flags = cur.read_u8()?;
        let min = super::read_uleb128_u32(cur)?;
        let max = if flags & 0x01 != 0 {
            Some(super::read_uleb128_u32(cur)?)
        } else {
            None
        };
        Ok(Self { min, max })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableType {
    pub element: RefType,
    pub limits: Limits,
}

impl TableType {
    pub fn decode(cur: &mut Cursor) -> Result<Self, DecodeError> {
        let element = match ValType::decode(cur)? {
            ValType::Ref(r) => r,
            ValType::Num(_) => return Err(DecodeError::MalformedInstruction("table element must be a reference type")),
        };
        let limits = Limits::decode(cur)?;
        Ok(Self { element, limits })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemType(pub Limits);

impl MemType {
    pub fn decode(cur: &mut Cursor) -> Result<Self, DecodeError> {
        Ok(Self(Limits::decode(cur)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalType {
    pub val_type: ValType,
    pub mutable: bool,
}

impl GlobalType {
    pub fn decode(cur: &mut Cursor) -> Result<Self, DecodeError> {
        let val_type = ValType::decode(cur)?;
        let mutable = cur.read_u8()? == 0x01;
        Ok(Self { val_type, mutable })
    }
}
