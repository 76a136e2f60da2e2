use alloc::string::String;
use alloc::vec::Vec;

use crate::alloc_rt::AllocatorHandle;

use super::instruction::{read_body, Instruction};
use super::{Cursor, DecodeError, FuncType, GlobalType, Limits, MemType, TableType, ValType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Custom,
    Type,
    Import,
    Function,
    Table,
    Memory,
    Global,
    Export,
    Start,
    Element,
    Code,
    Data,
    DataCount,
}

impl SectionKind {
    fn from_byte(b: u8) -> Result<Self, DecodeError> {
        Ok(match b {
            0 => SectionKind::Custom,
            1 => SectionKind::Type,
            2 => SectionKind::Import,
            3 => SectionKind::Function,
            4 => SectionKind::Table,
            5 => SectionKind::Memory,
            6 => SectionKind::Global,
            7 => SectionKind::Export,
            8 => SectionKind::Start,
            9 => SectionKind::Element,
            10 => SectionKind::Code,
            11 => SectionKind::Data,
            12 => SectionKind::DataCount,
            other => return Err(DecodeError::InvalidSection(other)),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportKind {
    Func,
    Table,
    Memory,
    Global,
}

impl ExportKind {
    fn decode(cur: &mut Cursor) -> Result<Self, DecodeError> {
        Ok(match cur.read_u8()? {
            0x00 => ExportKind::Func,
            0x01 => ExportKind::Table,
            0x02 => ExportKind::Memory,
            0x03 => ExportKind::Global,
            other => return Err(DecodeError::InvalidSection(other)),
        })
    }
}

#[derive(Debug, Clone)]
pub enum ImportDesc {
    Func(u32),
    Table(TableType),
    Memory(MemType),
    Global(GlobalType),
}

#[derive(Debug, Clone)]
pub struct Import {
    pub module: String,
    pub field: String,
    pub desc: ImportDesc,
}

#[derive(Debug, Clone)]
pub struct Export {
    pub field: String,
    pub kind: ExportKind,
    pub index: u32,
}

#[derive(Debug, Clone)]
pub struct Global {
    pub ty: GlobalType,
    pub init: Vec<Instruction>,
}

#[derive(Debug, Clone)]
pub struct LocalGroup {
    pub count: u32,
    pub ty: ValType,
}

#[derive(Debug, Clone)]
pub struct FunctionBody {
    pub locals: Vec<LocalGroup>,
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone)]
pub struct Element {
    pub table_index: u32,
    pub offset: Vec<Instruction>,
    pub func_indices: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct Data {
    pub memory_index: u32,
    pub offset: Vec<Instruction>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum NameEntry {
    Module(String),
    Function(Vec<(u32, String)>),
    Local(Vec<(u32, Vec<(u32, String)>)>),
}

#[derive(Debug, Clone, Default)]
pub struct NameSection {
    pub entries: Vec<NameEntry>,
}

#[derive(Debug, Clone)]
pub enum SectionBody {
    Custom { name: String, payload: Vec<u8> },
    Type(Vec<FuncType>),
    Import(Vec<Import>),
    Function(Vec<u32>),
    Table(Vec<TableType>),
    Memory(Vec<MemType>),
    Global(Vec<Global>),
    Export(Vec<Export>),
    Start(u32),
    Element(Vec<Element>),
    Code(Vec<FunctionBody>),
    Data(Vec<Data>),
    DataCount(u32),
    Name(NameSection),
}

#[derive(Debug, Clone)]
pub struct Section {
    pub kind: SectionKind,
    pub size: u32,
    pub name: Option<String>,
    pub body: SectionBody,
}

fn decode_vec<T>(cur: &mut Cursor, mut f: impl FnMut(&mut Cursor) -> Result<T, DecodeError>) -> Result<Vec<T>, DecodeError> {
    let count = super::read_uleb128_u32(cur)? as usize;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(f(cur)?);
    }
    Ok(out)
}

fn decode_import(cur: &mut Cursor) -> Result<Import, DecodeError> {
    let module = cur.read_name()?.into();
    let field = cur.read_name()?.into();
    let desc = match cur.read_u8()? {
        0x00 => ImportDesc::Func(super::read_uleb128_u32(cur)?),
        0x01 => ImportDesc::Table(TableType::decode(cur)?),
        0x02 => ImportDesc::Memory(MemType::decode(cur)?),
        0x03 => ImportDesc::Global(GlobalType::decode(cur)?),
        other => return Err(DecodeError::InvalidSection(other)),
    };
    Ok(Import { module, field, desc })
}

fn decode_export(cur: &mut Cursor) -> Result<Export, DecodeError> {
    let field = cur.read_name()?.into();
    let kind = ExportKind::decode(cur)?;
    let index = super::read_uleb128_u32(cur)?;
    Ok(Export { field, kind, index })
}

fn decode_global(cur: &mut Cursor) -> Result<Global, DecodeError> {
    let ty = GlobalType::decode(cur)?;
    let init = read_body(cur)?;
    Ok(Global { ty, init })
}

fn decode_function_body(cur: &mut Cursor) -> Result<FunctionBody, DecodeError> {
    let body_size = super::read_uleb128_u32(cur)? as usize;
    let body_bytes = cur.read_bytes(body_size)?;
    let mut body_cur = Cursor::new(body_bytes);
    let group_count = super::read_uleb128_u32(&mut body_cur)? as usize;
    let mut locals = Vec::with_capacity(group_count);
    for _ in 0..group_count {
        let count = super::read_uleb128_u32(&mut body_cur)?;
        let ty = ValType::decode(&mut body_cur)?;
        locals.push(LocalGroup { count, ty });
    }
    let instructions = read_body(&mut body_cur)?;
    Ok(FunctionBody { locals, instructions })
}

fn decode_element(cur: &mut Cursor) -> Result<Element, DecodeError> {
    let table_index = super::read_uleb128_u32(cur)?;
    let offset = read_body(cur)?;
    let func_indices = decode_vec(cur, |c| super::read_uleb128_u32(c))?;
    Ok(Element {
        table_index,
        offset,
        func_indices,
    })
}

fn decode_data(cur: &mut Cursor) -> Result<Data, DecodeError> {
    let memory_index = super::read_uleb128_u32(cur)?;
    let offset = read_body(cur)?;
    let len = super::read_uleb128_u32(cur)? as usize;
    let bytes = cur.read_bytes(len)?.to_vec();
    Ok(Data {
        memory_index,
        offset,
        bytes,
    })
}

fn decode_name_section(cur: &mut Cursor) -> Result<NameSection, DecodeError> {
    let mut entries = Vec::new();
    while !cur.is_empty() {
        let subsection_id = cur.read_u8()?;
        let size = super::read_uleb128_u32(cur)? as usize;
        let bytes = cur.read_bytes(size)?;
        let mut sub = Cursor::new(bytes);
        match subsection_id {
            0 => entries.push(NameEntry::Module(sub.read_name()?.into())),
            1 => {
                let pairs = decode_vec(&mut sub, |c| {
                    let idx = super::read_uleb128_u32(c)?;
                    let name = c.read_name()?.into();
                    Ok((idx, name))
                })?;
                entries.push(NameEntry::Function(pairs));
            }
            2 => {
                let locals = decode_vec(&mut sub, |c| {
                    let func_idx = super::read_uleb128_u32(c)?;
                    let names = decode_vec(c, |c2| {
                        let idx = super::read_uleb128_u32(c2)?;
                        let name = c2.read_name()?.into();
                        Ok((idx, name))
                    })?;
                    Ok((func_idx, names))
                })?;
                entries.push(NameEntry::Local(locals));
            }
            _ => {}
        }
    }
    Ok(NameSection { entries })
}

/// Reads one section header and its kind-specific body, matching
/// `<kind:u8><size:uleb128><payload>`. The payload is copied into a scratch
/// buffer carved from `allocator` before any per-kind reader touches it, so
/// every section body is decoded out of the module's own allocator rather
/// than the caller's input slice; the scratch buffer is released again
/// once the kind-specific body has been fully decoded into owned types.
pub fn make_section(cur: &mut Cursor, allocator: &AllocatorHandle) -> Result<Section, DecodeError> {
    let kind_byte = cur.read_u8()?;
    let size = super::read_uleb128_u32(cur)?;
    let payload = cur.read_bytes(size as usize)?;

    let alloc_len = payload.len().max(1);
    let ptr = allocator
        .lock()
        .allocate(alloc_len, 1)
        .map_err(|_| DecodeError::AllocFailed)?;
    // SAFETY: `ptr` was just allocated for exactly `alloc_len` bytes and is
    // not aliased anywhere else; it's deallocated below before this
    // function returns, after every decoded value below has made its own
    // owned copy of whatever it needed from the buffer.
    unsafe {
        core::ptr::copy_nonoverlapping(payload.as_ptr(), ptr.as_ptr(), payload.len());
    }
    let owned_payload = unsafe { core::slice::from_raw_parts(ptr.as_ptr(), payload.len()) };
    let result = make_section_body(kind_byte, size, owned_payload);
    unsafe {
        allocator.lock().deallocate(ptr, alloc_len, 1);
    }
    result
}

fn make_section_body(kind_byte: u8, size: u32, payload: &[u8]) -> Result<Section, DecodeError> {
    let mut body_cur = Cursor::new(payload);

    if kind_byte == 0 {
        let name = String::from(body_cur.read_name()?);
        let body = if name == "name" {
            SectionBody::Name(decode_name_section(&mut body_cur)?)
        } else {
            SectionBody::Custom {
                name: name.clone(),
                payload: body_cur.read_bytes(body_cur.remaining())?.to_vec(),
            }
        };
        return Ok(Section {
            kind: SectionKind::Custom,
            size,
            name: Some(name),
            body,
        });
    }

    let kind = SectionKind::from_byte(kind_byte)?;
    let body = match kind {
        SectionKind::Custom => unreachable!(),
        SectionKind::Type => SectionBody::Type(decode_vec(&mut body_cur, FuncType::decode)?),
        SectionKind::Import => SectionBody::Import(decode_vec(&mut body_cur, decode_import)?),
        SectionKind::Function => SectionBody::Function(decode_vec(&mut body_cur, |c| super::read_uleb128_u32(c))?),
        SectionKind::Table => SectionBody::Table(decode_vec(&mut body_cur, TableType::decode)?),
        SectionKind::Memory => SectionBody::Memory(decode_vec(&mut body_cur, MemType::decode)?),
        SectionKind::Global => SectionBody::Global(decode_vec(&mut body_cur, decode_global)?),
        SectionKind::Export => SectionBody::Export(decode_vec(&mut body_cur, decode_export)?),
        SectionKind::Start => SectionBody::Start(super::read_uleb128_u32(&mut body_cur)?),
        SectionKind::Element => SectionBody::Element(decode_vec(&mut body_cur, decode_element)?),
        SectionKind::Code => SectionBody::Code(decode_vec(&mut body_cur, decode_function_body)?),
        SectionKind::Data => SectionBody::Data(decode_vec(&mut body_cur, decode_data)?),
        SectionKind::DataCount => SectionBody::DataCount(super::read_uleb128_u32(&mut body_cur)?),
    };

    Ok(Section {
        kind,
        size,
        name: None,
        body,
    })
}
