use alloc::vec::Vec;

use crate::alloc_rt::AllocatorHandle;

use super::section::make_section;
use super::{Cursor, DecodeError, Section, WASM_MAGIC, WASM_VERSION};

/// A fully decoded WebAssembly binary: magic, version, and the ordered
/// section list exactly as they appeared in the source buffer.
#[derive(Debug, Clone)]
pub struct Module {
    pub magic: [u8; 4],
    pub version: u32,
    pub sections: Vec<Section>,
}

impl Module {
    /// Reads the magic + version header, then loops `make_section` until
    /// the cursor is exhausted. `allocator` is the module's own allocator
    /// (the same currency the allocator framework and value system share);
    /// every section's payload is copied into it before decoding so the
    /// per-kind readers never decode straight out of the caller's buffer.
    pub fn decode(bytes: &[u8], allocator: AllocatorHandle) -> Result<Self, DecodeError> {
        let mut cur = Cursor::new(bytes);
        let magic: [u8; 4] = cur.read_bytes(4)?.try_into().unwrap();
        if magic != WASM_MAGIC {
            return Err(DecodeError::InvalidMagic);
        }
        let version = cur.read_u32_le()?;
        if version != WASM_VERSION {
            return Err(DecodeError::InvalidVersion);
        }

        let mut sections = Vec::new();
        while !cur.is_empty() {
            sections.push(make_section(&mut cur, &allocator)?);
        }

        Ok(Module {
            magic,
            version,
            sections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc_rt::Allocator;

    #[test]
    fn empty_module_decodes() {
        let bytes = [0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];
        let module = Module::decode(&bytes, Allocator::new_system()).unwrap();
        assert_eq!(module.version, 1);
        assert!(module.sections.is_empty());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let bytes = [0x01, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];
        assert!(matches!(
            Module::decode(&bytes, Allocator::new_system()),
            Err(DecodeError::InvalidMagic)
        ));
    }

    #[test]
    fn type_section_round_trips_a_signature() {
        // magic + version, then a type section: 1 func type, (i32,i32)->i32
        let bytes: &[u8] = &[
            0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00, // header
            0x01, 0x07, // section 1 (type), size 7
            0x01, // 1 type
            0x60, 0x02, 0x7f, 0x7f, 0x01, 0x7f, // (i32,i32)->i32
        ];
        let module = Module::decode(bytes, Allocator::new_system()).unwrap();
        assert_eq!(module.sections.len(), 1);
        match &module.sections[0].body {
            crate::wasm::SectionBody::Type(types) => {
                assert_eq!(types.len(), 1);
                assert_eq!(types[0].params.len(), 2);
                assert_eq!(types[0].results.len(), 1);
            }
            _ => panic!("expected a type section"),
        }
    }

    #[test]
    fn allocator_balance_returns_to_zero_after_decode() {
        let bytes: &[u8] = &[
            0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00, // header
            0x01, 0x07, // section 1 (type), size 7
            0x01, // 1 type
            0x60, 0x02, 0x7f, 0x7f, 0x01, 0x7f, // (i32,i32)->i32
        ];
        let allocator = Allocator::new_system();
        Module::decode(bytes, allocator.clone()).unwrap();
        assert_eq!(allocator.lock().total_allocated(), 0);
    }
}
