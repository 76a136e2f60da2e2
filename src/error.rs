use core::fmt::Formatter;

use crate::alloc_rt::AllocError;
use crate::vm::VmFault;
use crate::wasm::DecodeError;

/// Top-level error joining every subsystem's failure cases, mirroring the
/// way `RwasmError` folds `TrapCode` into one crate-wide enum.
#[derive(Debug)]
pub enum Error {
    Alloc(AllocError),
    Decode(DecodeError),
    Vm(VmFault),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Alloc(err) => write!(f, "allocator: {err}"),
            Error::Decode(err) => write!(f, "decode: {err}"),
            Error::Vm(err) => write!(f, "vm: {err}"),
        }
    }
}

impl From<AllocError> for Error {
    fn from(err: AllocError) -> Self {
        Error::Alloc(err)
    }
}

impl From<DecodeError> for Error {
    fn from(err: DecodeError) -> Self {
        Error::Decode(err)
    }
}

impl From<VmFault> for Error {
    fn from(err: VmFault) -> Self {
        Error::Vm(err)
    }
}
