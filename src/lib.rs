#![cfg_attr(not(feature = "std"), no_std)]
#![allow(dead_code)]
#![warn(unused_crate_dependencies)]

extern crate alloc;
extern crate core;

pub mod alloc_rt;
pub mod error;
pub mod intern;
pub mod lisp_eval;
pub mod value;
pub mod vm;
pub mod wasm;

pub use alloc_rt::*;
pub use error::Error;
pub use intern::InternPool;
pub use lisp_eval::Printer;
