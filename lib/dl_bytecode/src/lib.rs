//! Dalvik bytecode data structures: the decoded instruction stream, method
//! code and constant pool consumed by the `dexlift` lifter, together with a
//! binary decoder, a code units encoder and a textual assembly front end.

mod addr;
mod assembly;
mod hexlify;
mod parsers;
mod writers;

pub mod code;
pub mod errors;
pub mod formats;
pub mod instrs;
pub mod opcodes;
pub mod pool;
pub mod registers;
pub mod types;

pub use crate::addr::Addr;
pub use crate::assembly::{parse_assembly, Assembly};
pub use crate::parsers::decode_instructions as decode;
pub use crate::writers::{encode_units, Operands};
