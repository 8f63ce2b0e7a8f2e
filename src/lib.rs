//! LS-8 virtual machine: decoder, register file, dispatch table and the
//! fetch-decode-execute loop, plus the text loader used by the `ls8` binary.

pub mod decode;
pub mod dispatch;
pub mod loader;
pub mod registers;
pub mod vm;

pub use decode::{decode, Decoded, Opcode};
pub use loader::{load_file, parse_program, LoadError, MemoryImage};
pub use registers::{Flags, RegisterFile};
pub use vm::{Machine, MachineConfig, State, VmError};
