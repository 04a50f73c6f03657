//! RV64I instruction set simulator
//!
//! This crate simulates a single RV64I hart with the machine-mode (and
//! partial user-mode) privileged architecture: trap delivery, the
//! machine-mode control and status registers, and six asynchronous
//! interrupts. Programs are loaded from a record-based hex image into a
//! sparse byte-addressable memory and executed one instruction at a time.
//!
//! The crate is organised around three subsystems:
//!
//! * [`memory`] - a sparse, block-granular doubleword store,
//! * [`decode`] - a pure classifier from 32-bit words to decode records,
//! * [`hart`] - the architectural state and the fetch-decode-execute loop,
//!   including trap delivery and the CSR file.
//!
//! The `rv64sim` binary wraps the library in a line-oriented command
//! interpreter.

pub mod decode;
pub mod encode;
pub mod hart;
pub mod image;
pub mod instr;
pub mod memory;
pub mod opcodes;
pub mod utils;
