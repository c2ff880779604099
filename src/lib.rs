//! # gbcart_rs
//!
//! Driver for a USB-serial cartridge reader. The device speaks a printable
//! ASCII command protocol; the host sets an address, triggers a streaming
//! read, and nudges the device's internal cursor forward one 64-byte page
//! at a time.
//!
//! ## Wire Format
//!
//! | Bytes            | Name     | Meaning |
//! |------------------|----------|---------|
//! | `R`              | START    | begin streaming from the current address (Game Boy Classic) |
//! | `0`              | STOP     | halt streaming |
//! | `1`              | CONTINUE | advance past a 64-byte page boundary |
//! | `A<hex>\0`       | ADDRESS  | set the active read address |
//! | `B<hex>\0`       | BANK     | select a bank register; followed by `B<dec>\0` with the value |
//!
//! Numerals are uppercase, unpadded, in the radix each command calls for.
//! Bank register writes need a 150 microsecond settle between the register
//! select and the value write; the delay is a hardware contract, not a
//! tunable.

pub mod cartridge;
pub mod controller;
pub mod error;
pub mod protocol;
pub mod sequencer;
pub mod transport;

pub use cartridge::{CartHeader, MemoryController, Platform};
pub use controller::{ReadHandle, Reader};
pub use error::Error;
pub use protocol::{Command, Payload, Radix};
pub use sequencer::{ReadContext, ReadOperation};
pub use transport::Transport;
