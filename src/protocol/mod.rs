use std::time::Duration;

use crate::cartridge::Platform;

/// Begin streaming bytes from the current address (Game Boy Classic).
pub const CMD_START_CLASSIC: u8 = b'R';
/// Halt streaming.
pub const CMD_STOP: u8 = b'0';
/// Advance the device's read cursor past a page boundary.
pub const CMD_CONTINUE: u8 = b'1';

/// Opcode for setting the active read address.
pub const OP_SET_ADDRESS: &str = "A";
/// Opcode for bank-controller register writes.
pub const OP_SET_BANK: &str = "B";

/// The device drains its buffer in fixed 64-byte pages and stalls at each
/// boundary until it sees a CONTINUE.
pub const PAGE_SIZE: usize = 64;

/// Size of the switchable ROM window.
pub const BANK_WINDOW: usize = 0x4000;

/// Settle time between a bank register select and its value write. The
/// microcontroller silently latches the wrong bank outside roughly
/// 150-250us; do not change this.
pub const SETTLE_DELAY: Duration = Duration::from_micros(150);

/// Pause after stopping a header read. Chaining the next operation sooner
/// leaves the device cursor in a stale state.
pub const COMPLETION_PAUSE: Duration = Duration::from_micros(75_000);

/// Numeral base used when rendering an address on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Radix {
    Hex,
    Dec,
}

impl Radix {
    pub fn render(&self, value: u32) -> String {
        match self {
            Radix::Hex => format!("{:X}", value),
            Radix::Dec => format!("{}", value),
        }
    }
}

/// A single protocol command. Every transmitted variant encodes to a byte
/// sequence fully determined by its fields; `Sleep` is the one variant that
/// is never transmitted and instead blocks the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start(Platform),
    Stop,
    Continue,
    Address {
        opcode: &'static str,
        radix: Radix,
        address: u32,
    },
    Sleep(Duration),
}

/// What transmitting a command amounts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Bytes(Vec<u8>),
    Wait(Duration),
}

impl Command {
    /// Encode to the exact bytes the device expects, or to a blocking delay.
    pub fn encode(&self) -> Payload {
        match self {
            Command::Start(Platform::GameboyClassic) => Payload::Bytes(vec![CMD_START_CLASSIC]),
            Command::Start(Platform::GameboyAdvance) => {
                unimplemented!("no start command for the Game Boy Advance read path")
            }
            Command::Stop => Payload::Bytes(vec![CMD_STOP]),
            Command::Continue => Payload::Bytes(vec![CMD_CONTINUE]),
            Command::Address {
                opcode,
                radix,
                address,
            } => {
                let mut bytes = Vec::from(opcode.as_bytes());
                bytes.extend(radix.render(*address).into_bytes());
                bytes.push(0);
                Payload::Bytes(bytes)
            }
            Command::Sleep(duration) => Payload::Wait(*duration),
        }
    }

    /// Address write with the `A` opcode, hex radix.
    pub fn set_address(address: u32) -> Self {
        Command::Address {
            opcode: OP_SET_ADDRESS,
            radix: Radix::Hex,
            address,
        }
    }

    /// Bank register select with the `B` opcode, hex radix.
    pub fn bank_register(register: u32) -> Self {
        Command::Address {
            opcode: OP_SET_BANK,
            radix: Radix::Hex,
            address: register,
        }
    }

    /// Bank register value with the `B` opcode, decimal radix.
    pub fn bank_value(value: u32) -> Self {
        Command::Address {
            opcode: OP_SET_BANK,
            radix: Radix::Dec,
            address: value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(cmd: Command) -> Vec<u8> {
        match cmd.encode() {
            Payload::Bytes(b) => b,
            Payload::Wait(d) => panic!("expected bytes, got delay {:?}", d),
        }
    }

    #[test]
    fn test_fixed_commands() {
        assert_eq!(bytes(Command::Start(Platform::GameboyClassic)), b"R");
        assert_eq!(bytes(Command::Stop), b"0");
        assert_eq!(bytes(Command::Continue), b"1");
    }

    #[test]
    #[should_panic]
    fn test_start_advance_is_fatal() {
        // The Advance read path has no start byte; encoding one is a
        // configuration error, not a recoverable fault.
        Command::Start(Platform::GameboyAdvance).encode();
    }

    #[test]
    fn test_address_hex_uppercase_nul_terminated() {
        // Header read for Game Boy Classic:
        // tx [41, 31, 30, 30, 0] = "A100\0"
        assert_eq!(bytes(Command::set_address(0x100)), b"A100\0");
        // Banked window base: "A4000\0"
        assert_eq!(bytes(Command::set_address(0x4000)), b"A4000\0");
        // Hex digits above 9 must be uppercase: "AABCD\0"
        assert_eq!(bytes(Command::set_address(0xABCD)), b"AABCD\0");
    }

    #[test]
    fn test_address_no_zero_padding() {
        // Zero renders as a single digit, never padded to the register width.
        assert_eq!(bytes(Command::set_address(0)), b"A0\0");
        assert_eq!(bytes(Command::bank_value(0)), b"B0\0");
    }

    #[test]
    fn test_bank_register_hex_value_decimal() {
        // MBC5 bank select: register in hex, value in decimal.
        // tx "B2100\0" then "B33\0" for bank 33 (0x21).
        assert_eq!(bytes(Command::bank_register(0x2100)), b"B2100\0");
        assert_eq!(bytes(Command::bank_value(33)), b"B33\0");
        // Decimal rendering must not fall back to hex: 0x150 = 336.
        assert_eq!(bytes(Command::bank_value(0x150)), b"B336\0");
    }

    #[test]
    fn test_sleep_is_a_delay_not_bytes() {
        assert_eq!(
            Command::Sleep(SETTLE_DELAY).encode(),
            Payload::Wait(Duration::from_micros(150))
        );
    }

    /// Minimal mock-device parser: splits `<opcode><numeral>\0` back into
    /// its parts given the radix the command was rendered in.
    fn parse_address(wire: &[u8], radix: Radix) -> (String, u32) {
        assert_eq!(*wire.last().unwrap(), 0, "missing NUL terminator");
        let body = std::str::from_utf8(&wire[..wire.len() - 1]).unwrap();
        let (opcode, numeral) = body.split_at(1);
        let base = match radix {
            Radix::Hex => 16,
            Radix::Dec => 10,
        };
        (
            opcode.to_string(),
            u32::from_str_radix(numeral, base).unwrap(),
        )
    }

    #[test]
    fn test_address_round_trip() {
        for address in [0u32, 1, 0x21, 0x100, 0x2100, 0x4000, 0xFFFF] {
            let (opcode, parsed) = parse_address(&bytes(Command::set_address(address)), Radix::Hex);
            assert_eq!(opcode, OP_SET_ADDRESS);
            assert_eq!(parsed, address);

            let (opcode, parsed) = parse_address(&bytes(Command::bank_value(address)), Radix::Dec);
            assert_eq!(opcode, OP_SET_BANK);
            assert_eq!(parsed, address);
        }
    }
}
