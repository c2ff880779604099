use std::fmt;
use std::ops::Range;

use log::debug;
use thiserror::Error;

/// Cartridge families the reader hardware has slots for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    GameboyClassic,
    GameboyAdvance,
}

impl Platform {
    /// Memory range of the cartridge header, as addressed on the device.
    pub fn header_range(&self) -> Range<u32> {
        match self {
            Platform::GameboyClassic => 0x100..0x150,
            Platform::GameboyAdvance => {
                unimplemented!("the Game Boy Advance read path is not implemented")
            }
        }
    }
}

/// Bank controller reported by the header's cartridge-type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryController {
    None,
    Mbc1,
    Mbc2,
    Mbc3,
    Mbc5,
    Unknown(u8),
}

impl fmt::Display for MemoryController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryController::None => write!(f, "ROM only"),
            MemoryController::Mbc1 => write!(f, "MBC1"),
            MemoryController::Mbc2 => write!(f, "MBC2"),
            MemoryController::Mbc3 => write!(f, "MBC3"),
            MemoryController::Mbc5 => write!(f, "MBC5"),
            MemoryController::Unknown(code) => write!(f, "unknown (0x{:02x})", code),
        }
    }
}

#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("header region is {got} bytes, expected {expected}")]
    Truncated { got: usize, expected: usize },

    #[error("ROM size code 0x{0:02x} is out of range")]
    RomSize(u8),
}

/// Parsed cartridge header, the snapshot the bank-switch procedure consults.
///
/// Offsets below are relative to the header region (device address 0x100),
/// not to the start of the ROM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartHeader {
    pub title: String,
    pub controller: MemoryController,
    pub rom_banks: u16,
}

const TITLE: Range<usize> = 0x34..0x44;
const CARTRIDGE_TYPE: usize = 0x47;
const ROM_SIZE: usize = 0x48;
const REGION_LEN: usize = 0x50;

impl CartHeader {
    /// Parse the 0x50-byte header region of a Game Boy Classic cartridge.
    pub fn parse(bytes: &[u8]) -> Result<Self, HeaderError> {
        if bytes.len() < REGION_LEN {
            return Err(HeaderError::Truncated {
                got: bytes.len(),
                expected: REGION_LEN,
            });
        }

        let title = bytes[TITLE]
            .iter()
            .take_while(|&&b| b != 0)
            .map(|&b| b as char)
            .collect::<String>()
            .trim_end()
            .to_string();

        let controller = match bytes[CARTRIDGE_TYPE] {
            0x00 | 0x08 | 0x09 => MemoryController::None,
            0x01..=0x03 => MemoryController::Mbc1,
            0x05 | 0x06 => MemoryController::Mbc2,
            0x0f..=0x13 => MemoryController::Mbc3,
            0x19..=0x1e => MemoryController::Mbc5,
            code => MemoryController::Unknown(code),
        };

        let size_code = bytes[ROM_SIZE];
        if size_code > 0x08 {
            return Err(HeaderError::RomSize(size_code));
        }
        let rom_banks = 2u16 << size_code;

        debug!(
            "header: title={:?} controller={} banks={}",
            title, controller, rom_banks
        );

        Ok(Self {
            title,
            controller,
            rom_banks,
        })
    }

    /// Total image size in bytes.
    pub fn rom_len(&self) -> usize {
        self.rom_banks as usize * crate::protocol::BANK_WINDOW
    }
}
