//! Read-operation sequencing: translates the lifecycle callbacks fired for
//! a queued read into the command plan written to the wire at each point.

use thiserror::Error;

use crate::cartridge::{CartHeader, MemoryController, Platform};
use crate::protocol::{
    Command, BANK_WINDOW, COMPLETION_PAUSE, PAGE_SIZE, SETTLE_DELAY,
};

/// What a read operation is fetching. Built once by the caller, immutable,
/// consumed read-only at every callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadContext {
    /// The header region only.
    Header,
    /// One 16 KiB bank. Carries the already-read header so the bank-switch
    /// procedure can pick its write policy.
    Bank { bank: u16, header: CartHeader },
    /// The whole image, streamed continuously with no per-page pulsing.
    Cartridge { header: CartHeader },
}

/// Lifecycle position of an operation. Callbacks arriving in any other
/// order are a shape mismatch and cancel the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Ready,
    Primed,
    Streaming,
    Complete,
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Ready => "ready",
            Phase::Primed => "primed",
            Phase::Streaming => "streaming",
            Phase::Complete => "complete",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SequenceError {
    #[error("{callback} invoked while {phase}")]
    OutOfOrder {
        callback: &'static str,
        phase: &'static str,
    },
}

/// State machine for one submitted read. The queue worker drives the four
/// callbacks in order and transmits whatever plan each one returns.
#[derive(Debug)]
pub struct ReadOperation {
    platform: Platform,
    context: ReadContext,
    phase: Phase,
}

impl ReadOperation {
    pub fn new(platform: Platform, context: ReadContext) -> Self {
        Self {
            platform,
            context,
            phase: Phase::Ready,
        }
    }

    pub fn context(&self) -> &ReadContext {
        &self.context
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Bytes this operation is expected to produce.
    pub fn total_len(&self) -> usize {
        match &self.context {
            ReadContext::Header => self.platform.header_range().len(),
            ReadContext::Bank { .. } => BANK_WINDOW,
            ReadContext::Cartridge { header } => header.rom_len(),
        }
    }

    fn expect(&self, callback: &'static str, phase: Phase) -> Result<(), SequenceError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(SequenceError::OutOfOrder {
                callback,
                phase: self.phase.name(),
            })
        }
    }

    /// Addressing that must land on the wire before streaming starts.
    pub fn will_begin(&mut self) -> Result<Vec<Command>, SequenceError> {
        self.expect("will_begin", Phase::Ready)?;
        self.phase = Phase::Primed;

        let plan = match &self.context {
            ReadContext::Header => {
                vec![Command::set_address(self.platform.header_range().start)]
            }
            ReadContext::Bank { bank, header } => {
                let mut plan = vec![Command::Stop];
                plan.extend(bank_switch(self.platform, *bank, header));
                // Bank 1 maps at the window origin; higher banks through the
                // switchable window.
                let base = if *bank <= 1 { 0x0000 } else { 0x4000 };
                plan.push(Command::set_address(base));
                plan
            }
            ReadContext::Cartridge { .. } => Vec::new(),
        };
        Ok(plan)
    }

    /// The streaming trigger itself.
    pub fn did_begin(&mut self) -> Result<Vec<Command>, SequenceError> {
        self.expect("did_begin", Phase::Primed)?;
        self.phase = Phase::Streaming;

        let plan = match &self.context {
            ReadContext::Header | ReadContext::Bank { .. } => {
                vec![Command::Start(self.platform)]
            }
            ReadContext::Cartridge { .. } => Vec::new(),
        };
        Ok(plan)
    }

    /// Page pulsing. The device stalls at every 64-byte boundary until it
    /// sees a CONTINUE; whole-cartridge streaming never pulses.
    pub fn did_progress(&mut self, bytes_read: usize) -> Result<Vec<Command>, SequenceError> {
        self.expect("did_progress", Phase::Streaming)?;

        let plan = match &self.context {
            ReadContext::Cartridge { .. } => Vec::new(),
            ReadContext::Header | ReadContext::Bank { .. } => {
                if bytes_read != 0 && bytes_read % PAGE_SIZE == 0 {
                    vec![Command::Continue]
                } else {
                    Vec::new()
                }
            }
        };
        Ok(plan)
    }

    /// Teardown. Only a header read halts the stream here; without the
    /// 75 ms pause the next operation addresses stale device state.
    pub fn did_complete(&mut self) -> Result<Vec<Command>, SequenceError> {
        self.expect("did_complete", Phase::Streaming)?;
        self.phase = Phase::Complete;

        let plan = match &self.context {
            ReadContext::Header => vec![Command::Stop, Command::Sleep(COMPLETION_PAUSE)],
            ReadContext::Bank { .. } | ReadContext::Cartridge { .. } => Vec::new(),
        };
        Ok(plan)
    }
}

/// One register write: select the register, let the microcontroller latch
/// it, then write the value.
fn register_write(register: u32, value: u32) -> [Command; 3] {
    [
        Command::bank_register(register),
        Command::Sleep(SETTLE_DELAY),
        Command::bank_value(value),
    ]
}

/// Bank-switch procedure for the Game Boy Classic family. Any other
/// platform reaching this is a configuration error.
fn bank_switch(platform: Platform, bank: u16, header: &CartHeader) -> Vec<Command> {
    match platform {
        Platform::GameboyClassic => {}
        Platform::GameboyAdvance => {
            unimplemented!("no bank-switch strategy for the Game Boy Advance")
        }
    }

    let bank = bank as u32;
    let mut plan = Vec::new();
    match header.controller {
        // MBC1 in RAM-banking mode: mode select, then the bank number split
        // across the high and low registers.
        MemoryController::Mbc1 => {
            plan.extend(register_write(0x6000, 0));
            plan.extend(register_write(0x4000, bank >> 5));
            plan.extend(register_write(0x2000, bank & 0x1f));
        }
        // Everything else takes the bank number directly, with the ninth
        // bit in its own register.
        _ => {
            plan.extend(register_write(0x2100, bank));
            if bank >= 0x100 {
                plan.extend(register_write(0x3000, 1));
            }
        }
    }
    plan
}
