//! Instruction-level interpreter for the SCU DSP.
//!
//! The DSP is a 32-bit microprogrammable signal processor embedded in the
//! Saturn's System Control Unit: a 256-word program RAM, four 64-word data
//! RAM banks, a single-cycle multiplier and a 48-bit ALU, with up to three
//! bus micro-operations running in parallel with the ALU every cycle.
//!
//! This crate is bus-free. The DMA sub-engine is *configured* here (by the
//! `DMA`/`DMAH` instructions or by the host), but moving words between DSP
//! memory and the system bus is driven by the system crate, which owns the
//! bus. [`Dsp::step`] executes exactly one instruction.

mod exec;

pub mod ins;

use common::util::boxed_array;

pub use ins::Ins;

pub const PROGRAM_LEN: usize = 256;
pub const BANK_COUNT: usize = 4;
pub const BANK_LEN: usize = 64;

/// ALU condition flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub sign: bool,
    pub zero: bool,
    pub carry: bool,
    pub overflow: bool,
}

/// Run-state of the DSP program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Control {
    /// Program is executing. Cleared by `END`/`ENDI`.
    pub executing: bool,
    /// Program is paused (pause flag in the program control port).
    pub paused: bool,
    /// Program has reached `END`/`ENDI` since it last started.
    pub ended: bool,
    /// An `ENDI` requested the DSP-end interrupt. Drained by the host.
    pub end_interrupt: bool,
}

/// State of the DSP DMA sub-engine.
///
/// While `run` is set the host moves one 32-bit word per DSP cycle between
/// the bus-side address and the DSP-side target. The `T0` condition flag
/// mirrors `run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DmaState {
    pub run: bool,
    /// Transfer direction: DSP memory towards the D0 bus.
    pub to_d0: bool,
    /// Do not advance the bus-side address (and do not write it back).
    pub hold: bool,
    /// Remaining words.
    pub count: u32,
    /// Bus-side address increment, in words.
    pub add: u8,
    /// DSP-side target: data RAM bank 0..=3, or program RAM.
    pub program_ram: bool,
    pub bank: usize,
    /// Bus-side byte addresses.
    pub read_addr: u32,
    pub write_addr: u32,
    /// Cursor for program RAM transfers, in words.
    pub program_addr: u8,
}

/// DSP registers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    pub pc: u8,
    /// Per-bank data RAM cursors, modulo 64.
    pub ct: [u8; BANK_COUNT],
    /// Multiplier operands.
    pub rx: u32,
    pub ry: u32,
    /// ALU result, accumulator and product, all sign-extended 48-bit values.
    pub alu: i64,
    pub ac: i64,
    pub p: i64,
    pub flags: Flags,
    /// Loop counter, 12 bits.
    pub lop: u16,
    /// Loop-top address for `BTM`.
    pub top: u8,
    /// DMA bus addresses, in words.
    pub ra0: u32,
    pub wa0: u32,
}

/// The SCU DSP.
pub struct Dsp {
    pub regs: Registers,
    pub program: Box<[u32; PROGRAM_LEN]>,
    pub data: [Box<[u32; BANK_LEN]>; BANK_COUNT],
    pub control: Control,
    pub dma: DmaState,
    /// Pending delayed jump: (delay slots left, target).
    pub jump: Option<(u8, u8)>,
    /// Single-instruction repeat armed by `LPS`.
    pub repeat: bool,
}

impl Default for Dsp {
    fn default() -> Self {
        Self {
            regs: Registers::default(),
            program: boxed_array(0),
            data: std::array::from_fn(|_| boxed_array(0)),
            control: Control::default(),
            dma: DmaState::default(),
            jump: None,
            repeat: false,
        }
    }
}

impl Dsp {
    /// Whether [`step`](Self::step) would execute an instruction.
    #[inline(always)]
    pub fn can_step(&self) -> bool {
        self.control.executing && !self.control.paused
    }

    /// Resets execution state. Program and data RAM persist, matching the
    /// hardware's behavior on a soft reset.
    pub fn reset(&mut self) {
        self.regs = Registers::default();
        self.control = Control::default();
        self.dma = DmaState::default();
        self.jump = None;
        self.repeat = false;
    }

    /// Reads a data RAM bank at its `CT` cursor, post-incrementing the cursor
    /// for the `MCn` selectors.
    #[inline(always)]
    fn read_ram(&mut self, src: ins::RamSrc) -> u32 {
        let bank = src.bank();
        let addr = (self.regs.ct[bank] & 0x3F) as usize;
        let value = self.data[bank][addr];

        if src.increments() {
            self.regs.ct[bank] = (self.regs.ct[bank] + 1) & 0x3F;
        }

        value
    }

    /// Writes a data RAM bank at its `CT` cursor, post-incrementing the
    /// cursor.
    #[inline(always)]
    fn write_ram(&mut self, bank: usize, value: u32) {
        let addr = (self.regs.ct[bank] & 0x3F) as usize;
        self.data[bank][addr] = value;
        self.regs.ct[bank] = (self.regs.ct[bank] + 1) & 0x3F;
    }

    /// Executes one instruction. Gating on [`can_step`](Self::can_step) is
    /// the caller's responsibility, so that the single-step strobe can reuse
    /// this entry point.
    pub fn step(&mut self) {
        let raw = self.program[self.regs.pc as usize];
        let ins = Ins::decode(raw);

        let mut next = self.regs.pc.wrapping_add(1);

        // single-instruction repeat armed by LPS
        if self.repeat {
            if self.regs.lop > 0 {
                self.regs.lop -= 1;
                next = self.regs.pc;
            } else {
                self.repeat = false;
            }
        }

        match &ins {
            Ins::Operation(op) => self.exec_operation(op),
            Ins::Mvi(mvi) => self.exec_mvi(mvi),
            Ins::Dma(dma) => self.exec_dma(dma),
            Ins::Jmp(jmp) => self.exec_jmp(jmp),
            Ins::Lps => self.repeat = true,
            Ins::Btm => {
                if self.regs.lop > 0 {
                    self.regs.lop -= 1;
                    next = self.regs.top;
                }
            }
            Ins::End { interrupt } => {
                self.control.executing = false;
                self.control.ended = true;
                if *interrupt {
                    self.control.end_interrupt = true;
                }
            }
            Ins::Invalid => {
                tracing::debug!("invalid DSP opcode 0x{raw:08X} at 0x{:02X}", self.regs.pc);
            }
        }

        // jumps land after a one-instruction delay slot
        if let Some((left, target)) = self.jump {
            self.jump = if left == 0 {
                next = target;
                None
            } else {
                Some((left - 1, target))
            };
        }

        self.regs.pc = next;
    }
}
