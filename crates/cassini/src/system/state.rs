//! Versioned save states.
//!
//! The state is a plain struct of integers so the on-disk layout is independent of the register
//! bitfield types. Loading validates everything before touching live state; a failed load
//! leaves the system untouched.

use crate::system::{
    System,
    bus::{HWRAM_LEN, LWRAM_LEN},
    scheduler::{Event, Period, Scheduler, Slot},
    scu::{
        InterruptMask, InterruptStatus,
        dma::{AddressAdd, Channel, Mode},
        timer::{TimerMode, Timers},
    },
    video::Standard,
};
use common::Address;
use easyerr::{Error, ResultExt};
use scudsp::{BANK_COUNT, BANK_LEN, PROGRAM_LEN};
use serde::{Deserialize, Serialize};

pub const VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedSlot {
    pub target: u64,
    /// `(num, den, rem)` of a periodic slot.
    pub period: Option<(u64, u64, u64)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedChannel {
    pub read_addr: u32,
    pub write_addr: u32,
    pub count: u32,
    pub add: u32,
    pub enabled: bool,
    pub mode: u32,

    pub active: bool,
    pub cur_read: u32,
    pub cur_write: u32,
    pub cur_count: u32,
    pub cur_table: u32,
    pub end_chain: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedTimers {
    pub counter: u16,
    pub compare: u16,
    pub reload: u16,
    pub mode: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedDsp {
    pub pc: u8,
    pub ct: [u8; 4],
    pub rx: u32,
    pub ry: u32,
    pub alu: i64,
    pub ac: i64,
    pub p: i64,
    pub sign: bool,
    pub zero: bool,
    pub carry: bool,
    pub overflow: bool,
    pub lop: u16,
    pub top: u8,
    pub ra0: u32,
    pub wa0: u32,

    pub executing: bool,
    pub paused: bool,
    pub ended: bool,
    pub end_interrupt: bool,

    pub dma_run: bool,
    pub dma_to_d0: bool,
    pub dma_hold: bool,
    pub dma_count: u32,
    pub dma_add: u8,
    pub dma_program_ram: bool,
    pub dma_bank: u8,
    pub dma_read_addr: u32,
    pub dma_write_addr: u32,
    pub dma_program_addr: u8,

    pub jump: Option<(u8, u8)>,
    pub repeat: bool,

    pub program: Vec<u32>,
    pub data: Vec<Vec<u32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveState {
    pub version: u32,
    pub standard: u8,
    pub elapsed: u64,
    pub slots: Vec<Option<SavedSlot>>,
    pub line: u16,
    pub mask: u32,
    pub status: u32,
    pub dma: Vec<SavedChannel>,
    pub timers: SavedTimers,
    pub dsp: SavedDsp,
    pub data_addr: u8,
    /// Cycles accumulated towards the next DSP step by the driver.
    pub dsp_pending: u64,
    pub lwram: Vec<u8>,
    pub hwram: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("save state version {found} is not supported")]
    Version { found: u32 },
    #[error("save state is corrupt: invalid {field}")]
    Invalid { field: &'static str },
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error(transparent)]
    Decode {
        source: ciborium::de::Error<std::io::Error>,
    },
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error(transparent)]
    Encode {
        source: ciborium::ser::Error<std::io::Error>,
    },
}

impl SaveState {
    pub fn read_from(reader: impl std::io::Read) -> Result<Self, ReadError> {
        ciborium::from_reader(reader).context(ReadCtx::Decode)
    }

    pub fn write_to(&self, writer: impl std::io::Write) -> Result<(), WriteError> {
        ciborium::into_writer(self, writer).context(WriteCtx::Encode)
    }

    fn validate(&self) -> Result<Standard, LoadError> {
        if self.version != VERSION {
            return Err(LoadError::Version {
                found: self.version,
            });
        }

        let standard =
            Standard::from_repr(self.standard).ok_or(LoadError::Invalid { field: "standard" })?;

        if self.slots.len() != Event::COUNT {
            return Err(LoadError::Invalid {
                field: "scheduler slots",
            });
        }
        for slot in self.slots.iter().flatten() {
            if let Some((_, den, rem)) = slot.period
                && (den == 0 || rem >= den)
            {
                return Err(LoadError::Invalid {
                    field: "scheduler period",
                });
            }
        }

        if self.line >= standard.lines_per_frame() {
            return Err(LoadError::Invalid { field: "line" });
        }

        if self.status & 0xC000 != 0 {
            return Err(LoadError::Invalid {
                field: "interrupt status",
            });
        }

        if self.dma.len() != 3 {
            return Err(LoadError::Invalid {
                field: "DMA channels",
            });
        }

        let dsp = &self.dsp;
        if dsp.ct.iter().any(|&ct| ct >= BANK_LEN as u8) {
            return Err(LoadError::Invalid { field: "DSP CT" });
        }
        if dsp.lop > 0xFFF {
            return Err(LoadError::Invalid { field: "DSP LOP" });
        }
        if usize::from(dsp.dma_bank) >= BANK_COUNT {
            return Err(LoadError::Invalid {
                field: "DSP DMA bank",
            });
        }
        if dsp.program.len() != PROGRAM_LEN {
            return Err(LoadError::Invalid {
                field: "DSP program RAM",
            });
        }
        if dsp.data.len() != BANK_COUNT || dsp.data.iter().any(|bank| bank.len() != BANK_LEN) {
            return Err(LoadError::Invalid {
                field: "DSP data RAM",
            });
        }

        if self.lwram.len() != LWRAM_LEN {
            return Err(LoadError::Invalid { field: "LWRAM" });
        }
        if self.hwram.len() != HWRAM_LEN {
            return Err(LoadError::Invalid { field: "HWRAM" });
        }

        Ok(standard)
    }
}

impl System {
    pub fn save_state(&self) -> SaveState {
        let dsp = &self.scu.dsp;
        SaveState {
            version: VERSION,
            standard: self.video.standard as u8,
            elapsed: self.scheduler.elapsed,
            slots: self
                .scheduler
                .slots
                .iter()
                .map(|slot| {
                    slot.map(|slot| SavedSlot {
                        target: slot.target,
                        period: slot.period.map(|p| (p.num, p.den, p.rem)),
                    })
                })
                .collect(),
            line: self.video.line,
            mask: self.scu.mask.to_bits(),
            status: self.scu.status.to_bits(),
            dma: self
                .scu
                .dma
                .iter()
                .map(|channel| SavedChannel {
                    read_addr: channel.read_addr.value(),
                    write_addr: channel.write_addr.value(),
                    count: channel.count,
                    add: channel.add.to_bits(),
                    enabled: channel.enabled,
                    mode: channel.mode.to_bits(),
                    active: channel.active,
                    cur_read: channel.cur_read.value(),
                    cur_write: channel.cur_write.value(),
                    cur_count: channel.cur_count,
                    cur_table: channel.cur_table.value(),
                    end_chain: channel.end_chain,
                })
                .collect(),
            timers: SavedTimers {
                counter: self.scu.timers.counter,
                compare: self.scu.timers.compare,
                reload: self.scu.timers.reload,
                mode: self.scu.timers.mode.to_bits(),
            },
            dsp: SavedDsp {
                pc: dsp.regs.pc,
                ct: dsp.regs.ct,
                rx: dsp.regs.rx,
                ry: dsp.regs.ry,
                alu: dsp.regs.alu,
                ac: dsp.regs.ac,
                p: dsp.regs.p,
                sign: dsp.regs.flags.sign,
                zero: dsp.regs.flags.zero,
                carry: dsp.regs.flags.carry,
                overflow: dsp.regs.flags.overflow,
                lop: dsp.regs.lop,
                top: dsp.regs.top,
                ra0: dsp.regs.ra0,
                wa0: dsp.regs.wa0,
                executing: dsp.control.executing,
                paused: dsp.control.paused,
                ended: dsp.control.ended,
                end_interrupt: dsp.control.end_interrupt,
                dma_run: dsp.dma.run,
                dma_to_d0: dsp.dma.to_d0,
                dma_hold: dsp.dma.hold,
                dma_count: dsp.dma.count,
                dma_add: dsp.dma.add,
                dma_program_ram: dsp.dma.program_ram,
                dma_bank: dsp.dma.bank as u8,
                dma_read_addr: dsp.dma.read_addr,
                dma_write_addr: dsp.dma.write_addr,
                dma_program_addr: dsp.dma.program_addr,
                jump: dsp.jump,
                repeat: dsp.repeat,
                program: dsp.program.to_vec(),
                data: dsp.data.iter().map(|bank| bank.to_vec()).collect(),
            },
            data_addr: self.scu.data_addr,
            dsp_pending: 0,
            lwram: self.bus.lwram.to_vec(),
            hwram: self.bus.hwram.to_vec(),
        }
    }

    /// Replaces the live state with `state`. Validation happens up front; on error the system
    /// is left untouched.
    pub fn load_state(&mut self, state: &SaveState) -> Result<(), LoadError> {
        let standard = state.validate()?;

        let mut scheduler = Scheduler::default();
        scheduler.elapsed = state.elapsed;
        for (index, slot) in state.slots.iter().enumerate() {
            scheduler.slots[index] = slot.as_ref().map(|slot| Slot {
                target: slot.target,
                period: slot.period.map(|(num, den, rem)| Period { num, den, rem }),
            });
        }
        self.scheduler = scheduler;

        self.video.standard = standard;
        self.video.line = state.line;

        self.scu.mask = InterruptMask::from_bits(state.mask);
        self.scu.status = InterruptStatus::from_bits(state.status);

        for (channel, saved) in self.scu.dma.iter_mut().zip(&state.dma) {
            *channel = Channel {
                read_addr: Address(saved.read_addr),
                write_addr: Address(saved.write_addr),
                count: saved.count,
                add: AddressAdd::from_bits(saved.add),
                enabled: saved.enabled,
                mode: Mode::from_bits(saved.mode),
                active: saved.active,
                cur_read: Address(saved.cur_read),
                cur_write: Address(saved.cur_write),
                cur_count: saved.cur_count,
                cur_table: Address(saved.cur_table),
                end_chain: saved.end_chain,
            };
        }

        self.scu.timers = Timers {
            counter: state.timers.counter,
            compare: state.timers.compare,
            reload: state.timers.reload,
            mode: TimerMode::from_bits(state.timers.mode),
        };

        let dsp = &mut self.scu.dsp;
        let saved = &state.dsp;
        dsp.regs.pc = saved.pc;
        dsp.regs.ct = saved.ct;
        dsp.regs.rx = saved.rx;
        dsp.regs.ry = saved.ry;
        dsp.regs.alu = saved.alu;
        dsp.regs.ac = saved.ac;
        dsp.regs.p = saved.p;
        dsp.regs.flags.sign = saved.sign;
        dsp.regs.flags.zero = saved.zero;
        dsp.regs.flags.carry = saved.carry;
        dsp.regs.flags.overflow = saved.overflow;
        dsp.regs.lop = saved.lop;
        dsp.regs.top = saved.top;
        dsp.regs.ra0 = saved.ra0;
        dsp.regs.wa0 = saved.wa0;
        dsp.control.executing = saved.executing;
        dsp.control.paused = saved.paused;
        dsp.control.ended = saved.ended;
        dsp.control.end_interrupt = saved.end_interrupt;
        dsp.dma.run = saved.dma_run;
        dsp.dma.to_d0 = saved.dma_to_d0;
        dsp.dma.hold = saved.dma_hold;
        dsp.dma.count = saved.dma_count;
        dsp.dma.add = saved.dma_add;
        dsp.dma.program_ram = saved.dma_program_ram;
        dsp.dma.bank = usize::from(saved.dma_bank);
        dsp.dma.read_addr = saved.dma_read_addr;
        dsp.dma.write_addr = saved.dma_write_addr;
        dsp.dma.program_addr = saved.dma_program_addr;
        dsp.jump = saved.jump;
        dsp.repeat = saved.repeat;
        dsp.program.copy_from_slice(&saved.program);
        for (bank, saved) in dsp.data.iter_mut().zip(&saved.data) {
            bank.copy_from_slice(saved);
        }

        self.scu.data_addr = state.data_addr;
        self.bus.lwram.copy_from_slice(&state.lwram);
        self.bus.hwram.copy_from_slice(&state.hwram);

        Ok(())
    }
}
