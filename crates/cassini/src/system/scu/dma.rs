//! The SCU DMA engine: three levels moving 32-bit words over the bus, in direct or indirect
//! (descriptor chain) mode.

use crate::system::{System, scheduler::Event, scu::Interrupt};
use bitos::{bitos, integer::u3};
use common::Address;

/// Words transferred per scheduler batch.
pub(crate) const BATCH: u32 = 16;

/// Activation factor of a channel (DnMD bits 0..3).
#[bitos(3)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Factor {
    VBlankIn = 0b000,
    VBlankOut = 0b001,
    HBlankIn = 0b010,
    Timer0 = 0b011,
    Timer1 = 0b100,
    SoundRequest = 0b101,
    SpriteDrawEnd = 0b110,
    Software = 0b111,
}

/// The DnAD register.
#[bitos(32)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddressAdd {
    /// Write address increment selector.
    #[bits(0..3)]
    pub write: u3,
    /// Read address increment: clear adds 0, set adds 4.
    #[bits(8)]
    pub read: bool,
}

impl AddressAdd {
    pub fn read_add(self) -> u32 {
        if self.read() { 4 } else { 0 }
    }

    pub fn write_add(self) -> u32 {
        [0, 2, 4, 8, 16, 32, 64, 128][self.write().value() as usize]
    }
}

/// The DnEN register.
#[bitos(32)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Enable {
    /// Software trigger strobe (factor 7 only).
    #[bits(0)]
    pub go: bool,
    #[bits(8)]
    pub enabled: bool,
}

/// The DnMD register.
#[bitos(32)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mode {
    #[bits(0..3)]
    pub factor: Factor,
    /// Write the updated write address back on completion.
    #[bits(8)]
    pub update_write: bool,
    /// Write the updated read address back on completion.
    #[bits(16)]
    pub update_read: bool,
    #[bits(24)]
    pub indirect: bool,
}

/// One DMA level. The configured registers and the in-flight cursor are kept apart: indirect
/// mode reloads the cursor from each chain descriptor while the configured values stay put, and
/// reconfiguring an active channel must not perturb the transfer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Channel {
    // configured
    pub read_addr: Address,
    pub write_addr: Address,
    pub count: u32,
    pub add: AddressAdd,
    pub enabled: bool,
    pub mode: Mode,

    // in-flight cursor
    pub active: bool,
    pub cur_read: Address,
    pub cur_write: Address,
    pub cur_count: u32,
    /// Descriptor cursor in indirect mode.
    pub cur_table: Address,
    /// Set once the final descriptor has been loaded (always set in direct mode).
    pub end_chain: bool,
}

impl Channel {
    /// Transfer counts are 20 bits on level 0 and 12 bits on levels 1 and 2.
    pub fn count_mask(level: usize) -> u32 {
        if level == 0 { 0xF_FFFF } else { 0xFFF }
    }
}

impl System {
    /// Offers `factor` to every channel.
    pub(crate) fn dma_trigger(&mut self, factor: Factor) {
        for level in 0..3 {
            self.dma_trigger_level(level, factor);
        }
    }

    /// Starts the channel if it is enabled, idle and bound to `factor`.
    pub(crate) fn dma_trigger_level(&mut self, level: usize, factor: Factor) {
        let channel = self.scu.dma[level];
        if !channel.enabled || channel.active || channel.mode.factor() != factor {
            return;
        }

        let channel = &mut self.scu.dma[level];
        channel.active = true;
        channel.end_chain = !channel.mode.indirect();

        if channel.mode.indirect() {
            // the write address register holds the descriptor table
            channel.cur_table = channel.write_addr;
            self.dma_load_descriptor(level);
        } else {
            channel.cur_read = channel.read_addr;
            channel.cur_write = channel.write_addr;
            channel.cur_count = channel.count & Channel::count_mask(level);
        }

        tracing::debug!(level, ?factor, "DMA transfer started");
        self.scheduler.schedule(Event::scu_dma(level), 0);
    }

    /// Loads the next chain descriptor into the cursor. A descriptor is three words: count,
    /// write address, read address; bit 31 of the read address word marks the end of the chain,
    /// and the marked descriptor is still transferred in full.
    fn dma_load_descriptor(&mut self, level: usize) {
        let table = self.scu.dma[level].cur_table;
        let count: u32 = self.read(table);
        let write: u32 = self.read(table + 4);
        let read: u32 = self.read(table + 8);

        let channel = &mut self.scu.dma[level];
        channel.cur_table = table + 12;
        channel.cur_count = count & Channel::count_mask(level);
        channel.cur_write = Address(write);
        channel.cur_read = Address(read & 0x7FFF_FFFF);
        channel.end_chain |= read & 0x8000_0000 != 0;
    }

    /// Moves up to [`BATCH`] words for the channel, rescheduling itself while the transfer is
    /// still in flight.
    pub(crate) fn dma_step(&mut self, level: usize) {
        if !self.scu.dma[level].active {
            return;
        }

        let mut budget = BATCH;
        while budget > 0 {
            budget -= 1;

            let channel = self.scu.dma[level];
            if channel.cur_count == 0 {
                if channel.end_chain {
                    self.dma_complete(level);
                    return;
                }

                self.dma_load_descriptor(level);
                continue;
            }

            // transfers into the SCU register window are illegal
            if channel.cur_write.value() & 0xFFF0_0000 == 0x25F0_0000 {
                tracing::warn!(level, write = %channel.cur_write, "illegal DMA transfer");
                self.scu.dma[level].active = false;
                self.raise_interrupt(Interrupt::DmaIllegal);
                return;
            }

            let value: u32 = self.read(channel.cur_read);
            self.write(channel.cur_write, value);

            let channel = &mut self.scu.dma[level];
            channel.cur_read += channel.add.read_add();
            channel.cur_write += channel.add.write_add();
            channel.cur_count -= 1;
        }

        self.scheduler.schedule(Event::scu_dma(level), u64::from(BATCH));
    }

    fn dma_complete(&mut self, level: usize) {
        let channel = &mut self.scu.dma[level];
        channel.active = false;

        if channel.mode.update_read() {
            channel.read_addr = channel.cur_read;
        }
        if channel.mode.update_write() {
            channel.write_addr = if channel.mode.indirect() {
                channel.cur_table
            } else {
                channel.cur_write
            };
        }

        tracing::debug!(level, "DMA transfer complete");
        if let Some(probe) = &mut self.config.probe {
            probe.dma_completed(level);
        }

        self.raise_interrupt(match level {
            0 => Interrupt::Dma0End,
            1 => Interrupt::Dma1End,
            _ => Interrupt::Dma2End,
        });
    }

    /// Stops an in-flight transfer without raising completion. The channel stays configured.
    pub(crate) fn dma_stop_level(&mut self, level: usize) {
        if self.scu.dma[level].active {
            tracing::debug!(level, "DMA transfer stopped");
        }

        self.scu.dma[level].active = false;
        self.scheduler.cancel(Event::scu_dma(level));
    }

    /// DSTP write: force-stops every in-flight transfer without raising completion.
    pub(crate) fn dma_force_stop(&mut self) {
        for level in 0..3 {
            self.dma_stop_level(level);
        }
    }

    /// DSTA read.
    pub(crate) fn dma_status(&self) -> u32 {
        u32::from(self.scu.dsp.dma.run)
            | u32::from(self.scu.dma[0].active) << 4
            | u32::from(self.scu.dma[1].active) << 8
            | u32::from(self.scu.dma[2].active) << 12
    }
}
