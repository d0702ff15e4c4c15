//! Host side of the SCU DSP: the program/data ports and the DMA pump that moves words between
//! DSP memory and the system bus.

use crate::system::{System, scu::Interrupt};
use bitos::{BitUtils, bitos};
use common::Address;

/// The DSP program control port.
#[bitos(32)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgramControl {
    #[bits(0..8)]
    pub pc: u8,
    /// Load `pc` into the program counter.
    #[bits(15)]
    pub load_pc: bool,
    #[bits(16)]
    pub execute: bool,
    /// Single-step strobe, effective while not executing.
    #[bits(17)]
    pub step: bool,
    #[bits(18)]
    pub t0: bool,
    #[bits(19)]
    pub sign: bool,
    #[bits(20)]
    pub zero: bool,
    #[bits(21)]
    pub carry: bool,
    #[bits(22)]
    pub overflow: bool,
    #[bits(23)]
    pub ended: bool,
    #[bits(25)]
    pub pause: bool,
    #[bits(26)]
    pub unpause: bool,
}

impl System {
    /// Composes the program control port. Reading it clears the end flag.
    pub(crate) fn dsp_read_control(&mut self) -> u32 {
        let dsp = &mut self.scu.dsp;
        let value = ProgramControl::default()
            .with_pc(dsp.regs.pc)
            .with_execute(dsp.control.executing)
            .with_t0(dsp.dma.run)
            .with_sign(dsp.regs.flags.sign)
            .with_zero(dsp.regs.flags.zero)
            .with_carry(dsp.regs.flags.carry)
            .with_overflow(dsp.regs.flags.overflow)
            .with_ended(dsp.control.ended)
            .with_pause(dsp.control.paused);

        dsp.control.ended = false;
        value.to_bits()
    }

    pub(crate) fn dsp_write_control(&mut self, value: ProgramControl) {
        let dsp = &mut self.scu.dsp;

        if value.load_pc() {
            dsp.regs.pc = value.pc();
        }

        if value.pause() {
            dsp.control.paused = true;
        } else if value.unpause() {
            dsp.control.paused = false;
        }

        dsp.control.executing = value.execute();
        if value.execute() {
            dsp.control.ended = false;
        }

        if value.step() && !value.execute() {
            self.scu.dsp.step();
            self.dsp_drain_end();
        }
    }

    /// Program data port: stores at the program counter and post-increments it. Only effective
    /// while the program is halted.
    pub(crate) fn dsp_write_program(&mut self, value: u32) {
        let dsp = &mut self.scu.dsp;
        if dsp.control.executing {
            tracing::warn!("program RAM write ignored while the DSP is executing");
            return;
        }

        dsp.program[dsp.regs.pc as usize] = value;
        dsp.regs.pc = dsp.regs.pc.wrapping_add(1);
    }

    pub(crate) fn dsp_read_program(&mut self) -> u32 {
        let dsp = &mut self.scu.dsp;
        if dsp.control.executing {
            tracing::warn!("program RAM read ignored while the DSP is executing");
            return 0;
        }

        let value = dsp.program[dsp.regs.pc as usize];
        dsp.regs.pc = dsp.regs.pc.wrapping_add(1);
        value
    }

    /// Data RAM port: accesses the bank/offset in the address port and post-increments it.
    pub(crate) fn dsp_write_data(&mut self, value: u32) {
        if self.scu.dsp.control.executing {
            tracing::warn!("data RAM write ignored while the DSP is executing");
            return;
        }

        let bank = self.scu.data_addr.bits(6, 8) as usize;
        let offset = self.scu.data_addr.bits(0, 6) as usize;
        self.scu.dsp.data[bank][offset] = value;
        self.scu.data_addr = self.scu.data_addr.wrapping_add(1);
    }

    pub(crate) fn dsp_read_data(&mut self) -> u32 {
        if self.scu.dsp.control.executing {
            tracing::warn!("data RAM read ignored while the DSP is executing");
            return 0;
        }

        let bank = self.scu.data_addr.bits(6, 8) as usize;
        let offset = self.scu.data_addr.bits(0, 6) as usize;
        let value = self.scu.dsp.data[bank][offset];
        self.scu.data_addr = self.scu.data_addr.wrapping_add(1);
        value
    }

    /// Executes one DSP cycle: pumps the DMA sub-engine, then one instruction if the program is
    /// running.
    pub(crate) fn dsp_step(&mut self) {
        if self.scu.dsp.dma.run {
            self.dsp_dma_pump();
        }

        if self.scu.dsp.can_step() {
            self.scu.dsp.step();
            self.dsp_drain_end();
        }
    }

    pub(crate) fn dsp_drain_end(&mut self) {
        if self.scu.dsp.control.end_interrupt {
            self.scu.dsp.control.end_interrupt = false;
            self.raise_interrupt(Interrupt::DspEnd);
        }
    }

    /// Moves one word for the DSP DMA sub-engine, or completes it once the count is exhausted.
    fn dsp_dma_pump(&mut self) {
        let dma = self.scu.dsp.dma;
        if dma.count == 0 {
            let dsp = &mut self.scu.dsp;
            dsp.dma.run = false;
            // only the cursor the transfer advanced is written back
            if !dma.hold {
                if dma.to_d0 {
                    dsp.regs.wa0 = dma.write_addr >> 2;
                } else {
                    dsp.regs.ra0 = dma.read_addr >> 2;
                }
            }

            tracing::debug!("DSP DMA complete");
            return;
        }

        let stride = u32::from(dma.add) * 4;
        if dma.to_d0 {
            let value = self.dsp_dma_read_local();
            self.write(Address(dma.write_addr), value);

            if let Some(probe) = &mut self.config.probe {
                probe.dsp_dma_transferred(Address(dma.write_addr), value, true);
            }

            if !dma.hold {
                self.scu.dsp.dma.write_addr = dma.write_addr.wrapping_add(stride);
            }
        } else {
            let value: u32 = self.read(Address(dma.read_addr));
            self.dsp_dma_write_local(value);

            if let Some(probe) = &mut self.config.probe {
                probe.dsp_dma_transferred(Address(dma.read_addr), value, false);
            }

            if !dma.hold {
                self.scu.dsp.dma.read_addr = dma.read_addr.wrapping_add(stride);
            }
        }

        self.scu.dsp.dma.count -= 1;
    }

    fn dsp_dma_read_local(&mut self) -> u32 {
        let dsp = &mut self.scu.dsp;
        if dsp.dma.program_ram {
            let value = dsp.program[dsp.dma.program_addr as usize];
            dsp.dma.program_addr = dsp.dma.program_addr.wrapping_add(1);
            value
        } else {
            let bank = dsp.dma.bank & 0x3;
            let cursor = (dsp.regs.ct[bank] & 0x3F) as usize;
            let value = dsp.data[bank][cursor];
            dsp.regs.ct[bank] = (dsp.regs.ct[bank] + 1) & 0x3F;
            value
        }
    }

    fn dsp_dma_write_local(&mut self, value: u32) {
        let dsp = &mut self.scu.dsp;
        if dsp.dma.program_ram {
            dsp.program[dsp.dma.program_addr as usize] = value;
            dsp.dma.program_addr = dsp.dma.program_addr.wrapping_add(1);
        } else {
            let bank = dsp.dma.bank & 0x3;
            let cursor = (dsp.regs.ct[bank] & 0x3F) as usize;
            dsp.data[bank][cursor] = value;
            dsp.regs.ct[bank] = (dsp.regs.ct[bank] + 1) & 0x3F;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::system::{Config, scu::InterruptMask};

    fn system() -> System {
        let mut system = System::new(Config::default());
        system.scu.mask = InterruptMask::from_bits(0);
        system
    }

    #[test]
    fn program_port_loads_at_pc() {
        let mut system = system();
        system.dsp_write_control(ProgramControl::default().with_load_pc(true).with_pc(0x10));
        system.dsp_write_program(0xAAAA_AAAA);
        system.dsp_write_program(0xBBBB_BBBB);

        assert_eq!(system.scu.dsp.program[0x10], 0xAAAA_AAAA);
        assert_eq!(system.scu.dsp.program[0x11], 0xBBBB_BBBB);
        assert_eq!(system.scu.dsp.regs.pc, 0x12);
    }

    #[test]
    fn data_port_walks_banks() {
        let mut system = system();
        system.scu.data_addr = 0x3F; // bank 0, last word
        system.dsp_write_data(1);
        system.dsp_write_data(2); // bank 1, word 0

        assert_eq!(system.scu.dsp.data[0][0x3F], 1);
        assert_eq!(system.scu.dsp.data[1][0], 2);
    }

    #[test]
    fn program_writes_ignored_while_executing() {
        let mut system = system();
        system.scu.dsp.control.executing = true;
        system.dsp_write_program(0xDEAD_BEEF);
        assert_eq!(system.scu.dsp.program[0], 0);
    }

    #[test]
    fn step_strobe_executes_one_instruction() {
        let mut system = system();
        // MVI 7,RX
        system.dsp_write_program((0b10 << 30) | (0x4 << 26) | 7);
        system.dsp_write_control(ProgramControl::default().with_load_pc(true).with_pc(0));
        system.dsp_write_control(ProgramControl::default().with_step(true));

        assert_eq!(system.scu.dsp.regs.rx, 7);
        assert_eq!(system.scu.dsp.regs.pc, 1);
        assert!(!system.scu.dsp.control.executing);
    }

    #[test]
    fn endi_reaches_the_interrupt_fabric() {
        let mut system = system();
        system.scu.dsp.program[0] = 0xF800_0000; // ENDI
        system.dsp_write_control(ProgramControl::default().with_execute(true));

        system.dsp_step();
        assert_ne!(
            system.scu.status.to_bits() & (1 << Interrupt::DspEnd as u8),
            0
        );
        assert!(system.scu.dsp.control.ended);

        // reading the control port reports and clears the end flag
        let control = ProgramControl::from_bits(system.dsp_read_control());
        assert!(control.ended());
        assert!(!system.scu.dsp.control.ended);
    }

    #[test]
    fn dma_pump_moves_words_into_data_ram() {
        let mut system = system();
        for i in 0..4u32 {
            system.write(Address(0x0600_1000 + i * 4), 0xC0DE_0000 | i);
        }

        let dsp = &mut system.scu.dsp;
        dsp.dma.run = true;
        dsp.dma.count = 4;
        dsp.dma.add = 1;
        dsp.dma.bank = 2;
        dsp.dma.read_addr = 0x0600_1000;

        // one word per step, then one completion step
        for _ in 0..5 {
            system.dsp_step();
        }

        assert!(!system.scu.dsp.dma.run);
        for i in 0..4usize {
            assert_eq!(system.scu.dsp.data[2][i], 0xC0DE_0000 | i as u32);
        }
        assert_eq!(system.scu.dsp.regs.ct[2], 4);
        // the read address is written back in word units; the write side is untouched
        assert_eq!(system.scu.dsp.regs.ra0, (0x0600_1000 + 16) >> 2);
        assert_eq!(system.scu.dsp.regs.wa0, 0);
    }

    #[test]
    fn port_reads_ignored_while_executing() {
        let mut system = system();
        system.scu.dsp.program[5] = 0x1234_5678;
        system.scu.dsp.regs.pc = 5;
        system.scu.dsp.data[0][0] = 0xAAAA_AAAA;
        system.scu.dsp.control.executing = true;

        assert_eq!(system.dsp_read_program(), 0);
        assert_eq!(system.scu.dsp.regs.pc, 5);
        assert_eq!(system.dsp_read_data(), 0);
        assert_eq!(system.scu.data_addr, 0);

        // halted again, the ports work normally
        system.scu.dsp.control.executing = false;
        assert_eq!(system.dsp_read_program(), 0x1234_5678);
        assert_eq!(system.dsp_read_data(), 0xAAAA_AAAA);
    }

    #[test]
    fn dma_pump_writes_out_with_hold() {
        let mut system = system();
        system.scu.dsp.data[0][0] = 0x1234_5678;
        system.scu.dsp.data[0][1] = 0x9ABC_DEF0;

        let dsp = &mut system.scu.dsp;
        dsp.regs.wa0 = 0x0600_2000 >> 2;
        dsp.dma.run = true;
        dsp.dma.to_d0 = true;
        dsp.dma.hold = true;
        dsp.dma.count = 2;
        dsp.dma.add = 1;
        dsp.dma.write_addr = 0x0600_2000;

        for _ in 0..3 {
            system.dsp_step();
        }

        // held address: both words land on the same spot
        let value: u32 = system.read(Address(0x0600_2000));
        assert_eq!(value, 0x9ABC_DEF0);
        assert_eq!(system.scu.dsp.dma.write_addr, 0x0600_2000);
        assert_eq!(system.scu.dsp.regs.wa0, 0x0600_2000 >> 2);
    }
}
