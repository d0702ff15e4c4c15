mod mmio;

use crate::system::{
    System,
    scu::{
        InterruptMask,
        dma::{AddressAdd, Channel, Enable, Factor, Mode},
        dsp::ProgramControl,
        timer::TimerMode,
    },
};
use common::{Address, Primitive, util::boxed_array};

pub use mmio::Mmio;

pub const LWRAM_LEN: usize = 1024 * 1024;
pub const HWRAM_LEN: usize = 2 * 1024 * 1024;

/// System memories reachable over the bus.
pub struct Bus {
    /// Work RAM low, at `0x0020_0000`.
    pub lwram: Box<[u8; LWRAM_LEN]>,
    /// Work RAM high, at `0x0600_0000`.
    pub hwram: Box<[u8; HWRAM_LEN]>,
}

impl Default for Bus {
    fn default() -> Self {
        Self {
            lwram: boxed_array(0),
            hwram: boxed_array(0),
        }
    }
}

/// Allows the usage of const values in patterns. It's a neat trick!
struct ConstTrick<const N: u32>;
impl<const N: u32> ConstTrick<N> {
    const OUTPUT: u32 = N;
}

macro_rules! map {
    ($offset:ident, $match_addr:expr; $($addr:expr, $size:expr => $block:expr,)* @default => $default:expr $(,)?) => {
        match $match_addr.value() {
            $(
                $addr..=ConstTrick::<{ $addr + ($size - 1) as u32 }>::OUTPUT => {
                    #[allow(unused_assignments)]
                    {
                        $offset = ($match_addr.value() - $addr) as usize;
                    }
                    $block
                }
            )*
            _ => $default
        }
    };
}

impl System {
    /// Reads a primitive from the given physical address.
    pub fn read<P: Primitive>(&mut self, addr: Address) -> P {
        let offset: usize;
        map! {
            offset, addr;
            0x0020_0000, LWRAM_LEN => P::read_be_bytes(&self.bus.lwram[offset..]),
            0x0600_0000, HWRAM_LEN => P::read_be_bytes(&self.bus.hwram[offset..]),
            0x25FE_0000, 0x100 => self.read_scu(offset as u16),
            @default => {
                tracing::error!("reading from {addr} (unknown region)");
                P::default()
            },
        }
    }

    /// Writes a primitive to the given physical address.
    pub fn write<P: Primitive>(&mut self, addr: Address, value: P) {
        let offset: usize;
        map! {
            offset, addr;
            0x0020_0000, LWRAM_LEN => value.write_be_bytes(&mut self.bus.lwram[offset..]),
            0x0600_0000, HWRAM_LEN => value.write_be_bytes(&mut self.bus.hwram[offset..]),
            0x25FE_0000, 0x100 => self.write_scu(offset as u16, value),
            @default => {
                tracing::error!("writing 0x{value:08X} to {addr} (unknown region)");
            },
        }
    }

    fn read_scu<P: Primitive>(&mut self, offset: u16) -> P {
        if size_of::<P>() != 4 || offset % 4 != 0 {
            tracing::warn!("non-word SCU register read at +0x{offset:02X}");
            return P::default();
        }

        let Some((reg, _)) = Mmio::find(offset) else {
            tracing::warn!("reading from unknown SCU register (+0x{offset:02X})");
            return P::default();
        };

        tracing::debug!("reading from {reg:?}");

        let value: u32 = match reg {
            // === DMA ===
            Mmio::Dma0Read | Mmio::Dma1Read | Mmio::Dma2Read => {
                self.scu.dma[reg.dma_level()].read_addr.value()
            }
            Mmio::Dma0Write | Mmio::Dma1Write | Mmio::Dma2Write => {
                self.scu.dma[reg.dma_level()].write_addr.value()
            }
            Mmio::Dma0Count | Mmio::Dma1Count | Mmio::Dma2Count => {
                self.scu.dma[reg.dma_level()].count
            }
            Mmio::Dma0Add | Mmio::Dma1Add | Mmio::Dma2Add => {
                self.scu.dma[reg.dma_level()].add.to_bits()
            }
            Mmio::Dma0Enable | Mmio::Dma1Enable | Mmio::Dma2Enable => {
                Enable::default()
                    .with_enabled(self.scu.dma[reg.dma_level()].enabled)
                    .to_bits()
            }
            Mmio::Dma0Mode | Mmio::Dma1Mode | Mmio::Dma2Mode => {
                self.scu.dma[reg.dma_level()].mode.to_bits()
            }
            Mmio::DmaForceStop => 0,
            Mmio::DmaStatus => self.dma_status(),

            // === DSP ===
            Mmio::DspProgramControl => self.dsp_read_control(),
            Mmio::DspProgramData => self.dsp_read_program(),
            Mmio::DspDataAddress => u32::from(self.scu.data_addr),
            Mmio::DspDataData => self.dsp_read_data(),

            // === timers ===
            Mmio::Timer0Compare => u32::from(self.scu.timers.compare),
            Mmio::Timer1Reload => u32::from(self.scu.timers.reload),
            Mmio::TimerMode => self.scu.timers.mode.to_bits(),

            // === interrupts ===
            Mmio::InterruptMask => self.scu.mask.to_bits(),
            Mmio::InterruptStatus => self.scu.status.to_bits(),
            Mmio::AbusInterruptAck => 0,

            Mmio::Version => 4,
        };

        P::read_be_bytes(&value.to_be_bytes())
    }

    fn write_scu<P: Primitive>(&mut self, offset: u16, value: P) {
        if size_of::<P>() != 4 || offset % 4 != 0 {
            tracing::warn!("non-word SCU register write at +0x{offset:02X}");
            return;
        }

        let Some((reg, _)) = Mmio::find(offset) else {
            tracing::warn!("writing 0x{value:08X} to unknown SCU register (+0x{offset:02X})");
            return;
        };

        tracing::debug!("writing 0x{value:08X} to {reg:?}");

        let mut bytes = [0u8; 4];
        value.write_be_bytes(&mut bytes);
        let value = u32::from_be_bytes(bytes);

        match reg {
            // === DMA ===
            Mmio::Dma0Read | Mmio::Dma1Read | Mmio::Dma2Read => {
                self.scu.dma[reg.dma_level()].read_addr = Address(value & 0x07FF_FFFF);
            }
            Mmio::Dma0Write | Mmio::Dma1Write | Mmio::Dma2Write => {
                self.scu.dma[reg.dma_level()].write_addr = Address(value & 0x07FF_FFFF);
            }
            Mmio::Dma0Count | Mmio::Dma1Count | Mmio::Dma2Count => {
                let level = reg.dma_level();
                self.scu.dma[level].count = value & Channel::count_mask(level);
            }
            Mmio::Dma0Add | Mmio::Dma1Add | Mmio::Dma2Add => {
                self.scu.dma[reg.dma_level()].add = AddressAdd::from_bits(value);
            }
            Mmio::Dma0Enable | Mmio::Dma1Enable | Mmio::Dma2Enable => {
                let level = reg.dma_level();
                let enable = Enable::from_bits(value);
                self.scu.dma[level].enabled = enable.enabled();
                if !enable.enabled() {
                    // disabling a channel kills its in-flight transfer
                    self.dma_stop_level(level);
                } else if enable.go() {
                    self.dma_trigger_level(level, Factor::Software);
                }
            }
            Mmio::Dma0Mode | Mmio::Dma1Mode | Mmio::Dma2Mode => {
                self.scu.dma[reg.dma_level()].mode = Mode::from_bits(value);
            }
            Mmio::DmaForceStop => {
                if value & 1 != 0 {
                    self.dma_force_stop();
                }
            }
            Mmio::DmaStatus => tracing::warn!("write to read-only DSTA ignored"),

            // === DSP ===
            Mmio::DspProgramControl => self.dsp_write_control(ProgramControl::from_bits(value)),
            Mmio::DspProgramData => self.dsp_write_program(value),
            Mmio::DspDataAddress => self.scu.data_addr = value as u8,
            Mmio::DspDataData => self.dsp_write_data(value),

            // === timers ===
            Mmio::Timer0Compare => self.scu.timers.compare = (value & 0x3FF) as u16,
            Mmio::Timer1Reload => self.scu.timers.reload = (value & 0x1FF) as u16,
            Mmio::TimerMode => {
                self.scu.timers.mode = TimerMode::from_bits(value);
            }

            // === interrupts ===
            Mmio::InterruptMask => self.scu.mask = InterruptMask::from_bits(value),
            Mmio::InterruptStatus => self.scu.write_status(value),
            Mmio::AbusInterruptAck => tracing::debug!("A-bus interrupt acknowledge"),

            Mmio::Version => tracing::warn!("write to read-only version register ignored"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::system::{Config, scu::Interrupt};

    fn system() -> System {
        let mut system = System::new(Config::default());
        system.write(Mmio::InterruptMask.address(), 0u32);
        system
    }

    #[test]
    fn ram_round_trips_big_endian() {
        let mut system = system();
        system.write(Address(0x0600_0000), 0x0102_0304u32);

        let byte: u8 = system.read(Address(0x0600_0000));
        assert_eq!(byte, 0x01);
        let half: u16 = system.read(Address(0x0600_0002));
        assert_eq!(half, 0x0304);

        system.write(Address(0x0020_0010), 0xBEEFu16);
        let value: u16 = system.read(Address(0x0020_0010));
        assert_eq!(value, 0xBEEF);
    }

    #[test]
    fn unknown_regions_read_zero() {
        let mut system = system();
        let value: u32 = system.read(Address(0x1234_5678));
        assert_eq!(value, 0);
    }

    #[test]
    fn scu_registers_require_word_access() {
        let mut system = system();
        system.write(Mmio::Timer0Compare.address(), 0xFFu8);
        assert_eq!(system.scu.timers.compare, 0);

        system.write(Mmio::Timer0Compare.address(), 0xFFFF_FFFFu32);
        assert_eq!(system.scu.timers.compare, 0x3FF);
    }

    #[test]
    fn status_register_write_ands() {
        let mut system = system();
        system.raise_interrupt(Interrupt::VBlankIn);
        system.raise_interrupt(Interrupt::Timer0);

        system.write(Mmio::InterruptStatus.address(), !(1u32 << Interrupt::Timer0 as u8));

        let status: u32 = system.read(Mmio::InterruptStatus.address());
        assert_eq!(status, 1 << Interrupt::VBlankIn as u8);
    }

    #[test]
    fn dma_runs_end_to_end_through_registers() {
        let mut system = system();
        for i in 0..8u32 {
            system.write(Address(0x0600_0100 + i * 4), 0x5EED_0000 | i);
        }

        system.write(Mmio::Dma0Read.address(), 0x0600_0100u32);
        system.write(Mmio::Dma0Write.address(), 0x0600_0200u32);
        system.write(Mmio::Dma0Count.address(), 8u32);
        system.write(Mmio::Dma0Add.address(), 0x0000_0102u32); // read +4, write +4
        system.write(Mmio::Dma0Mode.address(), 0x0000_0007u32); // software factor
        system.write(Mmio::Dma0Enable.address(), 0x0000_0101u32); // enable + go

        assert!(system.scu.dma[0].active);
        system.scheduler.advance(64);
        system.process_events();

        for i in 0..8u32 {
            let value: u32 = system.read(Address(0x0600_0200 + i * 4));
            assert_eq!(value, 0x5EED_0000 | i);
        }

        let status: u32 = system.read(Mmio::InterruptStatus.address());
        assert_ne!(status & (1 << Interrupt::Dma0End as u8), 0);
    }

    #[test]
    fn dsp_program_loads_through_ports() {
        let mut system = system();
        system.write(Mmio::DspProgramControl.address(), 0x0000_8000u32); // load pc = 0
        system.write(Mmio::DspProgramData.address(), 0xF800_0000u32); // ENDI

        assert_eq!(system.scu.dsp.program[0], 0xF800_0000);

        // reset the program counter, execute and let the driver step it
        system.write(Mmio::DspProgramControl.address(), 0x0001_8000u32);
        system.dsp_step();

        let status: u32 = system.read(Mmio::InterruptStatus.address());
        assert_ne!(status & (1 << Interrupt::DspEnd as u8), 0);
    }
}
