//! The System Control Unit: interrupt fabric, DMA engine, timers and the embedded DSP.

pub mod dma;
pub mod dsp;
pub mod timer;

use crate::system::System;
use bitos::{bitos, integer::u14};
use scudsp::Dsp;
use strum::FromRepr;

/// An internal interrupt source. The discriminant is the status/mask bit index, and vectors are
/// assigned sequentially from `0x40`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum Interrupt {
    VBlankIn = 0,
    VBlankOut = 1,
    HBlankIn = 2,
    Timer0 = 3,
    Timer1 = 4,
    DspEnd = 5,
    SoundRequest = 6,
    SystemManager = 7,
    Pad = 8,
    Dma2End = 9,
    Dma1End = 10,
    Dma0End = 11,
    DmaIllegal = 12,
    SpriteDrawEnd = 13,
}

impl Interrupt {
    /// Priority level presented to the CPU. Higher wins.
    pub fn level(self) -> u8 {
        match self {
            Interrupt::VBlankIn => 0xF,
            Interrupt::VBlankOut => 0xE,
            Interrupt::HBlankIn => 0xD,
            Interrupt::Timer0 => 0xC,
            Interrupt::Timer1 => 0xB,
            Interrupt::DspEnd => 0xA,
            Interrupt::SoundRequest => 0x9,
            Interrupt::SystemManager | Interrupt::Pad => 0x8,
            Interrupt::Dma2End | Interrupt::Dma1End => 0x6,
            Interrupt::Dma0End => 0x5,
            Interrupt::DmaIllegal => 0x3,
            Interrupt::SpriteDrawEnd => 0x2,
        }
    }

    pub fn vector(self) -> u8 {
        0x40 + self as u8
    }

    /// The DMA trigger factor this source maps to, if any.
    pub fn dma_factor(self) -> Option<dma::Factor> {
        Some(match self {
            Interrupt::VBlankIn => dma::Factor::VBlankIn,
            Interrupt::VBlankOut => dma::Factor::VBlankOut,
            Interrupt::HBlankIn => dma::Factor::HBlankIn,
            Interrupt::Timer0 => dma::Factor::Timer0,
            Interrupt::Timer1 => dma::Factor::Timer1,
            Interrupt::SoundRequest => dma::Factor::SoundRequest,
            Interrupt::SpriteDrawEnd => dma::Factor::SpriteDrawEnd,
            _ => return None,
        })
    }
}

/// The interrupt mask register (IMS). Bit 15 gates all sixteen external lines at once.
#[bitos(32)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterruptMask {
    #[bits(0)]
    pub vblank_in: bool,
    #[bits(1)]
    pub vblank_out: bool,
    #[bits(2)]
    pub hblank_in: bool,
    #[bits(3)]
    pub timer0: bool,
    #[bits(4)]
    pub timer1: bool,
    #[bits(5)]
    pub dsp_end: bool,
    #[bits(6)]
    pub sound_request: bool,
    #[bits(7)]
    pub system_manager: bool,
    #[bits(8)]
    pub pad: bool,
    #[bits(9)]
    pub dma2_end: bool,
    #[bits(10)]
    pub dma1_end: bool,
    #[bits(11)]
    pub dma0_end: bool,
    #[bits(12)]
    pub dma_illegal: bool,
    #[bits(13)]
    pub sprite_draw_end: bool,
    #[bits(15)]
    pub external: bool,
}

/// The interrupt status register (IST). Bits 16..32 are the external (A-bus) lines.
#[bitos(32)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterruptStatus {
    #[bits(0..14)]
    pub internal: u14,
    #[bits(16..32)]
    pub external: u16,
}

/// The highest-priority raised and unmasked interrupt, as polled by a CPU core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pending {
    /// Status bit index of the source.
    pub source: u8,
    pub level: u8,
    pub vector: u8,
}

/// SCU state.
pub struct Scu {
    pub mask: InterruptMask,
    pub status: InterruptStatus,
    pub dma: [dma::Channel; 3],
    pub timers: timer::Timers,
    pub dsp: Dsp,
    /// Cursor of the data RAM port (bank in bits 6..8, offset in bits 0..6).
    pub data_addr: u8,
}

impl Default for Scu {
    fn default() -> Self {
        Self {
            // all sources masked out of reset
            mask: InterruptMask::from_bits(0xFFFF_FFFF),
            status: InterruptStatus::default(),
            dma: Default::default(),
            timers: timer::Timers::default(),
            dsp: Dsp::default(),
            data_addr: 0,
        }
    }
}

fn external_level(line: u8) -> u8 {
    match line {
        0..=3 => 7,
        4..=7 => 4,
        _ => 1,
    }
}

impl Scu {
    fn effective_mask(&self) -> u32 {
        let external = if self.mask.external() { 0xFFFF_0000 } else { 0 };
        (self.mask.to_bits() & 0x3FFF) | external
    }

    /// Resolves the highest-priority raised and unmasked source, ties broken towards the lowest
    /// bit index. Never mutates state.
    pub fn pending(&self) -> Option<Pending> {
        let allowed = self.status.to_bits() & !self.effective_mask();

        let mut best: Option<Pending> = None;
        for source in 0..32u8 {
            if allowed & (1 << source) == 0 {
                continue;
            }

            let pending = match Interrupt::from_repr(source) {
                Some(interrupt) => Pending {
                    source,
                    level: interrupt.level(),
                    vector: interrupt.vector(),
                },
                None if source >= 16 => {
                    let line = source - 16;
                    Pending {
                        source,
                        level: external_level(line),
                        vector: 0x50 + line,
                    }
                }
                None => continue,
            };

            if best.is_none_or(|best| pending.level > best.level) {
                best = Some(pending);
            }
        }

        best
    }

    /// IST write semantics: a written 0 clears the bit, a written 1 leaves it raised. The only
    /// way to set a bit is a raise from the source itself.
    pub fn write_status(&mut self, value: u32) {
        self.status = InterruptStatus::from_bits(self.status.to_bits() & value);
    }
}

impl System {
    pub fn raise_interrupt(&mut self, interrupt: Interrupt) {
        let source = interrupt as u8;
        self.scu.status = InterruptStatus::from_bits(self.scu.status.to_bits() | (1 << source));

        tracing::debug!(?interrupt, "interrupt raised");
        if let Some(probe) = &mut self.config.probe {
            probe.interrupt_raised(source);
        }

        if let Some(factor) = interrupt.dma_factor() {
            self.dma_trigger(factor);
        }
    }

    /// Raises A-bus external interrupt line `line` (0..16).
    pub fn raise_external(&mut self, line: u8) {
        debug_assert!(line < 16);
        let source = 16 + (line & 0xF);
        self.scu.status = InterruptStatus::from_bits(self.scu.status.to_bits() | (1 << source));

        tracing::debug!(line, "external interrupt raised");
        if let Some(probe) = &mut self.config.probe {
            probe.interrupt_raised(source);
        }
    }

    /// Acknowledges a source by its status bit index, clearing its status bit.
    pub fn acknowledge_interrupt(&mut self, source: u8) {
        debug_assert!(source < 32);
        self.scu.status = InterruptStatus::from_bits(self.scu.status.to_bits() & !(1 << source));

        if let Some(probe) = &mut self.config.probe {
            probe.interrupt_acknowledged(source);
        }
    }

    /// The highest-priority pending interrupt, polled by CPU cores once per instruction
    /// boundary.
    pub fn pending_interrupt(&self) -> Option<Pending> {
        self.scu.pending()
    }
}
