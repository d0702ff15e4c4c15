use common::Address;

/// Allows the usage of const values in patterns. It's a neat trick!
struct ConstTrick<const N: u16>;
impl<const N: u16> ConstTrick<N> {
    const OUTPUT: u16 = N;
}

macro_rules! mmio {
    ($($addr:expr, $size:expr, $name:ident);* $(;)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u32)]
        pub enum Mmio {
            $(
                $name = ($size << 16) | $addr
            ),*
        }

        impl Mmio {
            #[inline(always)]
            pub fn address(self) -> Address {
                Address(0x25FE_0000 | (self as u32 & 0xFFFF))
            }

            #[inline(always)]
            pub fn size(self) -> u32 {
                (self as u32) >> 16
            }

            /// Given an offset into the `0x25FE_0000` region, returns the MMIO register at that
            /// address and the offset into it.
            pub fn find(offset: u16) -> Option<(Self, usize)> {
                match offset {
                    $(
                        $addr..ConstTrick::<{ $addr + $size }>::OUTPUT => Some((Self::$name, (offset - $addr) as usize)),
                    )*
                    _ => None,
                }
            }
        }
    };
}

mmio! {
    // OFFSET, LENGTH, NAME;

    // DMA level 0
    0x00, 4, Dma0Read;
    0x04, 4, Dma0Write;
    0x08, 4, Dma0Count;
    0x0C, 4, Dma0Add;
    0x10, 4, Dma0Enable;
    0x14, 4, Dma0Mode;

    // DMA level 1
    0x20, 4, Dma1Read;
    0x24, 4, Dma1Write;
    0x28, 4, Dma1Count;
    0x2C, 4, Dma1Add;
    0x30, 4, Dma1Enable;
    0x34, 4, Dma1Mode;

    // DMA level 2
    0x40, 4, Dma2Read;
    0x44, 4, Dma2Write;
    0x48, 4, Dma2Count;
    0x4C, 4, Dma2Add;
    0x50, 4, Dma2Enable;
    0x54, 4, Dma2Mode;

    0x60, 4, DmaForceStop;
    0x7C, 4, DmaStatus;

    // DSP
    0x80, 4, DspProgramControl;
    0x84, 4, DspProgramData;
    0x88, 4, DspDataAddress;
    0x8C, 4, DspDataData;

    // timers
    0x90, 4, Timer0Compare;
    0x94, 4, Timer1Reload;
    0x98, 4, TimerMode;

    // interrupts
    0xA0, 4, InterruptMask;
    0xA4, 4, InterruptStatus;
    0xA8, 4, AbusInterruptAck;

    0xC8, 4, Version;
}

impl Mmio {
    /// DMA level of one of the per-level registers.
    #[inline(always)]
    pub fn dma_level(self) -> usize {
        debug_assert!(self as u32 & 0xFFFF < 0x60);
        ((self as u32 & 0xFFFF) >> 5) as usize
    }
}
