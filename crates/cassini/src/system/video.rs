//! Video line timing. Rendering is out of scope; only the line counter and the blanking
//! boundaries that drive interrupts and timers are kept.

use strum::FromRepr;

/// Master clock frequency, in Hz.
pub const FREQUENCY: u64 = 28_636_364;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromRepr)]
#[repr(u8)]
pub enum Standard {
    #[default]
    Ntsc = 0,
    Pal = 1,
}

impl Standard {
    pub fn lines_per_frame(self) -> u16 {
        match self {
            Standard::Ntsc => 263,
            Standard::Pal => 313,
        }
    }

    /// First line of the vertical blanking interval.
    pub fn vblank_in_line(self) -> u16 {
        match self {
            Standard::Ntsc => 224,
            Standard::Pal => 256,
        }
    }

    /// Line period as a rational number of master cycles. Integer only; the scheduler carries
    /// the remainder.
    pub fn line_period(self) -> (u64, u64) {
        match self {
            // 60000/1001 fields per second
            Standard::Ntsc => (FREQUENCY * 1001, 60_000 * 263),
            Standard::Pal => (FREQUENCY, 50 * 313),
        }
    }
}

#[derive(Debug, Default)]
pub struct Video {
    pub standard: Standard,
    /// Current line within the frame.
    pub line: u16,
}
