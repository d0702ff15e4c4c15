//! SCU timers. Timer0 counts video lines against a compare value; Timer1 fires a fixed delay
//! after lines select it.

use crate::system::{System, scheduler::Event, scu::Interrupt};
use bitos::bitos;

/// The T1MD register.
#[bitos(32)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerMode {
    #[bits(0)]
    pub enabled: bool,
    /// Arm Timer1 only on lines where Timer0 matched, instead of on every line.
    #[bits(8)]
    pub match_only: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Timers {
    /// Timer0 line counter. Cleared at VBLANK-OUT.
    pub counter: u16,
    /// Timer0 compare value (T0C, 10 bits).
    pub compare: u16,
    /// Timer1 reload value (T1S, 9 bits).
    pub reload: u16,
    pub mode: TimerMode,
}

impl System {
    /// Advances the timers at HBLANK-IN.
    pub(crate) fn timers_line(&mut self) {
        if !self.scu.timers.mode.enabled() {
            return;
        }

        self.scu.timers.counter = (self.scu.timers.counter + 1) & 0x3FF;
        let matched = self.scu.timers.counter == self.scu.timers.compare;
        if matched {
            self.raise_interrupt(Interrupt::Timer0);
        }

        if matched || !self.scu.timers.mode.match_only() {
            // Timer1 counts down from the reload value at a quarter of the master clock
            let delay = u64::from(self.scu.timers.reload) * 4;
            self.scheduler.schedule(Event::Timer1, delay);
        }
    }
}
