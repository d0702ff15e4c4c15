//! State of the emulator.

pub mod bus;
pub mod external;
pub mod scheduler;
pub mod scu;
pub mod state;
pub mod video;

use crate::{
    probe::Probe,
    system::{
        bus::Bus,
        external::ExternalTrigger,
        scheduler::{Event, Scheduler},
        scu::{Interrupt, Scu},
        video::{Standard, Video},
    },
};

pub type Callback = Box<dyn FnMut() + Send + Sync + 'static>;

/// System configuration.
pub struct Config {
    pub standard: Standard,
    /// Invoked at the top of each vertical blank.
    pub vsync_callback: Option<Callback>,
    /// Observability hooks. Never affects timing.
    pub probe: Option<Box<dyn Probe>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            standard: Standard::default(),
            vsync_callback: None,
            probe: None,
        }
    }
}

/// System state.
pub struct System {
    /// System configuration.
    pub config: Config,
    /// Scheduler for events.
    pub scheduler: Scheduler,
    /// Memories reachable over the bus.
    pub bus: Bus,
    /// The System Control Unit.
    pub scu: Scu,
    /// Video line timing.
    pub video: Video,
    /// Latch for interrupts posted from other threads.
    external: ExternalTrigger,
}

impl System {
    pub fn new(config: Config) -> Self {
        let mut system = System {
            video: Video {
                standard: config.standard,
                line: 0,
            },
            config,
            scheduler: Scheduler::default(),
            bus: Bus::default(),
            scu: Scu::default(),
            external: ExternalTrigger::default(),
        };

        let (num, den) = system.video.standard.line_period();
        system.scheduler.schedule_periodic(Event::Line, num, den);
        system
    }

    /// Returns a cloneable handle for posting external interrupts from other threads.
    pub fn external_trigger(&self) -> ExternalTrigger {
        self.external.clone()
    }

    /// Drains interrupts posted from other threads onto the timeline. Called at a fixed point
    /// of each execution slice.
    pub fn drain_external(&mut self) {
        let lines = self.external.drain_lines();
        for line in 0..16 {
            if lines & (1 << line) != 0 {
                self.raise_external(line);
            }
        }

        if self.external.drain_sound_request() {
            self.raise_interrupt(Interrupt::SoundRequest);
        }
    }

    /// Processes the given event.
    pub fn process(&mut self, event: Event) {
        match event {
            Event::Line => self.video_line(),
            Event::Timer1 => self.raise_interrupt(Interrupt::Timer1),
            Event::ScuDma0 => self.dma_step(0),
            Event::ScuDma1 => self.dma_step(1),
            Event::ScuDma2 => self.dma_step(2),
        }
    }

    /// Processes all due events, in `(target, slot index)` order.
    pub fn process_events(&mut self) {
        while let Some(event) = self.scheduler.pop() {
            self.process(event);
        }
    }

    fn video_line(&mut self) {
        self.raise_interrupt(Interrupt::HBlankIn);
        self.timers_line();

        self.video.line += 1;
        if self.video.line >= self.video.standard.lines_per_frame() {
            self.video.line = 0;
        }

        if self.video.line == 0 {
            self.scu.timers.counter = 0;
            self.raise_interrupt(Interrupt::VBlankOut);
            if let Some(callback) = &mut self.config.vsync_callback {
                callback();
            }
        } else if self.video.line == self.video.standard.vblank_in_line() {
            self.raise_interrupt(Interrupt::VBlankIn);
        }
    }

    /// Resets the system to its power-on state, at a step boundary. RAM and DSP memories
    /// persist, matching the hardware.
    pub fn reset(&mut self) {
        self.scheduler = Scheduler::default();
        self.video.line = 0;

        self.scu.mask = scu::InterruptMask::from_bits(0xFFFF_FFFF);
        self.scu.status = scu::InterruptStatus::default();
        self.scu.dma = Default::default();
        self.scu.timers = scu::timer::Timers::default();
        self.scu.data_addr = 0;
        self.scu.dsp.reset();

        let (num, den) = self.video.standard.line_period();
        self.scheduler.schedule_periodic(Event::Line, num, den);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    #[test]
    fn line_events_raise_blanking_interrupts() {
        let frames = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&frames);

        let mut system = System::new(Config {
            vsync_callback: Some(Box::new(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            })),
            ..Config::default()
        });
        system.scu.mask = scu::InterruptMask::from_bits(0);

        // a bit over one NTSC frame
        let (num, den) = Standard::Ntsc.line_period();
        for _ in 0..264 {
            system.scheduler.advance(num / den + 1);
            system.process_events();
        }

        assert_eq!(frames.load(Ordering::Relaxed), 1);

        let status = system.scu.status.to_bits();
        assert_ne!(status & (1 << Interrupt::HBlankIn as u8), 0);
        assert_ne!(status & (1 << Interrupt::VBlankIn as u8), 0);
        assert_ne!(status & (1 << Interrupt::VBlankOut as u8), 0);
    }

    #[test]
    fn external_triggers_drain_on_the_timeline() {
        let mut system = System::new(Config::default());
        system.scu.mask = scu::InterruptMask::from_bits(0);

        let trigger = system.external_trigger();
        trigger.trigger_line(4);
        trigger.trigger_sound_request();

        // nothing is visible until the drain point
        assert_eq!(system.pending_interrupt(), None);

        system.drain_external();
        let pending = system.pending_interrupt().unwrap();
        assert_eq!(pending.vector, 0x46); // sound request outranks external line 4
        system.acknowledge_interrupt(pending.source);

        let pending = system.pending_interrupt().unwrap();
        assert_eq!(pending.vector, 0x54);
        assert_eq!(pending.level, 4);
    }

    #[test]
    fn reset_rearms_the_line_event() {
        let mut system = System::new(Config::default());
        system.scu.mask = scu::InterruptMask::from_bits(0);
        system.scheduler.advance(100_000);
        system.process_events();

        system.reset();
        assert_eq!(system.scu.status.to_bits(), 0);
        assert_eq!(system.video.line, 0);
        assert!(system.scheduler.until_next().is_some());
        assert_eq!(system.pending_interrupt(), None);
    }
}
