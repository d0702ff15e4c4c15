//! Sega Saturn SCU emulator core.
//!
//! The [`System`] struct owns all system state: the cycle scheduler, the bus
//! memories and the System Control Unit with its DMA levels, timers, interrupt
//! fabric and DSP. CPU cores are provided by the embedder through the
//! [`CpuCore`] trait and driven by [`Cassini`], which interleaves them with
//! scheduled events on a shared master-cycle timeline.

pub mod cores;
pub mod probe;
pub mod system;

pub use common::{Address, Primitive};
pub use scudsp;

use crate::{
    cores::{Cores, Limits},
    system::{Config, System, state::SaveState},
};

/// The DSP runs at half the master clock.
const DSP_DIVIDER: u64 = 2;

/// The driver: steps the CPU cores, the DSP and the scheduler in lockstep.
pub struct Cassini {
    pub system: System,
    cores: Cores,
    /// Master cycles accumulated towards the next DSP step.
    dsp_pending: u64,
}

impl Cassini {
    pub fn new(config: Config, cores: Cores) -> Self {
        Self {
            system: System::new(config),
            cores,
            dsp_pending: 0,
        }
    }

    /// Runs the system for at least `cycles` master cycles.
    ///
    /// Execution proceeds in slices bounded by the next scheduled event, so
    /// events are processed at most one slice late. Within a slice the master
    /// core runs first, then the slave, then the DSP catches up.
    pub fn exec(&mut self, cycles: u64) {
        let mut remaining = cycles;
        while remaining > 0 {
            let slice = match self.system.scheduler.until_next() {
                Some(until) => remaining.min(until.max(1)),
                None => remaining,
            };

            let executed = self.cores.master.exec(
                &mut self.system,
                Limits {
                    instructions: u32::MAX,
                    cycles: slice,
                },
            );
            let advanced = executed.cycles.max(1);

            if let Some(slave) = &mut self.cores.slave {
                slave.exec(
                    &mut self.system,
                    Limits {
                        instructions: u32::MAX,
                        cycles: advanced,
                    },
                );
            }

            self.dsp_pending += advanced;
            while self.dsp_pending >= DSP_DIVIDER {
                self.dsp_pending -= DSP_DIVIDER;
                self.system.dsp_step();
            }

            self.system.scheduler.advance(advanced);
            self.system.process_events();
            self.system.drain_external();

            remaining = remaining.saturating_sub(advanced);
        }
    }

    /// Runs the system for a single master cycle.
    pub fn step(&mut self) {
        self.exec(1);
    }

    pub fn save_state(&self) -> SaveState {
        let mut state = self.system.save_state();
        state.dsp_pending = self.dsp_pending;
        state
    }

    pub fn load_state(&mut self, state: &SaveState) -> Result<(), system::state::LoadError> {
        self.system.load_state(state)?;
        self.dsp_pending = state.dsp_pending;
        Ok(())
    }
}
