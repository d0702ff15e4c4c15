use crate::system::System;

#[derive(Debug, Default, Clone, Copy)]
pub struct Executed {
    pub instructions: u64,
    pub cycles: u64,
}

/// Limits for CPU core execution.
pub struct Limits {
    /// A hard-limit on how many instructions can be executed. This means that the number of
    /// executed instructions must always be less than or equal to this value.
    pub instructions: u32,
    /// A soft-limit on how many cycles can be executed. This means that the number of executed
    /// cycles can be less than this value or, at most, slightly above it.
    pub cycles: u64,
}

/// Trait for SH-2 CPU cores.
///
/// A core is expected to poll [`System::pending_interrupt`] at instruction boundaries and call
/// [`System::acknowledge_interrupt`] when it accepts an interrupt.
pub trait CpuCore {
    /// Drives the CPU core forward within specific limits.
    fn exec(&mut self, sys: &mut System, limits: Limits) -> Executed;
}

/// Cores that emulate system components.
pub struct Cores {
    pub master: Box<dyn CpuCore>,
    pub slave: Option<Box<dyn CpuCore>>,
}
