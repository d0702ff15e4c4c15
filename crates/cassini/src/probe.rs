use common::Address;

/// Observability hooks into the interrupt fabric and DMA engines.
///
/// All methods default to no-ops. A probe must never be required for correct operation and must
/// not affect timing.
pub trait Probe: Send {
    /// An interrupt source was raised. `source` is the status bit index (16..32 for the external
    /// lines).
    fn interrupt_raised(&mut self, source: u8) {
        let _ = source;
    }

    /// An interrupt source was acknowledged by a CPU.
    fn interrupt_acknowledged(&mut self, source: u8) {
        let _ = source;
    }

    /// A DMA channel finished its transfer.
    fn dma_completed(&mut self, level: usize) {
        let _ = level;
    }

    /// The DSP DMA sub-engine moved a word. `addr` is the bus-side address; `to_d0` is set for
    /// transfers out of DSP memory.
    fn dsp_dma_transferred(&mut self, addr: Address, value: u32, to_d0: bool) {
        let _ = (addr, value, to_d0);
    }
}
