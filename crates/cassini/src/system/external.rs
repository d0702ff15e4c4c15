use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU16, Ordering},
};

#[derive(Default)]
struct Shared {
    lines: AtomicU16,
    sound_request: AtomicBool,
}

/// A cloneable, thread-safe handle for posting interrupts onto the main timeline.
///
/// The SCSP and CD block collaborators may run on their own threads; they never mutate SCU state
/// directly. Posted lines are latched here and drained synchronously at a fixed point of each
/// execution slice, keeping event ordering on the single logical timeline.
#[derive(Clone, Default)]
pub struct ExternalTrigger {
    shared: Arc<Shared>,
}

impl ExternalTrigger {
    /// Posts A-bus external interrupt line `line` (0..16).
    pub fn trigger_line(&self, line: u8) {
        debug_assert!(line < 16);
        self.shared
            .lines
            .fetch_or(1 << (line & 0xF), Ordering::Release);
    }

    /// Posts an SCSP sound request.
    pub fn trigger_sound_request(&self) {
        self.shared.sound_request.store(true, Ordering::Release);
    }

    pub(crate) fn drain_lines(&self) -> u16 {
        self.shared.lines.swap(0, Ordering::Acquire)
    }

    pub(crate) fn drain_sound_request(&self) -> bool {
        self.shared.sound_request.swap(false, Ordering::Acquire)
    }
}
