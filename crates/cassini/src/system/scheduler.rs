use strum::VariantArray;

/// An event which can be scheduled to happen at a specific time.
///
/// Each variant owns exactly one slot in the scheduler, so rearming an already armed event
/// replaces its previous target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, VariantArray)]
pub enum Event {
    /// End of the current video line.
    Line,
    /// Timer1 has counted down to zero.
    Timer1,
    /// A batch of SCU DMA level 0 transfers.
    ScuDma0,
    /// A batch of SCU DMA level 1 transfers.
    ScuDma1,
    /// A batch of SCU DMA level 2 transfers.
    ScuDma2,
}

impl Event {
    pub const COUNT: usize = Event::VARIANTS.len();

    pub fn scu_dma(level: usize) -> Self {
        debug_assert!(level < 3);
        [Event::ScuDma0, Event::ScuDma1, Event::ScuDma2][level]
    }
}

/// Rational period of a periodic event, in master cycles. The remainder is carried across
/// rearms, so the average period is exactly `num / den` over arbitrarily long runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub num: u64,
    pub den: u64,
    pub rem: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// Absolute cycle at which the event fires.
    pub target: u64,
    pub period: Option<Period>,
}

#[derive(Default)]
pub struct Scheduler {
    pub(crate) elapsed: u64,
    pub(crate) slots: [Option<Slot>; Event::COUNT],
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("elapsed", &self.elapsed)
            .field("armed", &self.slots.iter().flatten().count())
            .finish()
    }
}

impl Scheduler {
    /// Arms `event` to fire once, `after` cycles from now.
    #[inline(always)]
    pub fn schedule(&mut self, event: Event, after: u64) {
        self.slots[event as usize] = Some(Slot {
            target: self.elapsed + after,
            period: None,
        });
    }

    /// Arms `event` to fire every `num / den` cycles.
    pub fn schedule_periodic(&mut self, event: Event, num: u64, den: u64) {
        debug_assert!(den != 0);
        self.slots[event as usize] = Some(Slot {
            target: self.elapsed + num / den,
            period: Some(Period {
                num,
                den,
                rem: num % den,
            }),
        });
    }

    #[inline(always)]
    pub fn cancel(&mut self, event: Event) {
        self.slots[event as usize] = None;
    }

    #[inline(always)]
    pub fn advance(&mut self, count: u64) {
        self.elapsed += count;
    }

    /// How many master cycles have elapsed.
    #[inline(always)]
    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    /// How many cycles until the next armed event is due.
    #[inline(always)]
    pub fn until_next(&self) -> Option<u64> {
        self.slots
            .iter()
            .flatten()
            .map(|slot| slot.target.saturating_sub(self.elapsed))
            .min()
    }

    /// Pops the next due event, rearming it if periodic. Due events are popped in `(target,
    /// slot index)` lexicographic order, which makes firing order deterministic.
    pub fn pop(&mut self) -> Option<Event> {
        let (index, slot) = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.map(|slot| (index, slot)))
            .filter(|(_, slot)| slot.target <= self.elapsed)
            .min_by_key(|&(index, slot)| (slot.target, index))?;

        self.slots[index] = slot.period.map(|mut period| {
            let advance = (period.num + period.rem) / period.den;
            period.rem = (period.num + period.rem) % period.den;

            Slot {
                target: slot.target + advance,
                period: Some(period),
            }
        });

        Some(Event::VARIANTS[index])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fires_in_target_then_index_order() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule(Event::ScuDma0, 10);
        scheduler.schedule(Event::Timer1, 5);
        scheduler.schedule(Event::Line, 10);

        scheduler.advance(10);
        assert_eq!(scheduler.pop(), Some(Event::Timer1));
        assert_eq!(scheduler.pop(), Some(Event::Line));
        assert_eq!(scheduler.pop(), Some(Event::ScuDma0));
        assert_eq!(scheduler.pop(), None);
    }

    #[test]
    fn rearm_replaces_previous_target() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule(Event::Timer1, 5);
        scheduler.schedule(Event::Timer1, 100);

        scheduler.advance(50);
        assert_eq!(scheduler.pop(), None);

        scheduler.advance(50);
        assert_eq!(scheduler.pop(), Some(Event::Timer1));
        assert_eq!(scheduler.pop(), None);
    }

    #[test]
    fn periodic_rearm_is_drift_free() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule_periodic(Event::Line, 3, 2);

        // with a period of 3/2, targets go 1, 3, 4, 6, 7, ... so exactly
        // (1000 * 2 + 1) / 3 = 667 fires are due by cycle 1000
        scheduler.advance(1000);

        let mut fires = 0u64;
        while scheduler.pop().is_some() {
            fires += 1;
        }

        assert_eq!(fires, 667);

        // the next target keeps the exact rational phase
        let slot = scheduler.slots[Event::Line as usize].unwrap();
        assert!(slot.target > 1000);
        assert!(slot.target - 1000 <= 2);
    }

    #[test]
    fn until_next_is_zero_for_due_events() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule(Event::Line, 5);

        assert_eq!(scheduler.until_next(), Some(5));
        scheduler.advance(7);
        assert_eq!(scheduler.until_next(), Some(0));

        scheduler.cancel(Event::Line);
        assert_eq!(scheduler.until_next(), None);
    }
}
