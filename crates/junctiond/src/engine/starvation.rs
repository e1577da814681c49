//! Per-direction starvation tracking.

use junction_common::{Direction, Flow, Lights};

/// Ticks since each direction was last green
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StarvationCounters {
    ticks: [u32; 4],
    threshold: u32,
}

impl StarvationCounters {
    pub fn new(threshold: u32) -> Self {
        Self {
            ticks: [0; 4],
            threshold,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn get(&self, direction: Direction) -> u32 {
        self.ticks[direction.index()]
    }

    #[cfg(test)]
    pub fn set(&mut self, direction: Direction, ticks: u32) {
        self.ticks[direction.index()] = ticks;
    }

    /// Prime `direction` to trip the threshold soon: raise it to at least
    /// `threshold - 1`, never lowering it
    pub fn boost(&mut self, direction: Direction) {
        let floor = self.threshold.saturating_sub(1);
        let ticks = &mut self.ticks[direction.index()];
        *ticks = (*ticks).max(floor);
    }

    /// First direction, in priority order, whose counter exceeds the threshold
    pub fn starving(&self) -> Option<Direction> {
        Direction::ALL
            .into_iter()
            .find(|direction| self.get(*direction) > self.threshold)
    }

    /// Apply a tick's final flow: green directions reset, red ones age
    pub fn record(&mut self, flow: &Flow) -> Lights {
        for direction in Direction::ALL {
            let ticks = &mut self.ticks[direction.index()];
            if flow.get(direction) {
                *ticks = 0;
            } else {
                *ticks = ticks.saturating_add(1);
            }
        }
        Lights::from(*flow)
    }
}
