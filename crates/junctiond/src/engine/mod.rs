//! Decision engine.
//!
//! One call to [`DecisionEngine::tick`] runs the full decision for one tick:
//!
//! 1. **Base flow** from local demand (busier axis wins, ties go east/west)
//! 2. **Hint ingestion** - a neighbour announcing traffic towards us primes
//!    that approach's starvation counter to `threshold - 1`
//! 3. **Starvation override** - the first approach (N, E, S, W) whose counter
//!    exceeds the threshold takes the green for its whole axis
//! 4. **Counters & colours** - green resets a counter, red ages it
//! 5. **Publish** our hint, then write the four lights
//!
//! Neighbour hint problems never fail a tick. World-state errors do.

mod starvation;

pub use starvation::StarvationCounters;

use junction_common::{
    Axis, BranchCounts, Direction, Flow, JunctionError, JunctionId, Lights, NeighbourMap,
    Protections,
};
use tracing::{debug, info, trace, warn};

use crate::hints::{self, HintMode, HintStore};
use crate::world_state::{JunctionState, WorldStore};

/// Proposal from local demand alone
pub fn base_flow(counts: &BranchCounts) -> Flow {
    let north_south = counts.north_south();
    let east_west = counts.east_west();

    if north_south == 0 && east_west == 0 {
        return Flow::ALL_RED;
    }

    if north_south > east_west {
        Flow::axis(Axis::NorthSouth)
    } else {
        Flow::axis(Axis::EastWest)
    }
}

/// What a single tick decided
#[derive(Debug, Clone)]
pub struct TickReport {
    pub counts: BranchCounts,
    /// Proposal before any override
    pub proposed: Flow,
    /// Flow actually applied and published
    pub flow: Flow,
    pub lights: Lights,
    /// Approach that forced its axis green this tick
    pub overridden: Option<Direction>,
    /// Approaches primed by a neighbour hint
    pub boosted: Vec<Direction>,
    /// Approaches whose neighbour hint was discarded
    pub rejected: Vec<Direction>,
    /// False when the hint area was missing and publishing was skipped
    pub published: bool,
}

/// Starvation-avoiding light scheduler for one junction
pub struct DecisionEngine {
    junction_id: JunctionId,
    neighbours: NeighbourMap,
    protections: Protections,
    mode: HintMode,
    junction: JunctionState,
    counters: StarvationCounters,
}

impl DecisionEngine {
    pub fn new(
        junction_id: JunctionId,
        neighbours: NeighbourMap,
        protections: Protections,
        threshold: u32,
    ) -> Self {
        Self {
            junction_id,
            neighbours,
            protections,
            mode: HintMode::from(&protections),
            junction: JunctionState::new(junction_id),
            counters: StarvationCounters::new(threshold),
        }
    }

    pub fn junction_id(&self) -> JunctionId {
        self.junction_id
    }

    pub fn counters(&self) -> &StarvationCounters {
        &self.counters
    }

    #[cfg(test)]
    pub fn counters_mut(&mut self) -> &mut StarvationCounters {
        &mut self.counters
    }

    /// Run one full decision
    pub async fn tick<S: WorldStore>(
        &mut self,
        store: &mut S,
        hints: &HintStore,
    ) -> Result<TickReport, JunctionError> {
        let counts = self.junction.read_counts(store).await?;
        let proposed = base_flow(&counts);

        let (boosted, rejected) = self.ingest_hints(hints).await;

        let overridden = self.counters.starving();
        let flow = match overridden {
            Some(direction) => {
                info!(
                    junction = self.junction_id,
                    direction = %direction,
                    waited = self.counters.get(direction),
                    "Starvation override"
                );
                Flow::axis(direction.axis())
            }
            None => proposed,
        };

        let lights = self.counters.record(&flow);
        info!(junction = self.junction_id, lights = %lights, "Setting lights");

        let published = match self.publish(hints, &flow).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_recoverable() => {
                warn!(
                    junction = self.junction_id,
                    error = %e,
                    "Hint area missing, skipping publish"
                );
                Ok(false)
            }
            Err(e) => Err(e),
        };

        // Lights go out even when the hint write failed.
        self.junction.write_lights(store, &lights).await?;

        Ok(TickReport {
            counts,
            proposed,
            flow,
            lights,
            overridden,
            boosted,
            rejected,
            published: published?,
        })
    }

    /// Read every configured neighbour's hint, priming approaches with
    /// incoming traffic
    async fn ingest_hints(&mut self, hints: &HintStore) -> (Vec<Direction>, Vec<Direction>) {
        let mut boosted = Vec::new();
        let mut rejected = Vec::new();

        for (direction, neighbour) in self.neighbours.iter() {
            let decoded = match hints.read(neighbour).await {
                Ok(Some(raw)) => {
                    debug!(neighbour = neighbour, hint = raw.trim(), "Neighbour hint");
                    hints::decode(&raw, self.mode, neighbour)
                }
                Ok(None) => {
                    trace!(neighbour = neighbour, "No hint published yet");
                    continue;
                }
                Err(e) if e.is_recoverable() => Err(e),
                Err(e) => {
                    debug!(neighbour = neighbour, error = %e, "Hint unreadable, skipping");
                    continue;
                }
            };

            let flow = match decoded {
                Ok(flow) => flow,
                Err(e) => {
                    warn!(
                        junction = self.junction_id,
                        neighbour = neighbour,
                        direction = %direction,
                        error = %e,
                        "Discarding neighbour hint"
                    );
                    rejected.push(direction);
                    continue;
                }
            };

            if flow.get(direction) {
                self.counters.boost(direction);
                boosted.push(direction);
            }
        }

        (boosted, rejected)
    }

    async fn publish(&self, hints: &HintStore, flow: &Flow) -> Result<(), JunctionError> {
        let message = hints::encode(flow, self.mode, self.junction_id);
        hints
            .publish(self.junction_id, &message, self.protections.dos)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world_state::memory::MemoryStore;
    use junction_common::Light;
    use junction_common::constants::STARVATION_THRESHOLD;
    use tempfile::tempdir;

    const T: u32 = STARVATION_THRESHOLD;

    fn counts(north: u32, east: u32, south: u32, west: u32) -> BranchCounts {
        BranchCounts { north, east, south, west }
    }

    fn engine(id: JunctionId, neighbours: NeighbourMap, protections: Protections) -> DecisionEngine {
        DecisionEngine::new(id, neighbours, protections, T)
    }

    #[test]
    fn test_base_flow_idle_is_all_red() {
        assert_eq!(base_flow(&counts(0, 0, 0, 0)), Flow::ALL_RED);
    }

    #[test]
    fn test_base_flow_busier_axis_wins() {
        assert_eq!(base_flow(&counts(3, 1, 0, 1)), Flow::axis(Axis::NorthSouth));
        assert_eq!(base_flow(&counts(0, 0, 0, 1)), Flow::axis(Axis::EastWest));
    }

    #[test]
    fn test_base_flow_tie_goes_east_west() {
        assert_eq!(base_flow(&counts(2, 1, 0, 1)), Flow::axis(Axis::EastWest));
        assert_eq!(base_flow(&counts(4, 4, 4, 4)), Flow::axis(Axis::EastWest));
    }

    #[tokio::test]
    async fn test_counter_ages_while_red_and_resets_on_green() {
        let dir = tempdir().unwrap();
        let hints = HintStore::new(dir.path());
        let mut store = MemoryStore::with_counts(1, counts(0, 3, 0, 3));
        let mut engine = engine(1, NeighbourMap::isolated(), Protections::default());

        for tick in 1..=T {
            let report = engine.tick(&mut store, &hints).await.unwrap();
            assert_eq!(report.overridden, None);
            assert_eq!(engine.counters().get(Direction::North), tick);
            assert_eq!(engine.counters().get(Direction::East), 0);
        }

        // North has now waited exactly T ticks; one more red tick trips it.
        engine.tick(&mut store, &hints).await.unwrap();
        let report = engine.tick(&mut store, &hints).await.unwrap();
        assert_eq!(report.overridden, Some(Direction::North));
        assert_eq!(report.lights.get(Direction::North), Light::Green);
        assert_eq!(report.lights.get(Direction::South), Light::Green);
        assert_eq!(report.lights.get(Direction::East), Light::Red);
        assert_eq!(engine.counters().get(Direction::North), 0);
        assert_eq!(engine.counters().get(Direction::South), 0);

        // Repeated green keeps east at zero.
        let report = engine.tick(&mut store, &hints).await.unwrap();
        assert!(report.flow.get(Direction::East));
        assert_eq!(engine.counters().get(Direction::East), 0);
    }

    #[tokio::test]
    async fn test_override_ignores_local_demand() {
        let dir = tempdir().unwrap();
        let hints = HintStore::new(dir.path());
        let mut store = MemoryStore::with_counts(1, counts(50, 0, 50, 0));
        let mut engine = engine(1, NeighbourMap::isolated(), Protections::default());
        engine.counters_mut().set(Direction::West, T + 1);

        let report = engine.tick(&mut store, &hints).await.unwrap();
        assert_eq!(report.proposed, Flow::axis(Axis::NorthSouth));
        assert_eq!(report.overridden, Some(Direction::West));
        assert_eq!(report.flow, Flow::axis(Axis::EastWest));
        assert_eq!(store.light(1, Direction::North), Some(Light::Red));
        assert_eq!(store.light(1, Direction::West), Some(Light::Green));
    }

    #[tokio::test]
    async fn test_override_priority_north_over_east() {
        let dir = tempdir().unwrap();
        let hints = HintStore::new(dir.path());
        let mut store = MemoryStore::with_counts(1, counts(0, 0, 0, 0));
        let mut engine = engine(1, NeighbourMap::isolated(), Protections::default());
        engine.counters_mut().set(Direction::North, T + 1);
        engine.counters_mut().set(Direction::East, T + 3);

        let report = engine.tick(&mut store, &hints).await.unwrap();
        assert_eq!(report.overridden, Some(Direction::North));
        assert_eq!(report.flow, Flow::axis(Axis::NorthSouth));
        // The losing approach keeps waiting.
        assert_eq!(engine.counters().get(Direction::East), T + 4);

        let report = engine.tick(&mut store, &hints).await.unwrap();
        assert_eq!(report.overridden, Some(Direction::East));
    }

    #[tokio::test]
    async fn test_publishes_own_hint() {
        let dir = tempdir().unwrap();
        let hints = HintStore::new(dir.path());
        let mut store = MemoryStore::with_counts(3, counts(5, 0, 1, 0));
        let mut engine = engine(3, NeighbourMap::isolated(), Protections::default());

        let report = engine.tick(&mut store, &hints).await.unwrap();
        assert!(report.published);
        assert_eq!(hints.read(3).await.unwrap().as_deref(), Some("1 0 1 0"));
    }

    #[tokio::test]
    async fn test_signed_publish() {
        let dir = tempdir().unwrap();
        let hints = HintStore::new(dir.path());
        let mut store = MemoryStore::with_counts(3, counts(0, 2, 0, 0));
        let protections = Protections { dos: false, repudiation: true };
        let mut engine = engine(3, NeighbourMap::isolated(), protections);

        engine.tick(&mut store, &hints).await.unwrap();
        assert_eq!(hints.read(3).await.unwrap().as_deref(), Some("3 0 1 0 1"));
    }

    #[tokio::test]
    async fn test_missing_hint_area_skips_publish_but_sets_lights() {
        let dir = tempdir().unwrap();
        let hints = HintStore::new(dir.path().join("hints"));
        let mut store = MemoryStore::with_counts(1, counts(1, 0, 0, 0));
        let mut engine = engine(1, NeighbourMap::isolated(), Protections::default());

        let report = engine.tick(&mut store, &hints).await.unwrap();
        assert!(!report.published);
        assert_eq!(store.light(1, Direction::North), Some(Light::Green));
        assert!(!hints.dir().exists());
    }

    #[tokio::test]
    async fn test_hint_write_failure_surfaces_after_lights() {
        let dir = tempdir().unwrap();
        let area = dir.path().join("hints");
        std::fs::write(&area, "not a directory").unwrap();
        let hints = HintStore::new(&area);
        let mut store = MemoryStore::with_counts(1, counts(1, 0, 0, 0));
        let mut engine = engine(1, NeighbourMap::isolated(), Protections::default());

        let err = engine.tick(&mut store, &hints).await.unwrap_err();
        assert!(matches!(err, JunctionError::HintIo { .. }));
        assert_eq!(store.writes.len(), 4);
        assert_eq!(store.light(1, Direction::North), Some(Light::Green));
        assert_eq!(store.light(1, Direction::South), Some(Light::Green));
        assert_eq!(store.light(1, Direction::East), Some(Light::Red));
        assert_eq!(store.light(1, Direction::West), Some(Light::Red));
    }

    #[tokio::test]
    async fn test_dos_protection_provisions_hint_area() {
        let dir = tempdir().unwrap();
        let hints = HintStore::new(dir.path().join("hints"));
        let mut store = MemoryStore::with_counts(1, counts(1, 0, 0, 0));
        let protections = Protections { dos: true, repudiation: false };
        let mut engine = engine(1, NeighbourMap::isolated(), protections);

        let report = engine.tick(&mut store, &hints).await.unwrap();
        assert!(report.published);
        assert_eq!(hints.read(1).await.unwrap().as_deref(), Some("1 0 1 0"));
    }

    #[tokio::test]
    async fn test_missing_count_aborts_tick() {
        let dir = tempdir().unwrap();
        let hints = HintStore::new(dir.path());
        let mut store = MemoryStore::default();
        let mut engine = engine(1, NeighbourMap::isolated(), Protections::default());

        let err = engine.tick(&mut store, &hints).await.unwrap_err();
        assert!(matches!(err, JunctionError::NotFound(_)));
        assert!(store.writes.is_empty());
        assert_eq!(engine.counters().get(Direction::North), 0);
    }

    #[tokio::test]
    async fn test_neighbour_hint_boosts_facing_approach() {
        let dir = tempdir().unwrap();
        let hints = HintStore::new(dir.path());
        hints.publish(2, "0 1 0 1", false).await.unwrap();

        let mut store = MemoryStore::with_counts(1, counts(0, 0, 0, 0));
        let neighbours = NeighbourMap::isolated().with(Direction::East, 2);
        let mut engine = engine(1, neighbours, Protections::default());

        let report = engine.tick(&mut store, &hints).await.unwrap();
        assert_eq!(report.boosted, vec![Direction::East]);
        // Primed to T - 1, then aged by this red tick.
        assert_eq!(engine.counters().get(Direction::East), T);
        assert_eq!(engine.counters().get(Direction::North), 1);
    }

    #[tokio::test]
    async fn test_neighbour_hint_with_clear_bit_has_no_effect() {
        let dir = tempdir().unwrap();
        let hints = HintStore::new(dir.path());
        hints.publish(2, "1 0 1 0", false).await.unwrap();

        let mut store = MemoryStore::with_counts(1, counts(0, 0, 0, 0));
        let neighbours = NeighbourMap::isolated().with(Direction::East, 2);
        let mut engine = engine(1, neighbours, Protections::default());

        let report = engine.tick(&mut store, &hints).await.unwrap();
        assert!(report.boosted.is_empty());
        assert_eq!(engine.counters().get(Direction::East), 1);
    }

    #[tokio::test]
    async fn test_malformed_hint_is_discarded() {
        let dir = tempdir().unwrap();
        let hints = HintStore::new(dir.path());
        let mut store = MemoryStore::with_counts(1, counts(0, 0, 0, 0));
        let neighbours = NeighbourMap::isolated().with(Direction::East, 2);

        for raw in ["0 1 0", "0 1 0 1 1"] {
            hints.publish(2, raw, false).await.unwrap();
            let mut engine = engine(1, neighbours, Protections::default());

            let report = engine.tick(&mut store, &hints).await.unwrap();
            assert_eq!(report.rejected, vec![Direction::East]);
            assert!(report.boosted.is_empty());
            assert_eq!(engine.counters().get(Direction::East), 1);
        }
    }

    #[tokio::test]
    async fn test_undecodable_hint_record_is_rejected() {
        let dir = tempdir().unwrap();
        let hints = HintStore::new(dir.path());
        std::fs::write(hints.record_path(2), b"0 \xff 0 1").unwrap();

        let mut store = MemoryStore::with_counts(1, counts(0, 0, 0, 0));
        let neighbours = NeighbourMap::isolated().with(Direction::East, 2);
        let mut engine = engine(1, neighbours, Protections::default());

        let report = engine.tick(&mut store, &hints).await.unwrap();
        assert_eq!(report.rejected, vec![Direction::East]);
        assert!(report.boosted.is_empty());
        assert_eq!(engine.counters().get(Direction::East), 1);
    }

    #[tokio::test]
    async fn test_spoofed_signature_is_discarded() {
        let dir = tempdir().unwrap();
        let hints = HintStore::new(dir.path());
        hints.publish(2, "9 0 1 0 1", false).await.unwrap();

        let mut store = MemoryStore::with_counts(1, counts(0, 0, 0, 0));
        let neighbours = NeighbourMap::isolated().with(Direction::East, 2);
        let protections = Protections { dos: false, repudiation: true };
        let mut engine = engine(1, neighbours, protections);

        let report = engine.tick(&mut store, &hints).await.unwrap();
        assert_eq!(report.rejected, vec![Direction::East]);
        assert_eq!(engine.counters().get(Direction::East), 1);

        hints.publish(2, "2 0 1 0 1", false).await.unwrap();
        let report = engine.tick(&mut store, &hints).await.unwrap();
        assert_eq!(report.boosted, vec![Direction::East]);
    }

    #[tokio::test]
    async fn test_neighbour_hint_forces_green_before_idle_rotation() {
        let dir = tempdir().unwrap();
        let hints = HintStore::new(dir.path());
        hints.publish(2, "0 1 0 1", false).await.unwrap();

        let mut store = MemoryStore::with_counts(1, counts(0, 0, 0, 0));
        let neighbours = NeighbourMap::isolated().with(Direction::East, 2);
        let mut engine = engine(1, neighbours, Protections::default());

        let first = engine.tick(&mut store, &hints).await.unwrap();
        assert_eq!(first.flow, Flow::ALL_RED);
        assert_eq!(engine.counters().get(Direction::East), T);

        let mut green_at = None;
        for tick in 1..=T {
            let report = engine.tick(&mut store, &hints).await.unwrap();
            if let Some(direction) = report.overridden {
                assert_eq!(direction, Direction::East);
                green_at = Some(tick);
                break;
            }
        }

        assert_eq!(green_at, Some(2));
        assert_eq!(store.light(1, Direction::East), Some(Light::Green));
        assert_eq!(store.light(1, Direction::West), Some(Light::Green));
        assert_eq!(store.light(1, Direction::North), Some(Light::Red));
        assert_eq!(engine.counters().get(Direction::East), 0);
    }
}
