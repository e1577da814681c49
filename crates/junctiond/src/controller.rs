//! Controller loop and the resources it owns.

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::sync::broadcast;

use junction_common::JunctionError;
use junction_common::constants::STARVATION_THRESHOLD;

use crate::config::AppConfig;
use crate::engine::{DecisionEngine, TickReport};
use crate::hints::HintStore;
use crate::world_state::{WorldStateClient, WorldStore};

/// Outcome of a controller run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Ticks attempted
    pub ticks: u64,
    /// Ticks abandoned on a non-fatal error
    pub aborted: u64,
}

/// Drives one junction's decision engine
pub struct Controller<S> {
    engine: DecisionEngine,
    store: S,
    hints: HintStore,
    tick_interval: Duration,
    startup_delay: Duration,
}

impl Controller<WorldStateClient> {
    /// Build a controller from configuration, connecting to the world-state store
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let junction_id = config.junction_id()?;
        let neighbours = config.neighbours_of(junction_id)?;
        let endpoint = config.world_state.endpoint()?;

        let store = WorldStateClient::connect(&endpoint)
            .await
            .with_context(|| format!("Failed to connect to world-state store at {}", endpoint))?;

        let engine = DecisionEngine::new(
            junction_id,
            neighbours,
            config.protections,
            STARVATION_THRESHOLD,
        );

        Ok(Self::new(
            engine,
            store,
            HintStore::new(&config.hints_dir),
            config.tick_interval(),
        )
        .with_startup_delay(config.startup_delay()))
    }
}

impl<S: WorldStore> Controller<S> {
    pub fn new(engine: DecisionEngine, store: S, hints: HintStore, tick_interval: Duration) -> Self {
        Self {
            engine,
            store,
            hints,
            tick_interval,
            startup_delay: Duration::ZERO,
        }
    }

    /// Pause before the first tick
    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    /// Run a single tick
    pub async fn run_once(&mut self) -> Result<TickReport, JunctionError> {
        self.engine.tick(&mut self.store, &self.hints).await
    }

    /// Wait out the startup delay, then run ticks until `max_iterations` is
    /// reached, a shutdown signal arrives, or the world-state link fails
    ///
    /// The shutdown signal is observed during the startup delay and between
    /// ticks, never mid-tick.
    pub async fn run(
        &mut self,
        max_iterations: Option<u64>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<RunSummary, JunctionError> {
        let mut summary = RunSummary::default();

        tracing::info!(
            junction = self.engine.junction_id(),
            hints_dir = %self.hints.dir().display(),
            threshold = self.engine.counters().threshold(),
            interval = ?self.tick_interval,
            "🚦 Controller loop started"
        );

        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                tracing::info!("🚦 Shutdown before first tick");
                return Ok(summary);
            }
            _ = tokio::time::sleep(self.startup_delay) => {}
        }

        loop {
            if max_iterations.is_some_and(|max| summary.ticks >= max) {
                break;
            }

            summary.ticks += 1;
            match self.run_once().await {
                Ok(report) => {
                    tracing::debug!(
                        tick = summary.ticks,
                        counts = ?report.counts,
                        proposed = ?report.proposed.bits(),
                        flow = ?report.flow.bits(),
                        lights = %report.lights,
                        published = report.published,
                        overridden = ?report.overridden,
                        boosted = ?report.boosted,
                        rejected = ?report.rejected,
                        "Tick complete"
                    );
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!(tick = summary.ticks, error = %e, "Controller loop stopped");
                    return Err(e);
                }
                Err(e) => {
                    summary.aborted += 1;
                    tracing::warn!(tick = summary.ticks, error = %e, "Tick aborted, retrying next tick");
                }
            }

            if max_iterations.is_some_and(|max| summary.ticks >= max) {
                break;
            }

            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("🚦 Controller loop shutting down");
                    break;
                }
                _ = tokio::time::sleep(self.tick_interval) => {}
            }
        }

        Ok(summary)
    }
}
