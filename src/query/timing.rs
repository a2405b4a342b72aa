//! Pacing and run invalidation.
//!
//! Every run is issued a [`RunToken`] by the [`RunEpoch`]. Starting another
//! run advances the epoch, which wakes any suspended pause of the old token
//! and makes every later liveness check fail. The interpreter only suspends
//! inside [`RunToken::pause`], so a stale run notices at its next suspension
//! point at the latest.

use std::time::Duration;

use tokio::sync::watch;

use crate::types::{Result, RunId, SimError};

/// Delays applied between steps and between rows inside a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pacing {
    /// Pause after every step.
    pub step_gap: Duration,
    /// Pause per row of a sequential scan.
    pub scan_row: Duration,
    /// Pause per row of a standalone filter pass.
    pub filter_row: Duration,
    /// Pause per (left, right) pair of a nested-loop match.
    pub match_pair: Duration,
    /// Pause for a single key-index seek.
    pub seek_latency: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            step_gap: Duration::from_millis(400),
            scan_row: Duration::from_millis(200),
            filter_row: Duration::from_millis(300),
            match_pair: Duration::from_millis(100),
            seek_latency: Duration::from_millis(800),
        }
    }
}

impl Pacing {
    /// No delays at all. Runs still yield at every suspension point.
    pub fn instant() -> Self {
        Self {
            step_gap: Duration::ZERO,
            scan_row: Duration::ZERO,
            filter_row: Duration::ZERO,
            match_pair: Duration::ZERO,
            seek_latency: Duration::ZERO,
        }
    }

    /// Divides every delay by `speed` (2.0 plays twice as fast).
    pub fn with_speed(self, speed: f64) -> Result<Self> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(SimError::InvalidOwned(format!(
                "speed must be a positive finite number (got {speed})"
            )));
        }
        let scale = |d: Duration| {
            Duration::try_from_secs_f64(d.as_secs_f64() / speed).map_err(|_| {
                SimError::InvalidOwned(format!("speed {speed} makes a delay of {d:?} unrepresentable"))
            })
        };
        Ok(Self {
            step_gap: scale(self.step_gap)?,
            scan_row: scale(self.scan_row)?,
            filter_row: scale(self.filter_row)?,
            match_pair: scale(self.match_pair)?,
            seek_latency: scale(self.seek_latency)?,
        })
    }

    /// A seek must look slower than a single scanned row unless pacing is off.
    pub fn validate(&self) -> Result<()> {
        if *self == Self::instant() {
            return Ok(());
        }
        if self.seek_latency <= self.scan_row {
            return Err(SimError::Invalid(
                "seek latency must exceed the per-row scan delay",
            ));
        }
        Ok(())
    }
}

/// Generation counter shared by every run of one simulator.
#[derive(Debug)]
pub struct RunEpoch {
    current: watch::Sender<u64>,
}

impl Default for RunEpoch {
    fn default() -> Self {
        Self::new()
    }
}

impl RunEpoch {
    /// Creates an epoch at generation zero (no run issued yet).
    pub fn new() -> Self {
        let (current, _) = watch::channel(0);
        Self { current }
    }

    /// Invalidates the live token (if any) and issues the next one.
    pub fn advance(&self) -> RunToken {
        let mut issued = 0;
        self.current.send_modify(|generation| {
            *generation += 1;
            issued = *generation;
        });
        RunToken {
            id: RunId(issued),
            current: self.current.subscribe(),
        }
    }

    /// Identifier of the most recently issued run.
    pub fn live(&self) -> Option<RunId> {
        let generation = *self.current.borrow();
        (generation > 0).then_some(RunId(generation))
    }
}

/// Capability held by one run; dead as soon as a newer run is issued.
#[derive(Debug)]
pub struct RunToken {
    id: RunId,
    current: watch::Receiver<u64>,
}

impl RunToken {
    /// Run identifier.
    pub fn id(&self) -> RunId {
        self.id
    }

    /// Returns `true` while no newer run has been issued.
    pub fn is_live(&self) -> bool {
        *self.current.borrow() == self.id.0
    }

    /// Fails with [`SimError::Cancelled`] if the token went stale.
    pub fn ensure_live(&self) -> Result<()> {
        if self.is_live() {
            Ok(())
        } else {
            Err(SimError::Cancelled)
        }
    }

    /// Suspends for `delay`, waking early if the run is invalidated.
    ///
    /// A zero delay still yields to the scheduler so other runs interleave.
    pub async fn pause(&mut self, delay: Duration) -> Result<()> {
        self.ensure_live()?;
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = self.current.changed() => {
                    if changed.is_err() {
                        return Err(SimError::Cancelled);
                    }
                }
            }
        }
        self.ensure_live()
    }
}
