//! Ramping virtual-user executor
//!
//! A control loop samples the stage profile every tick and publishes the
//! target VU count on a `watch` channel. VU slot `i` keeps iterating while
//! `i < target`; it only checks between iterations, so a ramp-down lets
//! in-flight iterations finish. Slots are respawned when the target climbs
//! back above them.

use futures_util::FutureExt;
use reqwest::Client;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::metrics::{MetricsRegistry, builtin};
use super::scenario::Scenario;
use super::stage::StageProfile;
use super::vu::VuContext;

/// Executor tuning
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// How often the target VU count is re-evaluated
    pub tick: Duration,
    /// How long VUs get to finish their iteration once the profile ends
    pub graceful_stop: Duration,
    /// Multiplier applied to every think-time sleep
    pub think_time_scale: f64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
            graceful_stop: Duration::from_secs(30),
            think_time_scale: 1.0,
        }
    }
}

/// Counters collected while the executor ran
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    /// Iterations that ran to completion
    pub iterations_completed: u64,
    /// Iterations whose body returned an error
    pub iterations_failed: u64,
    /// Iterations cut short at graceful-stop expiry
    pub iterations_interrupted: u64,
    /// Highest number of VUs running at the same time
    pub peak_vus: u64,
    /// VU tasks that ended in a panic instead of returning
    pub vus_panicked: u64,
}

#[derive(Default)]
struct Counters {
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Runs a scenario's iteration body according to a stage profile
pub struct RampingVus<S: Scenario> {
    scenario: Arc<S>,
    data: Arc<S::Data>,
    profile: StageProfile,
    client: Client,
    base_url: String,
    metrics: Arc<MetricsRegistry>,
    config: ExecutorConfig,
}

impl<S: Scenario> RampingVus<S> {
    pub fn new(
        scenario: Arc<S>,
        data: Arc<S::Data>,
        profile: StageProfile,
        client: Client,
        base_url: &str,
        metrics: Arc<MetricsRegistry>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            scenario,
            data,
            profile,
            client,
            base_url: base_url.to_string(),
            metrics,
            config,
        }
    }

    /// Drive the profile to completion
    pub async fn run(self) -> ExecutionStats {
        let total = self.profile.total_duration();
        let counters = Arc::new(Counters::default());
        let (target_tx, target_rx) = watch::channel(0u32);
        let mut slots: Vec<Option<JoinHandle<()>>> = Vec::new();
        let mut peak_vus = 0u64;

        self.metrics
            .set_gauge(builtin::VUS_MAX, self.profile.max_target() as f64);
        info!(
            "Ramping up to {} VUs over {:?}",
            self.profile.max_target(),
            total
        );

        let start = Instant::now();
        let mut ticker = tokio::time::interval(self.config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_target = None;
        let mut vus_panicked = 0u64;

        loop {
            ticker.tick().await;
            let elapsed = start.elapsed();
            if elapsed >= total {
                break;
            }

            let target = self.profile.target_at(elapsed);
            target_tx.send_replace(target);
            if last_target != Some(target) {
                debug!("Target VUs at {:?}: {}", elapsed, target);
                last_target = Some(target);
            }

            for idx in 0..target as usize {
                if slots.len() <= idx {
                    slots.push(None);
                }
                let idle = match slots[idx].as_mut() {
                    None => true,
                    Some(handle) if handle.is_finished() => {
                        if let Some(Err(e)) = handle.now_or_never() {
                            vus_panicked += Self::report_join_error(idx, e);
                        }
                        true
                    }
                    Some(_) => false,
                };
                if idle {
                    slots[idx] = Some(self.spawn_vu(idx, target_rx.clone(), counters.clone()));
                }
            }

            let active = slots
                .iter()
                .filter(|slot| slot.as_ref().is_some_and(|h| !h.is_finished()))
                .count() as u64;
            peak_vus = peak_vus.max(active);
            self.metrics.set_gauge(builtin::VUS, active as f64);
        }

        target_tx.send_replace(0);
        let (iterations_interrupted, panicked_at_stop) = self.stop(slots).await;
        vus_panicked += panicked_at_stop;
        self.metrics.set_gauge(builtin::VUS, 0.0);

        ExecutionStats {
            iterations_completed: counters.completed.load(Ordering::SeqCst),
            iterations_failed: counters.failed.load(Ordering::SeqCst),
            iterations_interrupted,
            peak_vus,
            vus_panicked,
        }
    }

    /// Log a VU task that did not return normally. Returns 1 if it panicked.
    fn report_join_error(idx: usize, e: JoinError) -> u64 {
        if e.is_panic() {
            error!("VU {} panicked: {}", idx + 1, e);
            1
        } else {
            debug!("VU {} cancelled: {}", idx + 1, e);
            0
        }
    }

    /// Wait for VUs to finish within the graceful-stop window, then abort the rest.
    ///
    /// Returns `(interrupted iterations, panicked VUs)`.
    async fn stop(&self, slots: Vec<Option<JoinHandle<()>>>) -> (u64, u64) {
        let deadline = Instant::now() + self.config.graceful_stop;
        let mut interrupted = 0;
        let mut panicked = 0;

        for (idx, slot) in slots.into_iter().enumerate() {
            let Some(mut handle) = slot else { continue };
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => panicked += Self::report_join_error(idx, e),
                Err(_) => {
                    handle.abort();
                    interrupted += 1;
                }
            }
        }

        if interrupted > 0 {
            warn!(
                "{} iterations interrupted after {:?} graceful stop",
                interrupted, self.config.graceful_stop
            );
        }
        (interrupted, panicked)
    }

    fn spawn_vu(
        &self,
        idx: usize,
        target_rx: watch::Receiver<u32>,
        counters: Arc<Counters>,
    ) -> JoinHandle<()> {
        let scenario = self.scenario.clone();
        let data = self.data.clone();
        let metrics = self.metrics.clone();
        let mut vu = VuContext::new(
            idx as u64 + 1,
            self.client.clone(),
            &self.base_url,
            metrics.clone(),
            self.config.think_time_scale,
        );

        tokio::spawn(async move {
            while (*target_rx.borrow() as usize) > idx {
                let started = Instant::now();
                match scenario.iteration(&mut vu, &data).await {
                    Ok(()) => {
                        counters.completed.fetch_add(1, Ordering::SeqCst);
                        metrics.add_counter(builtin::ITERATIONS, 1);
                        metrics.add_trend(
                            builtin::ITERATION_DURATION,
                            started.elapsed().as_secs_f64() * 1000.0,
                        );
                    }
                    Err(e) => {
                        counters.failed.fetch_add(1, Ordering::SeqCst);
                        warn!("VU {} iteration {} failed: {}", vu.id(), vu.iteration(), e);
                    }
                }
                vu.next_iteration();
                // An iteration that never awaits must not starve the control loop
                tokio::task::yield_now().await;
            }
            debug!("VU {} stopped after {} iterations", vu.id(), vu.iteration());
        })
    }
}
