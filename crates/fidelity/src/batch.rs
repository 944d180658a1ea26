//! Runs independent design units in fixed-size batches.
//!
//! A batch starts only after every unit of the previous batch has settled, and
//! one unit's failure never cancels its neighbours. Rate-limited units are
//! retried after `retry_delay` until `retry_attempts` is used up.

use futures::future::join_all;
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::spawn_blocking;
use tokio::time::sleep;

use crate::config::FidelityConfig;
use crate::convergence::{ConvergenceOutcome, converge};
use crate::error::{FidelityError, Result};
use crate::workspace::DesignWorkspace;

/// How one unit ended.
#[derive(Debug)]
pub struct UnitOutcome<T> {
    pub unit: String,
    /// Runs performed, retries included.
    pub attempts: u32,
    pub result: Result<T>,
}

impl<T> UnitOutcome<T> {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Serializable digest of a workflow unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitDigest {
    pub unit: String,
    pub attempts: u32,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_reached: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&UnitOutcome<ConvergenceOutcome>> for UnitDigest {
    fn from(outcome: &UnitOutcome<ConvergenceOutcome>) -> Self {
        let (final_score, target_reached, error) = match &outcome.result {
            Ok(run) => (Some(run.final_score), Some(run.target_reached), None),
            Err(err) => (None, None, Some(err.to_string())),
        };
        Self {
            unit: outcome.unit.clone(),
            attempts: outcome.attempts,
            succeeded: outcome.result.is_ok(),
            final_score,
            target_reached,
            error,
        }
    }
}

/// Run `runner` over every `(name, input)` pair on blocking workers.
///
/// Outcomes come back in input order.
pub async fn run_batches<I, T, F>(units: Vec<(String, I)>, config: &FidelityConfig, runner: F) -> Vec<UnitOutcome<T>>
where
    I: Clone + Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Result<T> + Send + Sync + 'static,
{
    let runner = Arc::new(runner);
    let batch_size = config.batch_concurrency.max(1);
    let batch_count = units.len().div_ceil(batch_size);
    let mut outcomes = Vec::with_capacity(units.len());

    for (index, batch) in units.chunks(batch_size).enumerate() {
        info!(
            "[BATCH] batch {}/{batch_count}: {} units",
            index + 1,
            batch.len()
        );
        let settled = join_all(batch.iter().map(|(name, input)| {
            run_unit(name.clone(), input.clone(), config, Arc::clone(&runner))
        }))
        .await;
        let failures = settled.iter().filter(|outcome| !outcome.succeeded()).count();
        if failures > 0 {
            warn!("[BATCH] batch {}: {failures} units failed", index + 1);
        }
        outcomes.extend(settled);
    }
    outcomes
}

async fn run_unit<I, T, F>(unit: String, input: I, config: &FidelityConfig, runner: Arc<F>) -> UnitOutcome<T>
where
    I: Clone + Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Result<T> + Send + Sync + 'static,
{
    let max_attempts = config.retry_attempts.max(1);
    let mut attempts = 0;
    loop {
        attempts += 1;
        let worker_runner = Arc::clone(&runner);
        let worker_input = input.clone();
        let result = spawn_blocking(move || worker_runner(worker_input))
            .await
            .unwrap_or_else(|err| {
                Err(FidelityError::Task {
                    unit: unit.clone(),
                    reason: err.to_string(),
                })
            });

        match result {
            Err(err) if err.is_rate_limited() && attempts < max_attempts => {
                warn!(
                    "[BATCH] {unit} rate limited (attempt {attempts}/{max_attempts}), retrying in {}s",
                    config.retry_delay_secs
                );
                sleep(config.retry_delay()).await;
            }
            result => {
                if let Err(err) = &result {
                    warn!("[BATCH] {unit} failed after {attempts} attempts: {err}");
                }
                return UnitOutcome {
                    unit,
                    attempts,
                    result,
                };
            }
        }
    }
}

/// Run the convergence loop for every workspace.
pub async fn run_workflows(workspaces: Vec<DesignWorkspace>, config: &FidelityConfig) -> Vec<UnitOutcome<ConvergenceOutcome>> {
    let units = workspaces
        .into_iter()
        .map(|workspace| (workspace.label(), workspace))
        .collect();
    let loop_config = config.clone();
    run_batches(units, config, move |workspace| converge(workspace, &loop_config)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;
    use tokio::time::Instant;

    fn named(count: u32) -> Vec<(String, u32)> {
        (0..count).map(|index| (format!("unit-{index}"), index)).collect()
    }

    #[tokio::test]
    async fn failures_do_not_abort_the_batch() {
        let config = FidelityConfig::default();
        let outcomes = run_batches(named(5), &config, |index| {
            if index == 1 {
                Err(FidelityError::NotFound {
                    path: "missing.json".into(),
                })
            } else {
                Ok(index * 10)
            }
        })
        .await;
        assert_eq!(outcomes.len(), 5);
        assert!(!outcomes[1].succeeded());
        let values: Vec<u32> = outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().ok().copied())
            .collect();
        assert_eq!(values, [0, 20, 30, 40]);
        assert_eq!(outcomes[4].unit, "unit-4");
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Event {
        Started(u32),
        Finished(u32),
    }

    #[tokio::test]
    async fn batches_run_one_after_another() {
        let config = FidelityConfig {
            batch_concurrency: 2,
            ..FidelityConfig::default()
        };
        let events = Arc::new(Mutex::new(Vec::<Event>::new()));
        let recorder = Arc::clone(&events);
        let record = move |event: Event| {
            if let Ok(mut entries) = recorder.lock() {
                entries.push(event);
            }
        };
        run_batches(named(4), &config, move |index| {
            record(Event::Started(index));
            if index == 0 {
                thread::sleep(Duration::from_millis(100));
            }
            record(Event::Finished(index));
            Ok(())
        })
        .await;

        let timeline = events.lock().map(|entries| entries.clone()).unwrap_or_default();
        assert_eq!(timeline.len(), 8);
        let position = |wanted: Event| timeline.iter().position(|event| *event == wanted);
        let first_batch_done = [position(Event::Finished(0)), position(Event::Finished(1))];
        for later in [2, 3] {
            let started = position(Event::Started(later));
            assert!(started.is_some());
            for done in first_batch_done {
                assert!(done.is_some() && done < started, "unit {later} started before batch 1 settled");
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_units_retry_then_give_up() {
        let config = FidelityConfig {
            retry_attempts: 3,
            ..FidelityConfig::default()
        };
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let started = Instant::now();
        let outcomes = run_batches(named(1), &config, move |_| -> Result<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(FidelityError::RateLimited {
                message: "429".to_owned(),
            })
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcomes[0].attempts, 3);
        assert!(matches!(outcomes[0].result, Err(FidelityError::RateLimited { .. })));
        assert!(started.elapsed() >= Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_recovers_on_retry() {
        let config = FidelityConfig::default();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let outcomes = run_batches(named(1), &config, move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(FidelityError::RateLimited {
                    message: "slow down".to_owned(),
                })
            } else {
                Ok("done")
            }
        })
        .await;
        assert_eq!(outcomes[0].attempts, 2);
        assert!(matches!(outcomes[0].result, Ok("done")));
    }
}
