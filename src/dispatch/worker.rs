use super::agent::{AttemptResult, FixAgent};
use super::render;
use crate::config::WorkerConfig;
use crate::types::WorkUnit;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Retry ceiling and backoff schedule for a work unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base: Duration::from_secs(1),
        }
    }
}

impl From<&WorkerConfig> for RetryPolicy {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff_base: Duration::from_secs_f64(config.backoff_base_secs),
        }
    }
}

impl RetryPolicy {
    /// Delay after the failed attempt with 0-based index `attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Terminal state of a work unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Succeeded,
    ExhaustedRetries,
}

/// Result of driving one work unit to a terminal state
#[derive(Debug, Clone, Serialize)]
pub struct UnitOutcome {
    /// Position of the unit in the dispatched list
    pub index: usize,
    pub description: String,
    pub status: UnitStatus,
    pub attempts: u32,
    /// Backoff slept after each failed attempt, in seconds
    pub backoff_secs: Vec<f64>,
    /// Diagnostic of the most recent failed attempt
    pub last_error: Option<String>,
    pub elapsed_secs: f64,
}

/// Run one unit through the fix agent until it succeeds or attempts run out
///
/// Attempts are strictly sequential. Each failure is followed by an
/// exponential backoff sleep which only suspends this unit.
pub async fn run_unit(
    index: usize,
    unit: &WorkUnit,
    agent: &dyn FixAgent,
    policy: &RetryPolicy,
) -> UnitOutcome {
    let start = Instant::now();
    let description = unit.description();
    info!("[Unit {}] Starting: {}", index, description);

    let prompt = render::build_prompt(unit);
    let mut backoff_secs = Vec::new();
    let mut last_error = None;

    for attempt in 0..policy.max_attempts {
        debug!(
            "[Unit {}] Attempt {}/{}",
            index,
            attempt + 1,
            policy.max_attempts
        );
        match agent.attempt(unit, &prompt).await {
            AttemptResult::Success => {
                let elapsed = start.elapsed().as_secs_f64();
                info!("[Unit {}] Done: {} ({:.2}s)", index, description, elapsed);
                return UnitOutcome {
                    index,
                    description,
                    status: UnitStatus::Succeeded,
                    attempts: attempt + 1,
                    backoff_secs,
                    last_error,
                    elapsed_secs: elapsed,
                };
            }
            AttemptResult::Failure { diagnostic } => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "[Unit {}] {} failed (attempt {}/{}), backing off {:.1}s: {}",
                    index,
                    description,
                    attempt + 1,
                    policy.max_attempts,
                    delay.as_secs_f64(),
                    diagnostic
                );
                last_error = Some(diagnostic);
                backoff_secs.push(delay.as_secs_f64());
                tokio::time::sleep(delay).await;
            }
        }
    }

    let elapsed = start.elapsed().as_secs_f64();
    error!(
        "[Unit {}] Failed: {} - exhausted {} attempts ({:.2}s)",
        index, description, policy.max_attempts, elapsed
    );
    UnitOutcome {
        index,
        description,
        status: UnitStatus::ExhaustedRetries,
        attempts: policy.max_attempts,
        backoff_secs,
        last_error,
        elapsed_secs: elapsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::violation;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Fails the first `failures` attempts, recording when each attempt starts
    struct ScriptedAgent {
        failures: usize,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedAgent {
        fn new(failures: usize) -> Self {
            Self {
                failures,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl FixAgent for ScriptedAgent {
        async fn attempt(&self, _unit: &WorkUnit, _prompt: &str) -> AttemptResult {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Instant::now());
            if calls.len() <= self.failures {
                AttemptResult::failure(format!("exit status 1 (call {})", calls.len()))
            } else {
                AttemptResult::Success
            }
        }
    }

    fn unit() -> WorkUnit {
        WorkUnit::new("a.py".into(), "foo".into(), vec![violation("a.py", 5, "F841")])
    }

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (0..5).map(|i| policy.delay_for(i).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16]);

        let half = RetryPolicy {
            max_attempts: 3,
            backoff_base: Duration::from_millis(500),
        };
        assert_eq!(half.delay_for(2), Duration::from_secs(2));
    }

    #[test]
    fn test_policy_from_config() {
        let config = WorkerConfig {
            concurrency: 2,
            max_attempts: 3,
            backoff_base_secs: 0.25,
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff_base, Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success() {
        let agent = ScriptedAgent::new(0);
        let outcome = run_unit(0, &unit(), &agent, &RetryPolicy::default()).await;

        assert_eq!(outcome.status, UnitStatus::Succeeded);
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.backoff_secs.is_empty());
        assert!(outcome.last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_retries() {
        let agent = ScriptedAgent::new(2);
        let outcome = run_unit(3, &unit(), &agent, &RetryPolicy::default()).await;

        assert_eq!(outcome.index, 3);
        assert_eq!(outcome.status, UnitStatus::Succeeded);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.backoff_secs, vec![1.0, 2.0]);
        assert_eq!(outcome.last_error.as_deref(), Some("exit status 1 (call 2)"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_unit_follows_backoff_schedule() {
        let agent = ScriptedAgent::new(usize::MAX);
        let start = Instant::now();
        let outcome = run_unit(0, &unit(), &agent, &RetryPolicy::default()).await;
        let total = start.elapsed();

        assert_eq!(outcome.status, UnitStatus::ExhaustedRetries);
        assert_eq!(outcome.attempts, 5);
        assert_eq!(outcome.backoff_secs, vec![1.0, 2.0, 4.0, 8.0, 16.0]);

        let calls = agent.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 5);
        let tolerance = Duration::from_millis(50);
        for (i, pair) in calls.windows(2).enumerate() {
            let gap = pair[1] - pair[0];
            let expected = Duration::from_secs(1 << i);
            assert!(
                gap >= expected && gap < expected + tolerance,
                "gap {} was {:?}, expected {:?}",
                i,
                gap,
                expected
            );
        }
        let expected_total = Duration::from_secs(31);
        assert!(total >= expected_total && total < expected_total + tolerance);
    }
}
