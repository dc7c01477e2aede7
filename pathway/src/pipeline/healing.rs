//! Validation and healing controller.
//!
//! ```text
//! window 0      trust every cache           ─┐
//! window 1      distrust rightmost node      │ until the validator
//! window 2      distrust two rightmost       │ accepts a value
//! ...                                        │
//! window depth  recompute everything        ─┘ → Exhausted
//! ```

use std::fmt;
use std::future::Future;
use std::time::Instant;

use super::metrics::{AttemptMetrics, AttemptOutcome, HealingReport};
use super::{Direction, EvaluateOptions, PathwayEvent};
use crate::errors::{PathwayError, PathwayResult};
use crate::graph::{Pathway, Validator, accept_all, async_validator, sync_validator};
use crate::value::Value;

/// Options of [`Pathway::get_with_healing`].
#[derive(Clone)]
pub struct HealingOptions {
    validator: Validator,
    direction: Option<Direction>,
}

impl Default for HealingOptions {
    fn default() -> Self {
        Self {
            validator: accept_all(),
            direction: None,
        }
    }
}

impl fmt::Debug for HealingOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealingOptions")
            .field("direction", &self.direction)
            .finish_non_exhaustive()
    }
}

impl HealingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acceptance test for the final value.
    pub fn validator<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.validator = sync_validator(f);
        self
    }

    /// Asynchronous acceptance test; an error counts as rejection.
    pub fn validator_async<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PathwayResult<bool>> + Send + 'static,
    {
        self.validator = async_validator(f);
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }
}

impl Pathway {
    /// Evaluate with a growing distrust window until `options.validator`
    /// accepts the result.
    pub async fn get_with_healing(&self, options: HealingOptions) -> PathwayResult<Value> {
        self.get_with_healing_report(options)
            .await
            .map(|report| report.value)
    }

    /// [`Pathway::get_with_healing`], also reporting every attempt made.
    ///
    /// Validation failures and transport errors advance to the next window.
    /// Fatal and construction errors end the loop immediately.
    pub async fn get_with_healing_report(
        &self,
        options: HealingOptions,
    ) -> PathwayResult<HealingReport> {
        let total_start = Instant::now();
        let depth = self.depth()?;
        let max_window = if self.graph.options().healing_enabled {
            depth
        } else {
            0
        };
        let pipeline = self.name();
        let mut attempts = Vec::with_capacity(max_window + 1);

        for window in 0..=max_window {
            self.emit(PathwayEvent::AttemptStarted { window });
            let attempt_start = Instant::now();
            let evaluated = self
                .evaluate(
                    Value::Null,
                    EvaluateOptions {
                        window,
                        direction: options.direction,
                    },
                )
                .await;

            let outcome = match evaluated {
                Ok(value) => match (options.validator)(value.clone()).await {
                    Ok(true) => {
                        attempts.push(AttemptMetrics {
                            window,
                            outcome: AttemptOutcome::Accepted,
                            duration_ms: attempt_start.elapsed().as_millis(),
                        });
                        if window > 0 {
                            tracing::info!(pipeline = %pipeline, window, "Pathway healed");
                        }
                        self.emit(PathwayEvent::Healed { window });
                        return Ok(HealingReport {
                            value,
                            window,
                            total_duration_ms: total_start.elapsed().as_millis(),
                            attempts,
                        });
                    }
                    Ok(false) => {
                        tracing::debug!(pipeline = %pipeline, window, "Result rejected by validator");
                        AttemptOutcome::Rejected
                    }
                    Err(e) => {
                        tracing::debug!(
                            pipeline = %pipeline,
                            window,
                            error = %e,
                            "Validator raised, treating as rejection"
                        );
                        AttemptOutcome::Rejected
                    }
                },
                Err(e) if !e.is_healable() => {
                    tracing::error!(pipeline = %pipeline, window, error = %e, "Healing aborted");
                    self.emit(PathwayEvent::AttemptFailed { window, error: e.clone() });
                    return Err(e);
                }
                Err(e) if e.is_validation() => {
                    tracing::debug!(pipeline = %pipeline, window, error = %e, "Validation failed");
                    self.emit(PathwayEvent::AttemptFailed { window, error: e });
                    AttemptOutcome::ValidationFailed
                }
                Err(e) => {
                    tracing::warn!(pipeline = %pipeline, window, error = %e, "Evaluation failed");
                    self.emit(PathwayEvent::AttemptFailed { window, error: e });
                    AttemptOutcome::Failed
                }
            };

            if outcome == AttemptOutcome::Rejected {
                self.emit(PathwayEvent::AttemptRejected { window });
            }
            attempts.push(AttemptMetrics {
                window,
                outcome,
                duration_ms: attempt_start.elapsed().as_millis(),
            });
        }

        tracing::warn!(
            pipeline = %pipeline,
            depth = max_window,
            attempts = attempts.len(),
            "Healing exhausted"
        );
        self.emit(PathwayEvent::Exhausted { depth: max_window });
        Err(PathwayError::Exhausted {
            pipeline,
            depth: max_window,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::errors::{ErrorKind, validation_failed};
    use crate::graph::Graph;
    use crate::options::GraphOptions;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// `upstream → downstream`, the downstream cache holding `cached`.
    fn stale_chain(graph: &Graph, cached: Value, fresh: i64) -> (Pathway, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let upstream = graph.value("metadata").named("discovery");
        let downstream = graph
            .node("jwks", move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(json!(fresh))
            })
            .with_cache(MemoryCache::seeded(cached))
            .unwrap();
        (upstream.then(&downstream).unwrap().named("chain"), calls)
    }

    #[tokio::test]
    async fn test_stale_cache_heals_at_window_one() {
        let graph = Graph::default();
        let (p, calls) = stale_chain(&graph, json!(3), 4);

        let report = p
            .get_with_healing_report(HealingOptions::new().validator(|v| v == &json!(4)))
            .await
            .unwrap();

        assert_eq!(report.value, json!(4));
        assert_eq!(report.window, 1);
        assert!(report.healed());
        assert_eq!(report.attempt_count(), 2);
        assert_eq!(report.attempts[0].outcome, AttemptOutcome::Rejected);
        assert_eq!(report.attempts[1].outcome, AttemptOutcome::Accepted);
        assert!(report.attempt_duration_ms(1).is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_cache_heals_eagerly() {
        let graph = Graph::default();
        let (p, _) = stale_chain(&graph, json!(3), 4);

        let value = p
            .get_with_healing(
                HealingOptions::new()
                    .validator(|v| v == &json!(4))
                    .direction(Direction::EagerLeftFirst),
            )
            .await
            .unwrap();
        assert_eq!(value, json!(4));
    }

    #[tokio::test]
    async fn test_fresh_value_repairs_cache() {
        let graph = Graph::default();
        let cache = MemoryCache::seeded(json!(3));
        let downstream = graph
            .node("jwks", |_| Ok(json!(4)))
            .with_cache(cache.clone())
            .unwrap();
        let p = graph.value("metadata").then(&downstream).unwrap();

        p.get_with_healing(HealingOptions::new().validator(|v| v == &json!(4)))
            .await
            .unwrap();
        assert_eq!(cache.peek(), Some(json!(4)));

        // The repaired cache is accepted straight away next time.
        let report = p
            .get_with_healing_report(HealingOptions::new().validator(|v| v == &json!(4)))
            .await
            .unwrap();
        assert_eq!(report.window, 0);
        assert!(!report.healed());
    }

    #[tokio::test]
    async fn test_exhaustion_after_every_window() {
        let graph = Graph::default();
        let evaluations = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&evaluations);
        let p = graph
            .value(1)
            .then(&graph.node("count", move |v| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(v)
            }))
            .unwrap()
            .named("never-accepted");
        let depth = p.depth().unwrap();

        let err = p
            .get_with_healing(HealingOptions::new().validator(|_| false))
            .await
            .unwrap_err();

        match &err {
            PathwayError::Exhausted { pipeline, depth: d } => {
                assert_eq!(pipeline, "never-accepted");
                assert_eq!(*d, depth);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(err.kind(), ErrorKind::Exhausted);
        assert_eq!(evaluations.load(Ordering::SeqCst), depth + 1);
    }

    #[tokio::test]
    async fn test_validation_failures_advance() {
        let graph = Graph::default();
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&attempts);
        let flaky = graph.node("flaky", move |_| {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(validation_failed("not ready"))
            } else {
                Ok(json!("ready"))
            }
        });

        let report = flaky
            .get_with_healing_report(HealingOptions::default())
            .await
            .unwrap();
        assert_eq!(report.value, json!("ready"));
        assert_eq!(report.attempts[0].outcome, AttemptOutcome::ValidationFailed);
        assert_eq!(report.window, 1);
    }

    #[tokio::test]
    async fn test_transport_errors_advance() {
        let graph = Graph::default();
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&attempts);
        let flaky = graph.node_async("flaky", move |_| {
            let first = seen.fetch_add(1, Ordering::SeqCst) == 0;
            async move {
                if first {
                    Err(PathwayError::transport(anyhow::anyhow!("connection refused")))
                } else {
                    Ok(json!("ok"))
                }
            }
        });

        let report = flaky
            .get_with_healing_report(HealingOptions::default())
            .await
            .unwrap();
        assert_eq!(report.attempts[0].outcome, AttemptOutcome::Failed);
        assert_eq!(report.value, json!("ok"));
    }

    #[tokio::test]
    async fn test_fatal_errors_abort() {
        let graph = Graph::default();
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&attempts);
        let p = graph
            .value(1)
            .then(&graph.node("revoked", move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                Err(PathwayError::fatal("software statement revoked"))
            }))
            .unwrap();

        let err = p.get_with_healing(HealingOptions::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Fatal);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unset_evaluator_aborts() {
        let graph = Graph::default();
        let p = graph.value(1).then(&graph.leaf("pending")).unwrap();
        let err = p.get_with_healing(HealingOptions::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Construction);
    }

    #[tokio::test]
    async fn test_healing_disabled_makes_one_attempt() {
        let graph = Graph::new(GraphOptions {
            healing_enabled: false,
            ..GraphOptions::default()
        });
        let (p, calls) = stale_chain(&graph, json!(3), 4);

        let err = p
            .get_with_healing(HealingOptions::new().validator(|v| v == &json!(4)))
            .await
            .unwrap_err();
        assert!(matches!(err, PathwayError::Exhausted { depth: 0, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_async_validator_error_is_rejection() {
        let graph = Graph::default();
        let (p, _) = stale_chain(&graph, json!(3), 4);

        let report = p
            .get_with_healing_report(HealingOptions::new().validator_async(|v| async move {
                if v == json!(4) {
                    Ok(true)
                } else {
                    Err(PathwayError::transport(anyhow::anyhow!("introspection down")))
                }
            }))
            .await
            .unwrap();
        assert_eq!(report.window, 1);
        assert_eq!(report.attempts[0].outcome, AttemptOutcome::Rejected);
    }

    #[tokio::test]
    async fn test_events_reach_hook() {
        let graph = Graph::default();
        let (p, _) = stale_chain(&graph, json!(3), 4);
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let p = p.on_event(move |event| sink.lock().push(format!("{:?}", event)));

        p.get_with_healing(HealingOptions::new().validator(|v| v == &json!(4)))
            .await
            .unwrap();

        let events = events.lock().clone();
        assert_eq!(
            events,
            vec![
                "AttemptStarted { window: 0 }",
                "AttemptRejected { window: 0 }",
                "AttemptStarted { window: 1 }",
                "Healed { window: 1 }",
            ]
        );
    }
}
