//! Branch evaluators: the executable form of a composed pipeline.
//!
//! Running a branch never does work by itself; it wires thunks together and
//! returns the output thunk. Work happens when the top-level thunk is forced.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::try_join_all;

use super::Direction;
use super::session::{Session, Thunk};
use crate::errors::{PathwayError, PathwayResult};
use crate::graph::IsolationPolicy;
use crate::graph::node::{Node, Predicate};
use crate::value::{Value, input_key};

pub(crate) struct Branch {
    pub(crate) node: Arc<Node>,
    /// Positions between this node's rightmost stage and the right end of
    /// the evaluated pipeline.
    pub(crate) distance: usize,
    pub(crate) step: Step,
}

/// Aggregate of the right-hand paths of a sequence, or of merged branches.
pub(crate) struct Fan {
    pub(crate) branches: Vec<Arc<Branch>>,
    /// Output an array even for a single branch.
    pub(crate) tuple: bool,
}

pub(crate) enum Step {
    Void,
    Passthru,
    Leaf,
    Sequence {
        first: Arc<Branch>,
        right: Arc<Fan>,
    },
    Merge(Arc<Fan>),
    Conditional {
        predicate: Predicate,
        then: Arc<Branch>,
        otherwise: Arc<Branch>,
    },
    Assertion {
        base: Arc<Branch>,
        check: Arc<Branch>,
    },
    Isolated {
        inner: Arc<Branch>,
        policy: IsolationPolicy,
    },
}

impl Branch {
    pub(crate) fn run(self: &Arc<Self>, session: &Arc<Session>, input: Thunk) -> Thunk {
        match &self.step {
            Step::Void => return session.void(),
            Step::Passthru => return input,
            _ => {}
        }

        if let Some(existing) = session.path_memo(input.id, self.node.id) {
            return existing;
        }
        let input_id = input.id;
        let output = self.start(session, input);
        session.remember_path(input_id, self.node.id, output)
    }

    fn start(self: &Arc<Self>, session: &Arc<Session>, input: Thunk) -> Thunk {
        match &self.step {
            Step::Void => session.void(),
            Step::Passthru => input,
            Step::Leaf => {
                let branch = Arc::clone(self);
                let session_ref = Arc::clone(session);
                session.thunk(async move { branch.evaluate_leaf(session_ref, input).await }.boxed())
            }
            Step::Sequence { first, right } => {
                let left = first.run(session, input);
                match session.direction {
                    Direction::LazyRightDriven => right.run(session, left),
                    Direction::EagerLeftFirst => {
                        let right = Arc::clone(right);
                        let session_ref = Arc::clone(session);
                        session.thunk(
                            async move {
                                left.force().await?;
                                right.run(&session_ref, left).force().await
                            }
                            .boxed(),
                        )
                    }
                }
            }
            Step::Merge(fan) => fan.run(session, input),
            Step::Conditional {
                predicate,
                then,
                otherwise,
            } => {
                let predicate = Arc::clone(predicate);
                let then = Arc::clone(then);
                let otherwise = Arc::clone(otherwise);
                let session_ref = Arc::clone(session);
                session.thunk(
                    async move {
                        let value = input.force().await?;
                        let chosen = if predicate(&value) { then } else { otherwise };
                        chosen.run(&session_ref, input).force().await
                    }
                    .boxed(),
                )
            }
            Step::Assertion { base, check } => {
                let base = base.run(session, input);
                let check = check.run(session, base.clone());
                let eager = session.direction == Direction::EagerLeftFirst;
                session.thunk(
                    async move {
                        if eager {
                            base.force().await?;
                        }
                        check.force().await?;
                        base.force().await
                    }
                    .boxed(),
                )
            }
            Step::Isolated { inner, policy } => {
                let inner = Arc::clone(inner);
                let policy = *policy;
                let outer = Arc::clone(session);
                session.thunk(
                    async move {
                        let value = input.force().await?;
                        let window = match policy {
                            IsolationPolicy::Normal => outer.window,
                            IsolationPolicy::Bypass => usize::MAX,
                        };
                        let isolated = Session::new(outer.graph.clone(), window, outer.direction);
                        let _closing = isolated.closing();
                        let input = isolated.ready(value);
                        inner.run(&isolated, input).force().await
                    }
                    .boxed(),
                )
            }
        }
    }

    async fn evaluate_leaf(self: Arc<Self>, session: Arc<Session>, input: Thunk) -> PathwayResult<Value> {
        let label = self.node.label();

        // An already resolved input keys the IO memo before the cache is
        // touched, so value-equal inputs share one cache read as well.
        if let Some(value) = input.resolved() {
            let branch = Arc::clone(&self);
            let session_ref = Arc::clone(&session);
            let (eval, reused) = session.io_memo(self.node.id, input_key(&value), move || {
                async move {
                    let cached = branch.read_cache(&session_ref).await?;
                    match cached {
                        Some(cached) => Ok(cached),
                        None => branch.compute(value).await,
                    }
                }
                .boxed()
            });
            if reused {
                tracing::trace!(node = %label, "Reusing evaluation for equal input");
            }
            return eval.await;
        }

        // Unresolved input: a trusted cache hit skips the upstream entirely.
        if let Some(cached) = self.read_cache(&session).await? {
            return Ok(cached);
        }

        let value = input.force().await?;
        let key = input_key(&value);
        let branch = Arc::clone(&self);
        let (eval, reused) = session.io_memo(self.node.id, key, move || {
            async move { branch.compute(value).await }.boxed()
        });
        if reused {
            tracing::trace!(node = %label, "Reusing evaluation for equal input");
        }
        eval.await
    }

    /// Trusted, validated cache entry, if any. Fetch failures are misses.
    async fn read_cache(&self, session: &Session) -> PathwayResult<Option<Value>> {
        let leaf = self.node.leaf()?;
        let Some(cache) = leaf.cache() else {
            return Ok(None);
        };
        let label = self.node.label();

        if !session.trusts(self.distance) {
            tracing::trace!(
                node = %label,
                distance = self.distance,
                window = session.window,
                "Cache distrusted"
            );
            return Ok(None);
        }

        match cache.fetch().await {
            Ok(value) => {
                tracing::debug!(
                    node = %label,
                    distance = self.distance,
                    window = session.window,
                    "Cache hit"
                );
                leaf.validate(&value).await.inspect_err(|e| {
                    tracing::debug!(node = %label, error = %e, "Cached value rejected");
                })?;
                Ok(Some(value))
            }
            Err(e) => {
                tracing::trace!(node = %label, error = %e, "Cache miss");
                Ok(None)
            }
        }
    }

    /// Invoke the evaluator, validate, and write back on success.
    async fn compute(self: Arc<Self>, value: Value) -> PathwayResult<Value> {
        let leaf = self.node.leaf()?;
        let label = self.node.label();
        let evaluator = leaf.evaluator().cloned().ok_or_else(|| {
            PathwayError::construction(format!("evaluator of {} invoked before being set", label))
        })?;

        tracing::trace!(node = %label, "Evaluating");
        let output = evaluator(value).await.inspect_err(|e| {
            tracing::debug!(node = %label, error = %e, "Evaluator failed");
        })?;
        leaf.validate(&output).await.inspect_err(|e| {
            tracing::debug!(node = %label, error = %e, "Evaluated value rejected");
        })?;

        if let Some(cache) = leaf.cache() {
            if let Err(e) = cache.update(&output).await {
                tracing::warn!(
                    node = %label,
                    cache = %cache.describe(),
                    error = %e,
                    "Failed to write back cache entry"
                );
            }
        }

        Ok(output)
    }
}

impl Fan {
    pub(crate) fn run(self: &Arc<Self>, session: &Arc<Session>, input: Thunk) -> Thunk {
        if !self.tuple {
            if let [only] = self.branches.as_slice() {
                return only.run(session, input);
            }
        }

        let outputs: Vec<Thunk> = self
            .branches
            .iter()
            .map(|branch| branch.run(session, input.clone()))
            .collect();
        session.thunk(
            async move {
                let values = try_join_all(outputs.iter().map(Thunk::force)).await?;
                Ok(Value::Array(values))
            }
            .boxed(),
        )
    }
}
