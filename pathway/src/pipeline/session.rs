//! Per-call evaluation state.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;

use super::Direction;
use super::branch::{Branch, Fan, Step};
use crate::errors::{PathwayError, PathwayResult};
use crate::graph::node::{NodeId, NodeKind};
use crate::graph::{Graph, sequence_parts};
use crate::value::Value;

pub(crate) type SharedEval = Shared<BoxFuture<'static, PathwayResult<Value>>>;

/// Lazily evaluated, shareable input or output of a branch.
///
/// Nothing runs until the thunk is forced. Every clone forced concurrently
/// joins the same computation.
#[derive(Clone)]
pub(crate) struct Thunk {
    pub(crate) id: u64,
    eval: SharedEval,
}

impl Thunk {
    pub(crate) fn force(&self) -> SharedEval {
        self.eval.clone()
    }

    /// The value, if this thunk has already been forced to success.
    pub(crate) fn resolved(&self) -> Option<Value> {
        self.eval.peek().and_then(|result| result.as_ref().ok().cloned())
    }
}

/// Builds and memoizes branch evaluators.
///
/// Branch evaluators depend only on graph structure and distance, never on
/// runtime values, so one built here can be run in any session.
pub(crate) struct Planner {
    graph: Graph,
    branches: Mutex<HashMap<(NodeId, usize), Arc<Branch>>>,
    fans: Mutex<HashMap<(Vec<NodeId>, usize, bool), Arc<Fan>>>,
}

impl Planner {
    pub(crate) fn new(graph: Graph) -> Self {
        Self {
            graph,
            branches: Mutex::new(HashMap::new()),
            fans: Mutex::new(HashMap::new()),
        }
    }

    /// Branch evaluator for `id` whose rightmost position lies `distance`
    /// positions from the right end of the evaluated pipeline.
    pub(crate) fn branch(&self, id: NodeId, distance: usize) -> PathwayResult<Arc<Branch>> {
        if let Some(branch) = self.branches.lock().get(&(id, distance)) {
            return Ok(Arc::clone(branch));
        }

        let node = self.graph.lookup(id)?;
        let step = match &node.kind {
            NodeKind::Void => Step::Void,
            NodeKind::Passthru => Step::Passthru,
            NodeKind::Leaf(leaf) => {
                if leaf.evaluator().is_none() {
                    return Err(PathwayError::construction(format!(
                        "evaluator of {} invoked before being set",
                        node.label()
                    )));
                }
                Step::Leaf
            }
            NodeKind::Sequence(_) => {
                let (first, paths) = sequence_parts(&node)?;
                let mut right_depth = 0;
                for path in &paths {
                    right_depth = right_depth.max(self.graph.depth_of(*path)?);
                }
                let tuple = paths.len() > 1;
                Step::Sequence {
                    first: self.branch(first, distance + right_depth)?,
                    right: self.fan(paths, distance, tuple)?,
                }
            }
            NodeKind::Merge { branches, .. } => Step::Merge(self.fan(branches.clone(), distance, true)?),
            NodeKind::Conditional {
                predicate,
                then,
                otherwise,
                ..
            } => Step::Conditional {
                predicate: Arc::clone(predicate),
                then: self.branch(*then, distance)?,
                otherwise: self.branch(*otherwise, distance)?,
            },
            NodeKind::Assertion { base, check, .. } => {
                let check_depth = self.graph.depth_of(*check)?;
                Step::Assertion {
                    base: self.branch(*base, distance + check_depth)?,
                    check: self.branch(*check, distance)?,
                }
            }
            NodeKind::Isolated { inner, policy, .. } => {
                // Decoupled from this planner's memo tables.
                let inner = Planner::new(self.graph.clone()).branch(*inner, distance)?;
                Step::Isolated {
                    inner,
                    policy: *policy,
                }
            }
        };

        let branch = Arc::new(Branch {
            node,
            distance,
            step,
        });
        let branch = self
            .branches
            .lock()
            .entry((id, distance))
            .or_insert(branch)
            .clone();
        Ok(branch)
    }

    fn fan(&self, ids: Vec<NodeId>, distance: usize, tuple: bool) -> PathwayResult<Arc<Fan>> {
        let key = (ids, distance, tuple);
        if let Some(fan) = self.fans.lock().get(&key) {
            return Ok(Arc::clone(fan));
        }

        let mut branches = Vec::with_capacity(key.0.len());
        for id in &key.0 {
            branches.push(self.branch(*id, distance)?);
        }
        let fan = Arc::new(Fan { branches, tuple });
        Ok(self.fans.lock().entry(key).or_insert(fan).clone())
    }
}

/// Ephemeral state of one evaluation call.
///
/// Holds the four memo tables (path memo, IO memo, and the planner's branch
/// and fan memos) plus the direction and distrust window. Discarded when the
/// call completes.
pub(crate) struct Session {
    pub(crate) graph: Graph,
    pub(crate) planner: Planner,
    pub(crate) window: usize,
    pub(crate) direction: Direction,
    next_thunk: AtomicU64,
    void: Mutex<Option<Thunk>>,
    /// `(input thunk, node)` → output thunk.
    paths: Mutex<HashMap<(u64, NodeId), Thunk>>,
    /// `(node, serialized input)` → in-flight or finished evaluation.
    io: Mutex<HashMap<(NodeId, String), SharedEval>>,
}

impl Session {
    pub(crate) fn new(graph: Graph, window: usize, direction: Direction) -> Arc<Self> {
        Arc::new(Self {
            planner: Planner::new(graph.clone()),
            graph,
            window,
            direction,
            next_thunk: AtomicU64::new(0),
            void: Mutex::new(None),
            paths: Mutex::new(HashMap::new()),
            io: Mutex::new(HashMap::new()),
        })
    }

    pub(crate) fn thunk(&self, eval: BoxFuture<'static, PathwayResult<Value>>) -> Thunk {
        Thunk {
            id: self.next_thunk.fetch_add(1, Ordering::Relaxed),
            eval: eval.shared(),
        }
    }

    pub(crate) fn ready(&self, value: Value) -> Thunk {
        self.thunk(futures::future::ready(Ok(value)).boxed())
    }

    /// The session's single constant-`Null` thunk.
    pub(crate) fn void(&self) -> Thunk {
        self.void
            .lock()
            .get_or_insert_with(|| self.ready(Value::Null))
            .clone()
    }

    /// Whether a node at `distance` lies outside the distrust window.
    pub(crate) fn trusts(&self, distance: usize) -> bool {
        distance >= self.window
    }

    pub(crate) fn path_memo(&self, input: u64, node: NodeId) -> Option<Thunk> {
        self.paths.lock().get(&(input, node)).cloned()
    }

    /// Record `output`; if a concurrent builder got there first, return theirs.
    pub(crate) fn remember_path(&self, input: u64, node: NodeId, output: Thunk) -> Thunk {
        self.paths
            .lock()
            .entry((input, node))
            .or_insert(output)
            .clone()
    }

    /// Drop the memo tables.
    ///
    /// Unforced thunks hold the session they were built in; clearing the
    /// tables once the call completes breaks that cycle.
    pub(crate) fn close(&self) {
        self.paths.lock().clear();
        self.io.lock().clear();
        self.void.lock().take();
    }

    /// Guard that closes the session when dropped, cancellation included.
    pub(crate) fn closing(&self) -> Closing<'_> {
        Closing(self)
    }

    /// Existing evaluation of `(node, key)` or the one produced by `start`.
    pub(crate) fn io_memo(
        &self,
        node: NodeId,
        key: String,
        start: impl FnOnce() -> BoxFuture<'static, PathwayResult<Value>>,
    ) -> (SharedEval, bool) {
        let mut io = self.io.lock();
        match io.get(&(node, key.clone())) {
            Some(existing) => (existing.clone(), true),
            None => {
                let eval = start().shared();
                io.insert((node, key), eval.clone());
                (eval, false)
            }
        }
    }
}

pub(crate) struct Closing<'a>(&'a Session);

impl Drop for Closing<'_> {
    fn drop(&mut self) {
        self.0.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_void_thunk_is_stable() {
        let session = Session::new(Graph::default(), 0, Direction::LazyRightDriven);
        let a = session.void();
        let b = session.void();
        assert_eq!(a.id, b.id);
        assert_eq!(a.force().await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_resolved_only_after_success() {
        let session = Session::new(Graph::default(), 0, Direction::LazyRightDriven);
        let ok = session.ready(Value::from(7));
        assert!(ok.resolved().is_none());
        ok.force().await.unwrap();
        assert_eq!(ok.resolved(), Some(Value::from(7)));

        let failed = session.thunk(
            futures::future::ready(Err(PathwayError::fatal("boom"))).boxed(),
        );
        assert!(failed.force().await.is_err());
        assert!(failed.resolved().is_none());
    }

    #[test]
    fn test_close_releases_unforced_thunks() {
        let session = Session::new(Graph::default(), 0, Direction::LazyRightDriven);
        let captured = Arc::clone(&session);
        let pending = session.thunk(
            async move {
                let _ = &captured;
                Ok(Value::Null)
            }
            .boxed(),
        );
        session.remember_path(pending.id, NodeId(0), pending.clone());
        drop(pending);
        assert_eq!(Arc::strong_count(&session), 2);

        session.close();
        assert_eq!(Arc::strong_count(&session), 1);
    }

    #[test]
    fn test_trusts_outside_window() {
        let session = Session::new(Graph::default(), 2, Direction::LazyRightDriven);
        assert!(!session.trusts(0));
        assert!(!session.trusts(1));
        assert!(session.trusts(2));
    }

    #[test]
    fn test_planner_rejects_unset_evaluator() {
        let graph = Graph::default();
        let pending = graph.leaf("pending");
        let p = graph.value(1).then(&pending).unwrap();
        let err = Planner::new(graph).branch(p.id(), 0).err().unwrap();
        assert!(err.to_string().contains("before being set"));
    }

    #[test]
    fn test_planner_memoizes_branches() {
        let graph = Graph::default();
        let a = graph.value(1);
        let p = a.extend(&[&graph.passthru(), &graph.passthru()]).unwrap();
        let planner = Planner::new(graph);
        let first = planner.branch(p.id(), 0).unwrap();
        let second = planner.branch(p.id(), 0).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
