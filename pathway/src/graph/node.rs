//! Node storage: the atomic units and composite shapes a graph is made of.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock};

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::RwLock;

use crate::cache::PersistentCache;
use crate::errors::{PathwayError, PathwayResult, validation_failed};
use crate::pipeline::PathwayEvent;
use crate::value::Value;

/// Stable handle of a node within one [`Graph`](super::Graph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub type Evaluator = Arc<dyn Fn(Value) -> BoxFuture<'static, PathwayResult<Value>> + Send + Sync>;
pub type Validator = Arc<dyn Fn(Value) -> BoxFuture<'static, PathwayResult<bool>> + Send + Sync>;
pub type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;
pub type EventHook = Arc<dyn Fn(&PathwayEvent) + Send + Sync>;

pub fn sync_evaluator<F>(f: F) -> Evaluator
where
    F: Fn(Value) -> PathwayResult<Value> + Send + Sync + 'static,
{
    Arc::new(move |value| futures::future::ready(f(value)).boxed())
}

pub fn async_evaluator<F, Fut>(f: F) -> Evaluator
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = PathwayResult<Value>> + Send + 'static,
{
    Arc::new(move |value| f(value).boxed())
}

pub fn sync_validator<F>(f: F) -> Validator
where
    F: Fn(&Value) -> bool + Send + Sync + 'static,
{
    Arc::new(move |value| futures::future::ready(Ok(f(&value))).boxed())
}

pub fn async_validator<F, Fut>(f: F) -> Validator
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = PathwayResult<bool>> + Send + 'static,
{
    Arc::new(move |value| f(value).boxed())
}

/// Validator that accepts everything.
pub fn accept_all() -> Validator {
    sync_validator(|_| true)
}

/// How an isolated sub-pipeline treats persistent caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsolationPolicy {
    /// Caches are consulted as in the enclosing evaluation.
    Normal,
    /// Caches are never read.
    Bypass,
}

pub(crate) struct Node {
    pub(crate) id: NodeId,
    name: RwLock<Option<String>>,
    hook: RwLock<Option<EventHook>>,
    pub(crate) kind: NodeKind,
}

pub(crate) enum NodeKind {
    /// Constant `Null` source; ignores its input.
    Void,
    /// Identity.
    Passthru,
    Leaf(Leaf),
    Sequence(Sequence),
    Merge {
        branches: Vec<NodeId>,
        depth: usize,
    },
    Conditional {
        predicate: Predicate,
        then: NodeId,
        otherwise: NodeId,
        depth: usize,
    },
    Assertion {
        base: NodeId,
        check: NodeId,
        depth: usize,
    },
    Isolated {
        inner: NodeId,
        policy: IsolationPolicy,
        depth: usize,
    },
}

impl Node {
    pub(crate) fn new(id: NodeId, name: Option<String>, kind: NodeKind) -> Self {
        Self {
            id,
            name: RwLock::new(name),
            hook: RwLock::new(None),
            kind,
        }
    }

    pub(crate) fn name(&self) -> Option<String> {
        self.name.read().clone()
    }

    pub(crate) fn set_name(&self, name: impl Into<String>) {
        *self.name.write() = Some(name.into());
    }

    /// Name if set, otherwise the id.
    pub(crate) fn label(&self) -> String {
        self.name().unwrap_or_else(|| self.id.to_string())
    }

    pub(crate) fn set_hook(&self, hook: EventHook) {
        *self.hook.write() = Some(hook);
    }

    pub(crate) fn emit(&self, event: PathwayEvent) {
        let hook = self.hook.read().clone();
        if let Some(hook) = hook {
            hook(&event);
        }
    }

    pub(crate) fn leaf(&self) -> PathwayResult<&Leaf> {
        match &self.kind {
            NodeKind::Leaf(leaf) => Ok(leaf),
            _ => Err(PathwayError::construction(format!(
                "node {} is not a leaf",
                self.label()
            ))),
        }
    }

    pub(crate) fn sequence(&self) -> PathwayResult<&Sequence> {
        match &self.kind {
            NodeKind::Sequence(seq) => Ok(seq),
            _ => Err(PathwayError::construction(format!(
                "node {} is not a composite pipeline",
                self.label()
            ))),
        }
    }
}

/// Atomic computation unit.
///
/// Evaluator and cache are set once; validators may be appended at any time.
pub(crate) struct Leaf {
    evaluator: OnceLock<Evaluator>,
    cache: OnceLock<Arc<dyn PersistentCache>>,
    validators: RwLock<Vec<Validator>>,
}

impl Leaf {
    pub(crate) fn new(evaluator: Option<Evaluator>) -> Self {
        let cell = OnceLock::new();
        if let Some(evaluator) = evaluator {
            let _ = cell.set(evaluator);
        }
        Self {
            evaluator: cell,
            cache: OnceLock::new(),
            validators: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn set_evaluator(&self, evaluator: Evaluator) -> PathwayResult<()> {
        self.evaluator
            .set(evaluator)
            .map_err(|_| PathwayError::construction("evaluator already set"))
    }

    pub(crate) fn evaluator(&self) -> Option<&Evaluator> {
        self.evaluator.get()
    }

    pub(crate) fn set_cache(&self, cache: Arc<dyn PersistentCache>) -> PathwayResult<()> {
        self.cache
            .set(cache)
            .map_err(|_| PathwayError::construction("cache already set"))
    }

    pub(crate) fn cache(&self) -> Option<&Arc<dyn PersistentCache>> {
        self.cache.get()
    }

    pub(crate) fn add_validator(&self, validator: Validator) {
        self.validators.write().push(validator);
    }

    /// Run every validator against `value`.
    ///
    /// A validator returning `false` or raising any error yields
    /// [`PathwayError::Validation`].
    pub(crate) async fn validate(&self, value: &Value) -> PathwayResult<()> {
        let validators = self.validators.read().clone();
        for (index, validator) in validators.iter().enumerate() {
            match validator(value.clone()).await {
                Ok(true) => {}
                Ok(false) => {
                    return Err(validation_failed(format!("validator {} rejected value", index)));
                }
                Err(PathwayError::Validation(reason)) => {
                    return Err(PathwayError::Validation(reason));
                }
                Err(e) => {
                    return Err(validation_failed(format!("validator {} raised: {}", index, e)));
                }
            }
        }
        Ok(())
    }
}

/// Composite: a left pipeline feeding one or more right pipelines.
pub(crate) struct Sequence {
    first: OnceLock<NodeId>,
    paths: OnceLock<Vec<NodeId>>,
    depth: OnceLock<usize>,
}

impl Sequence {
    pub(crate) fn unbound() -> Self {
        Self {
            first: OnceLock::new(),
            paths: OnceLock::new(),
            depth: OnceLock::new(),
        }
    }

    pub(crate) fn bound(first: NodeId, paths: Vec<NodeId>, depth: usize) -> Self {
        let seq = Self::unbound();
        let _ = seq.first.set(first);
        let _ = seq.paths.set(paths);
        let _ = seq.depth.set(depth);
        seq
    }

    pub(crate) fn set_first(&self, first: NodeId) -> PathwayResult<()> {
        self.first
            .set(first)
            .map_err(|_| PathwayError::construction("pipeline 'first' already set"))
    }

    pub(crate) fn set_paths(&self, paths: Vec<NodeId>) -> PathwayResult<()> {
        if paths.is_empty() {
            return Err(PathwayError::construction("pipeline needs at least one path"));
        }
        self.paths
            .set(paths)
            .map_err(|_| PathwayError::construction("pipeline 'paths' already set"))
    }

    pub(crate) fn first(&self) -> Option<NodeId> {
        self.first.get().copied()
    }

    pub(crate) fn paths(&self) -> Option<&[NodeId]> {
        self.paths.get().map(Vec::as_slice)
    }

    pub(crate) fn cached_depth(&self) -> Option<usize> {
        self.depth.get().copied()
    }

    pub(crate) fn remember_depth(&self, depth: usize) {
        let _ = self.depth.set(depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_evaluator_set_once() {
        let leaf = Leaf::new(None);
        assert!(leaf.evaluator().is_none());
        leaf.set_evaluator(sync_evaluator(Ok)).unwrap();
        let err = leaf.set_evaluator(sync_evaluator(Ok)).unwrap_err();
        assert!(err.to_string().contains("already set"));
    }

    #[test]
    fn test_cache_set_once() {
        let leaf = Leaf::new(Some(sync_evaluator(Ok)));
        leaf.set_cache(Arc::new(crate::cache::MemoryCache::new()))
            .unwrap();
        assert!(
            leaf.set_cache(Arc::new(crate::cache::MemoryCache::new()))
                .is_err()
        );
    }

    #[test]
    fn test_sequence_fields_set_once() {
        let seq = Sequence::unbound();
        seq.set_first(NodeId(1)).unwrap();
        assert!(seq.set_first(NodeId(2)).is_err());
        assert!(seq.set_paths(vec![]).is_err());
        seq.set_paths(vec![NodeId(3)]).unwrap();
        assert!(seq.set_paths(vec![NodeId(4)]).is_err());
        assert_eq!(seq.first(), Some(NodeId(1)));
        assert_eq!(seq.paths(), Some(&[NodeId(3)][..]));
    }

    #[tokio::test]
    async fn test_validator_error_counts_as_rejection() {
        let leaf = Leaf::new(Some(sync_evaluator(Ok)));
        leaf.add_validator(sync_validator(|v| v.is_number()));
        leaf.add_validator(async_validator(|_| async {
            Err(PathwayError::transport(anyhow::anyhow!("introspection down")))
        }));

        let err = leaf.validate(&json!("x")).await.unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("validator 0"));

        let err = leaf.validate(&json!(1)).await.unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("introspection down"));
    }
}
