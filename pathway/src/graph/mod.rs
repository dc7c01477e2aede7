//! Graph-builder context and the composition algebra.
//!
//! A [`Graph`] owns every node, the structural-sharing table and the
//! construction factories. It is created once at startup and cloned cheaply
//! into whatever builds pipelines. [`Pathway`] is a handle to one node.
//!
//! ## Composition
//!
//! ```text
//! a.extend(&[&b])        a ──→ b                     output: b
//! a.extend(&[&b, &c])    a ─┬→ b                     output: [b, c]
//!                           └→ c
//! a.expand(&b)           a ─┬→ (identity)            output: [a, b]
//!                           └→ b
//! a.assert(&check)       a ──→ check                 output: a
//! combined(&[p, q])      p ─┐  (padded to equal depth)
//!                        q ─┴→ [p, q]
//! ```
//!
//! Composing the same nodes (by reference) twice returns the same pathway,
//! which lets the evaluator treat a dependency reached from two call sites as
//! one node.

mod factory;
pub(crate) mod node;
mod shape;

pub use node::{
    EventHook, Evaluator, IsolationPolicy, NodeId, Predicate, Validator, accept_all,
    async_evaluator, async_validator, sync_evaluator, sync_validator,
};
pub use shape::Shape;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cache::PersistentCache;
use crate::errors::{PathwayError, PathwayResult};
use crate::options::GraphOptions;
use crate::value::{self, Value};
use node::{Leaf, Node, NodeKind, Sequence};

/// Key of the structural-sharing table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CompositionKey {
    Sequence(NodeId, Vec<NodeId>),
    Merge(Vec<NodeId>),
    Assertion(NodeId, NodeId),
    Isolated(NodeId, IsolationPolicy),
}

pub(crate) struct GraphInner {
    nodes: RwLock<Vec<Arc<Node>>>,
    shared: Mutex<HashMap<CompositionKey, NodeId>>,
    factories: Mutex<HashMap<(String, String), NodeId>>,
    options: GraphOptions,
    void: NodeId,
    passthru: NodeId,
}

/// Builder context owning all nodes of a family of pipelines.
///
/// Nodes are never freed while the graph lives. Pipelines are meant to be
/// built at startup (or through [`Graph::memoized`]) and evaluated many
/// times; constructing fresh leaves per request grows the graph without
/// bound.
#[derive(Clone)]
pub struct Graph {
    inner: Arc<GraphInner>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new(GraphOptions::default())
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.inner.nodes.read().len())
            .field("options", &self.inner.options)
            .finish()
    }
}

impl Graph {
    pub fn new(options: GraphOptions) -> Self {
        let void = Arc::new(Node::new(NodeId(0), Some("void".into()), NodeKind::Void));
        let passthru = Arc::new(Node::new(
            NodeId(1),
            Some("passthru".into()),
            NodeKind::Passthru,
        ));

        crate::logging::warn_if_unobserved();
        tracing::debug!(
            healing_enabled = options.healing_enabled,
            direction = ?options.default_direction,
            "Created pathway graph"
        );

        Self {
            inner: Arc::new(GraphInner {
                nodes: RwLock::new(vec![void, passthru]),
                shared: Mutex::new(HashMap::new()),
                factories: Mutex::new(HashMap::new()),
                options,
                void: NodeId(0),
                passthru: NodeId(1),
            }),
        }
    }

    pub fn options(&self) -> &GraphOptions {
        &self.inner.options
    }

    /// Number of nodes created so far, sentinels included.
    pub fn len(&self) -> usize {
        self.inner.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn lookup(&self, id: NodeId) -> PathwayResult<Arc<Node>> {
        self.inner
            .nodes
            .read()
            .get(id.0 as usize)
            .cloned()
            .ok_or_else(|| PathwayError::construction(format!("unknown node {}", id)))
    }

    fn insert(&self, name: Option<String>, kind: NodeKind) -> Pathway {
        let mut nodes = self.inner.nodes.write();
        let id = NodeId(nodes.len() as u32);
        nodes.push(Arc::new(Node::new(id, name, kind)));
        self.handle(id)
    }

    fn handle(&self, id: NodeId) -> Pathway {
        Pathway {
            graph: self.clone(),
            id,
        }
    }

    /// Look up a shared composite or create it with `make`.
    ///
    /// `make` runs outside the table lock; if two callers race, the first
    /// insertion wins and both get the same handle.
    fn shared_or_insert(
        &self,
        key: CompositionKey,
        make: impl FnOnce() -> PathwayResult<NodeKind>,
    ) -> PathwayResult<Pathway> {
        if let Some(id) = self.inner.shared.lock().get(&key) {
            return Ok(self.handle(*id));
        }
        let kind = make()?;
        let candidate = self.insert(None, kind);
        let id = *self.inner.shared.lock().entry(key).or_insert(candidate.id);
        Ok(self.handle(id))
    }

    fn check_owner(&self, pathway: &Pathway) -> PathwayResult<()> {
        if Arc::ptr_eq(&self.inner, &pathway.graph.inner) {
            Ok(())
        } else {
            Err(PathwayError::construction(format!(
                "pathway {} belongs to a different graph",
                pathway.id
            )))
        }
    }

    pub(crate) fn depth_of(&self, id: NodeId) -> PathwayResult<usize> {
        let node = self.lookup(id)?;
        match &node.kind {
            NodeKind::Void | NodeKind::Passthru | NodeKind::Leaf(_) => Ok(1),
            NodeKind::Merge { depth, .. }
            | NodeKind::Conditional { depth, .. }
            | NodeKind::Assertion { depth, .. }
            | NodeKind::Isolated { depth, .. } => Ok(*depth),
            NodeKind::Sequence(seq) => {
                if let Some(depth) = seq.cached_depth() {
                    return Ok(depth);
                }
                let (first, paths) = bound_parts(&node, seq)?;
                let depth = self.depth_of(first)? + self.max_depth(paths)?;
                seq.remember_depth(depth);
                Ok(depth)
            }
        }
    }

    fn max_depth(&self, ids: &[NodeId]) -> PathwayResult<usize> {
        let mut max = 0;
        for id in ids {
            max = max.max(self.depth_of(*id)?);
        }
        Ok(max)
    }

    // ========================================================================
    // Leaf constructors
    // ========================================================================

    /// Constant-`Null` source.
    pub fn void(&self) -> Pathway {
        self.handle(self.inner.void)
    }

    /// Identity stage.
    pub fn passthru(&self) -> Pathway {
        self.handle(self.inner.passthru)
    }

    /// Leaf that always yields `value`.
    ///
    /// Every call creates a new node; see the note on [`Graph`].
    pub fn value(&self, value: impl Into<Value>) -> Pathway {
        let value = value.into();
        let name = format!("value({})", value);
        self.insert(
            Some(name),
            NodeKind::Leaf(Leaf::new(Some(sync_evaluator(move |_| Ok(value.clone()))))),
        )
    }

    /// Leaf whose evaluator will be supplied later with
    /// [`Pathway::set_evaluator`].
    pub fn leaf(&self, name: impl Into<String>) -> Pathway {
        self.insert(Some(name.into()), NodeKind::Leaf(Leaf::new(None)))
    }

    /// Leaf with a synchronous evaluator.
    pub fn node<F>(&self, name: impl Into<String>, f: F) -> Pathway
    where
        F: Fn(Value) -> PathwayResult<Value> + Send + Sync + 'static,
    {
        self.insert(
            Some(name.into()),
            NodeKind::Leaf(Leaf::new(Some(sync_evaluator(f)))),
        )
    }

    /// Leaf with an asynchronous evaluator.
    pub fn node_async<F, Fut>(&self, name: impl Into<String>, f: F) -> Pathway
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PathwayResult<Value>> + Send + 'static,
    {
        self.insert(
            Some(name.into()),
            NodeKind::Leaf(Leaf::new(Some(async_evaluator(f)))),
        )
    }

    /// Leaf with a typed evaluator; input and output cross the boundary
    /// through serde.
    pub fn typed_node<I, O, F>(&self, name: impl Into<String>, f: F) -> Pathway
    where
        I: DeserializeOwned,
        O: Serialize,
        F: Fn(I) -> PathwayResult<O> + Send + Sync + 'static,
    {
        self.node(name, move |input| {
            let input: I = value::from_value(input)?;
            value::to_value(f(input)?)
        })
    }

    /// Unbound composite; bind it with [`Pathway::set_first`] and
    /// [`Pathway::set_paths`].
    pub fn pipeline(&self, name: impl Into<String>) -> Pathway {
        self.insert(Some(name.into()), NodeKind::Sequence(Sequence::unbound()))
    }

    // ========================================================================
    // Multi-pathway operators
    // ========================================================================

    /// Merge independently rooted pipelines into one whose output is the
    /// array of their outputs, in argument order.
    ///
    /// Shorter pipelines are padded with identity stages to the maximum
    /// depth first, so every branch is protected by the same number of
    /// healing rounds.
    pub fn combined(&self, pathways: &[&Pathway]) -> PathwayResult<Pathway> {
        if pathways.is_empty() {
            return Err(PathwayError::construction(
                "combined() needs at least one pathway",
            ));
        }
        for pathway in pathways {
            self.check_owner(pathway)?;
        }

        let mut target = 0;
        for pathway in pathways {
            target = target.max(pathway.depth()?);
        }
        let mut branches = Vec::with_capacity(pathways.len());
        for pathway in pathways {
            branches.push(pathway.pad_right(target)?.id);
        }

        self.shared_or_insert(CompositionKey::Merge(branches.clone()), || {
            Ok(NodeKind::Merge {
                branches,
                depth: target,
            })
        })
    }

    /// Alias of [`Graph::combined`].
    pub fn require(&self, pathways: &[&Pathway]) -> PathwayResult<Pathway> {
        self.combined(pathways)
    }

    /// Conditional node choosing between two sub-pipelines at runtime.
    ///
    /// Depth is the maximum of both branches regardless of which runs.
    pub fn encapsulate(&self, spec: Encapsulation) -> PathwayResult<Pathway> {
        let Encapsulation {
            when,
            then,
            otherwise,
        } = spec;
        let otherwise = otherwise.unwrap_or_else(|| self.void());
        self.check_owner(&then)?;
        self.check_owner(&otherwise)?;

        let depth = then.depth()?.max(otherwise.depth()?);
        Ok(self.insert(
            None,
            NodeKind::Conditional {
                predicate: when,
                then: then.id,
                otherwise: otherwise.id,
                depth,
            },
        ))
    }
}

fn bound_parts<'a>(node: &Node, seq: &'a Sequence) -> PathwayResult<(NodeId, &'a [NodeId])> {
    match (seq.first(), seq.paths()) {
        (Some(first), Some(paths)) => Ok((first, paths)),
        _ => Err(PathwayError::construction(format!(
            "pipeline {} is not fully bound",
            node.label()
        ))),
    }
}

pub(crate) fn sequence_parts(node: &Node) -> PathwayResult<(NodeId, Vec<NodeId>)> {
    let seq = node.sequence()?;
    let (first, paths) = bound_parts(node, seq)?;
    Ok((first, paths.to_vec()))
}

/// Arguments of [`Graph::encapsulate`].
pub struct Encapsulation {
    pub when: Predicate,
    pub then: Pathway,
    /// Defaults to the constant-`Null` pipeline.
    pub otherwise: Option<Pathway>,
}

/// Fluent form of [`Graph::encapsulate`]: `p.do_when(pred).or_else(&q)`.
pub struct ConditionalBuilder {
    then: Pathway,
    when: Predicate,
}

impl ConditionalBuilder {
    pub fn or_else(self, otherwise: &Pathway) -> PathwayResult<Pathway> {
        let graph = self.then.graph.clone();
        graph.encapsulate(Encapsulation {
            when: self.when,
            then: self.then,
            otherwise: Some(otherwise.clone()),
        })
    }

    /// Build with the default `Null` else-branch.
    pub fn build(self) -> PathwayResult<Pathway> {
        let graph = self.then.graph.clone();
        graph.encapsulate(Encapsulation {
            when: self.when,
            then: self.then,
            otherwise: None,
        })
    }
}

/// Handle to one node of a [`Graph`].
///
/// Equality is identity: two handles are equal when they address the same
/// node of the same graph.
#[derive(Clone)]
pub struct Pathway {
    pub(crate) graph: Graph,
    pub(crate) id: NodeId,
}

impl PartialEq for Pathway {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.graph.inner, &other.graph.inner)
    }
}

impl Eq for Pathway {}

impl fmt::Debug for Pathway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pathway")
            .field("id", &self.id)
            .field("name", &self.name())
            .finish()
    }
}

impl Pathway {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub(crate) fn node(&self) -> PathwayResult<Arc<Node>> {
        self.graph.lookup(self.id)
    }

    /// Name if one was given, otherwise the node id.
    pub fn name(&self) -> String {
        self.node()
            .map(|node| node.label())
            .unwrap_or_else(|_| self.id.to_string())
    }

    /// Tag with a human-readable name. Names are diagnostic only.
    ///
    /// The name lives on the node, not the handle. Composites are shared
    /// between every call site that built them from the same parts, so
    /// naming one renames it for all of them.
    pub fn named(self, name: impl Into<String>) -> Self {
        if let Ok(node) = self.node() {
            node.set_name(name);
        }
        self
    }

    /// Install the diagnostics hook for healing events of this pathway.
    ///
    /// One hook per node: installing a hook on a shared composite replaces
    /// the hook seen by every other handle to it.
    pub fn on_event<F>(self, hook: F) -> Self
    where
        F: Fn(&crate::pipeline::PathwayEvent) + Send + Sync + 'static,
    {
        if let Ok(node) = self.node() {
            node.set_hook(Arc::new(hook));
        }
        self
    }

    pub fn depth(&self) -> PathwayResult<usize> {
        self.graph.depth_of(self.id)
    }

    pub fn shape(&self) -> PathwayResult<Shape> {
        Shape::of(&self.graph, self.id)
    }

    // ========================================================================
    // Leaf configuration
    // ========================================================================

    pub fn set_evaluator<F>(&self, f: F) -> PathwayResult<()>
    where
        F: Fn(Value) -> PathwayResult<Value> + Send + Sync + 'static,
    {
        self.node()?.leaf()?.set_evaluator(sync_evaluator(f))
    }

    pub fn set_evaluator_async<F, Fut>(&self, f: F) -> PathwayResult<()>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PathwayResult<Value>> + Send + 'static,
    {
        self.node()?.leaf()?.set_evaluator(async_evaluator(f))
    }

    /// Attach the persistent cache. Fails if one is already attached.
    pub fn set_cache(&self, cache: Arc<dyn PersistentCache>) -> PathwayResult<()> {
        self.node()?.leaf()?.set_cache(cache)
    }

    /// Builder form of [`Pathway::set_cache`].
    pub fn with_cache(self, cache: impl PersistentCache + 'static) -> PathwayResult<Self> {
        self.set_cache(Arc::new(cache))?;
        Ok(self)
    }

    /// Append a synchronous validator.
    pub fn validate_with<F>(self, f: F) -> PathwayResult<Self>
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.node()?.leaf()?.add_validator(sync_validator(f));
        Ok(self)
    }

    /// Append an asynchronous validator.
    pub fn validate_with_async<F, Fut>(self, f: F) -> PathwayResult<Self>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PathwayResult<bool>> + Send + 'static,
    {
        self.node()?.leaf()?.add_validator(async_validator(f));
        Ok(self)
    }

    /// Bind the left side of an unbound pipeline.
    pub fn set_first(&self, first: &Pathway) -> PathwayResult<()> {
        self.graph.check_owner(first)?;
        first.depth()?;
        self.node()?.sequence()?.set_first(first.id)
    }

    /// Bind the right side of an unbound pipeline.
    pub fn set_paths(&self, paths: &[&Pathway]) -> PathwayResult<()> {
        let mut ids = Vec::with_capacity(paths.len());
        for path in paths {
            self.graph.check_owner(path)?;
            path.depth()?;
            ids.push(path.id);
        }
        self.node()?.sequence()?.set_paths(ids)
    }

    // ========================================================================
    // Composition algebra
    // ========================================================================

    /// Feed this pathway's output into every path.
    ///
    /// One path: the output is that path's output. Several: the output is
    /// the array of their outputs, each computed from this output
    /// independently.
    pub fn extend(&self, paths: &[&Pathway]) -> PathwayResult<Pathway> {
        if paths.is_empty() {
            return Err(PathwayError::construction(format!(
                "extend() on {} needs at least one path",
                self.name()
            )));
        }
        let first_depth = self.depth()?;
        let mut ids = Vec::with_capacity(paths.len());
        for path in paths {
            self.graph.check_owner(path)?;
            ids.push(path.id);
        }

        let graph = self.graph.clone();
        let first = self.id;
        self.graph
            .shared_or_insert(CompositionKey::Sequence(first, ids.clone()), move || {
                let depth = first_depth + graph.max_depth(&ids)?;
                Ok(NodeKind::Sequence(Sequence::bound(first, ids, depth)))
            })
    }

    /// Single-path [`Pathway::extend`].
    pub fn then(&self, next: &Pathway) -> PathwayResult<Pathway> {
        self.extend(&[next])
    }

    /// Keep this output alive alongside `other`'s: output `[self, other]`.
    pub fn expand(&self, other: &Pathway) -> PathwayResult<Pathway> {
        let passthru = self.graph.passthru();
        self.extend(&[&passthru, other])
    }

    /// Feed this output into `check`; pass this output through unchanged if
    /// `check` succeeds, fail the whole evaluation otherwise.
    pub fn assert(&self, check: &Pathway) -> PathwayResult<Pathway> {
        self.graph.check_owner(check)?;
        let depth = self.depth()? + check.depth()?;
        let (base, check) = (self.id, check.id);
        self.graph
            .shared_or_insert(CompositionKey::Assertion(base, check), || {
                Ok(NodeKind::Assertion { base, check, depth })
            })
    }

    /// Run this pathway in a brand-new evaluation session.
    pub fn isolate(&self, policy: IsolationPolicy) -> PathwayResult<Pathway> {
        let depth = self.depth()?;
        let inner = self.id;
        self.graph
            .shared_or_insert(CompositionKey::Isolated(inner, policy), || {
                Ok(NodeKind::Isolated {
                    inner,
                    policy,
                    depth,
                })
            })
    }

    /// Append identity stages until the depth equals `target`.
    pub fn pad_right(&self, target: usize) -> PathwayResult<Pathway> {
        let mut depth = self.depth()?;
        if target < depth {
            return Err(PathwayError::construction(format!(
                "cannot pad {} of depth {} to smaller depth {}",
                self.name(),
                depth,
                target
            )));
        }
        let passthru = self.graph.passthru();
        let mut padded = self.clone();
        while depth < target {
            padded = padded.then(&passthru)?;
            depth += 1;
        }
        Ok(padded)
    }

    /// Start the fluent conditional builder with this pathway as the
    /// "do" branch.
    pub fn do_when<F>(&self, when: F) -> ConditionalBuilder
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        ConditionalBuilder {
            then: self.clone(),
            when: Arc::new(when),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extend_is_referentially_idempotent() {
        let graph = Graph::default();
        let a = graph.value(1);
        let b = graph.passthru();
        let c = graph.node("double", |v| Ok(json!(v.as_i64().unwrap_or(0) * 2)));

        let first = a.extend(&[&b, &c]).unwrap();
        let second = a.extend(&[&b, &c]).unwrap();
        assert_eq!(first, second);

        let reordered = a.extend(&[&c, &b]).unwrap();
        assert_ne!(first, reordered);
    }

    #[test]
    fn test_depth_is_associative() {
        let graph = Graph::default();
        let a = graph.value(1);
        let b = graph.passthru();
        let c = graph.passthru();

        let left = a.then(&b).unwrap().then(&c).unwrap();
        let right = a.then(&b.then(&c).unwrap()).unwrap();
        assert_eq!(left.depth().unwrap(), 3);
        assert_eq!(right.depth().unwrap(), 3);
    }

    #[test]
    fn test_depth_uses_deepest_path() {
        let graph = Graph::default();
        let a = graph.value(1);
        let long = graph.passthru().pad_right(3).unwrap();
        let short = graph.passthru();
        assert_eq!(a.extend(&[&short, &long]).unwrap().depth().unwrap(), 4);
    }

    #[test]
    fn test_pad_right() {
        let graph = Graph::default();
        let p = graph.value(3).then(&graph.passthru()).unwrap();
        assert_eq!(p.depth().unwrap(), 2);

        let padded = p.pad_right(5).unwrap();
        assert_eq!(padded.depth().unwrap(), 5);
        assert_eq!(p.pad_right(2).unwrap(), p);
        assert_eq!(p.pad_right(5).unwrap(), padded);

        let err = padded.pad_right(4).unwrap_err();
        assert!(err.to_string().contains("smaller depth"));
    }

    #[test]
    fn test_combined_depth_and_sharing() {
        let graph = Graph::default();
        let p5 = graph.value(3).pad_right(5).unwrap();
        let p4 = graph.value(2).pad_right(4).unwrap();
        let p2 = graph.value(1).pad_right(2).unwrap();

        let merged = graph.combined(&[&p5, &p4, &p2]).unwrap();
        assert_eq!(merged.depth().unwrap(), 5);
        assert_eq!(graph.require(&[&p5, &p4, &p2]).unwrap(), merged);
    }

    #[test]
    fn test_conditional_depth_is_branch_max() {
        let graph = Graph::default();
        let deep = graph.passthru().pad_right(4).unwrap();
        let shallow = graph.value("fallback");

        let cond = deep.do_when(|v| v.is_string()).or_else(&shallow).unwrap();
        assert_eq!(cond.depth().unwrap(), 4);

        let defaulted = shallow.do_when(|_| false).build().unwrap();
        assert_eq!(defaulted.depth().unwrap(), 1);
    }

    #[test]
    fn test_empty_compositions_rejected() {
        let graph = Graph::default();
        let a = graph.value(1);
        assert!(a.extend(&[]).is_err());
        assert!(graph.combined(&[]).is_err());
    }

    #[test]
    fn test_cross_graph_composition_rejected() {
        let one = Graph::default();
        let two = Graph::default();
        let err = one.value(1).then(&two.passthru()).unwrap_err();
        assert!(err.to_string().contains("different graph"));
    }

    #[test]
    fn test_unbound_pipeline() {
        let graph = Graph::default();
        let p = graph.pipeline("deferred");
        assert!(p.depth().is_err());

        let a = graph.value(1);
        p.set_first(&a).unwrap();
        assert!(p.set_first(&a).is_err());
        p.set_paths(&[&graph.passthru()]).unwrap();
        assert_eq!(p.depth().unwrap(), 2);

        // An unbound pipeline cannot be used as a building block.
        let q = graph.pipeline("still-unbound");
        assert!(q.then(&a).is_err());
        assert!(p.set_paths(&[&q]).is_err());
    }

    #[test]
    fn test_leaf_configuration_on_composite_fails() {
        let graph = Graph::default();
        let p = graph.value(1).then(&graph.passthru()).unwrap();
        assert!(p.set_evaluator(Ok).is_err());
        assert!(p.clone().validate_with(|_| true).is_err());
    }

    #[test]
    fn test_naming_shared_composite_renames_every_handle() {
        let graph = Graph::default();
        let a = graph.value(1);
        let b = graph.passthru();
        let here = a.then(&b).unwrap();
        let there = a.then(&b).unwrap();

        here.named("jwks-for-holder");
        assert_eq!(there.name(), "jwks-for-holder");
    }

    #[test]
    fn test_arena_grows_per_leaf_not_per_shared_composite() {
        let graph = Graph::default();
        assert_eq!(graph.len(), 2);

        let a = graph.value(1);
        let b = graph.value(1);
        assert_ne!(a, b);
        assert_eq!(graph.len(), 4);

        a.then(&b).unwrap();
        a.then(&b).unwrap();
        assert_eq!(graph.len(), 5);
    }

    #[test]
    fn test_named_and_expand_share() {
        let graph = Graph::default();
        let a = graph.value(1).named("client-id");
        assert_eq!(a.name(), "client-id");
        let b = graph.passthru();
        assert_eq!(a.expand(&b).unwrap(), a.expand(&b).unwrap());
        assert_eq!(a.expand(&b).unwrap().depth().unwrap(), 2);
    }
}
