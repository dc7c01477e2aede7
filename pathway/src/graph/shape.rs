//! Derived, read-only description of a pipeline's composition structure.

use std::fmt;

use super::node::{IsolationPolicy, NodeId, NodeKind};
use super::{Graph, sequence_parts};
use crate::errors::PathwayResult;

/// Tree mirroring how a pathway was composed.
///
/// Every variant reports a depth: the maximum count of sequential node
/// evaluations from the root to the deepest leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// `void` or `passthru`.
    Identity { id: NodeId, name: String },
    Leaf { id: NodeId, name: String },
    Sequence {
        id: NodeId,
        name: String,
        depth: usize,
        first: Box<Shape>,
        paths: Vec<Shape>,
    },
    Merge {
        id: NodeId,
        name: String,
        depth: usize,
        branches: Vec<Shape>,
    },
    Conditional {
        id: NodeId,
        name: String,
        depth: usize,
        then: Box<Shape>,
        otherwise: Box<Shape>,
    },
    Assertion {
        id: NodeId,
        name: String,
        depth: usize,
        base: Box<Shape>,
        check: Box<Shape>,
    },
    Isolated {
        id: NodeId,
        name: String,
        depth: usize,
        policy: IsolationPolicy,
        inner: Box<Shape>,
    },
}

impl Shape {
    pub(crate) fn of(graph: &Graph, id: NodeId) -> PathwayResult<Shape> {
        let node = graph.lookup(id)?;
        let name = node.label();
        let shape = match &node.kind {
            NodeKind::Void | NodeKind::Passthru => Shape::Identity { id, name },
            NodeKind::Leaf(_) => Shape::Leaf { id, name },
            NodeKind::Sequence(_) => {
                let (first, paths) = sequence_parts(&node)?;
                Shape::Sequence {
                    id,
                    name,
                    depth: graph.depth_of(id)?,
                    first: Box::new(Shape::of(graph, first)?),
                    paths: paths
                        .iter()
                        .map(|path| Shape::of(graph, *path))
                        .collect::<PathwayResult<_>>()?,
                }
            }
            NodeKind::Merge { branches, depth } => Shape::Merge {
                id,
                name,
                depth: *depth,
                branches: branches
                    .iter()
                    .map(|branch| Shape::of(graph, *branch))
                    .collect::<PathwayResult<_>>()?,
            },
            NodeKind::Conditional {
                then,
                otherwise,
                depth,
                ..
            } => Shape::Conditional {
                id,
                name,
                depth: *depth,
                then: Box::new(Shape::of(graph, *then)?),
                otherwise: Box::new(Shape::of(graph, *otherwise)?),
            },
            NodeKind::Assertion { base, check, depth } => Shape::Assertion {
                id,
                name,
                depth: *depth,
                base: Box::new(Shape::of(graph, *base)?),
                check: Box::new(Shape::of(graph, *check)?),
            },
            NodeKind::Isolated {
                inner,
                policy,
                depth,
            } => Shape::Isolated {
                id,
                name,
                depth: *depth,
                policy: *policy,
                inner: Box::new(Shape::of(graph, *inner)?),
            },
        };
        Ok(shape)
    }

    pub fn id(&self) -> NodeId {
        match self {
            Shape::Identity { id, .. }
            | Shape::Leaf { id, .. }
            | Shape::Sequence { id, .. }
            | Shape::Merge { id, .. }
            | Shape::Conditional { id, .. }
            | Shape::Assertion { id, .. }
            | Shape::Isolated { id, .. } => *id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Shape::Identity { name, .. }
            | Shape::Leaf { name, .. }
            | Shape::Sequence { name, .. }
            | Shape::Merge { name, .. }
            | Shape::Conditional { name, .. }
            | Shape::Assertion { name, .. }
            | Shape::Isolated { name, .. } => name,
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            Shape::Identity { .. } | Shape::Leaf { .. } => 1,
            Shape::Sequence { depth, .. }
            | Shape::Merge { depth, .. }
            | Shape::Conditional { depth, .. }
            | Shape::Assertion { depth, .. }
            | Shape::Isolated { depth, .. } => *depth,
        }
    }

    fn children(&self) -> Vec<&Shape> {
        match self {
            Shape::Identity { .. } | Shape::Leaf { .. } => Vec::new(),
            Shape::Sequence { first, paths, .. } => {
                std::iter::once(first.as_ref()).chain(paths.iter()).collect()
            }
            Shape::Merge { branches, .. } => branches.iter().collect(),
            Shape::Conditional {
                then, otherwise, ..
            } => vec![then.as_ref(), otherwise.as_ref()],
            Shape::Assertion { base, check, .. } => vec![base.as_ref(), check.as_ref()],
            Shape::Isolated { inner, .. } => vec![inner.as_ref()],
        }
    }

    fn tag(&self) -> &'static str {
        match self {
            Shape::Identity { .. } => "identity",
            Shape::Leaf { .. } => "leaf",
            Shape::Sequence { .. } => "sequence",
            Shape::Merge { .. } => "merge",
            Shape::Conditional { .. } => "conditional",
            Shape::Assertion { .. } => "assertion",
            Shape::Isolated { .. } => "isolated",
        }
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        writeln!(
            f,
            "{:indent$}{} {} [{}] depth={}",
            "",
            self.tag(),
            self.name(),
            self.id(),
            self.depth(),
            indent = indent * 2
        )?;
        for child in self.children() {
            child.render(f, indent + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::Graph;

    #[test]
    fn test_shape_mirrors_composition() {
        let graph = Graph::default();
        let a = graph.value(1).named("a");
        let b = graph.passthru();
        let p = a.extend(&[&b, &b.then(&b).unwrap()]).unwrap();

        let shape = p.shape().unwrap();
        assert_eq!(shape.depth(), 3);
        assert_eq!(shape.depth(), p.depth().unwrap());

        let rendered = shape.to_string();
        assert!(rendered.starts_with("sequence"));
        assert!(rendered.contains("leaf a"));
        assert_eq!(rendered.lines().count(), 6);
    }

    #[test]
    fn test_shape_of_unbound_pipeline_fails() {
        let graph = Graph::default();
        assert!(graph.pipeline("open").shape().is_err());
    }
}
