//! Evaluation engine and healing controller.
//!
//! This module turns a composed [`Pathway`] into a single concurrent
//! execution plan and drives it:
//! - Intra-call memoization by input identity and by input value
//! - Selective persistent-cache consultation under a distrust window
//! - Self-healing: re-evaluation with a growing distrust window until a
//!   validator accepts the result
//!
//! ## Architecture
//!
//! ```text
//! Pathway → Planner → Branch evaluators → Thunks
//!
//! - Planner: builds (and memoizes) one branch evaluator per node and distance
//! - Branch: wires input thunks to output thunks; no work until forced
//! - Session: per-call memo tables, distrust window and direction
//! - Healing: repeats evaluation with windows 0..=depth
//! ```
//!
//! ## Distrust window
//!
//! Every branch knows its distance from the right end of the evaluated
//! pipeline. A node's cache is read only when `distance >= window`, so
//! window 0 trusts every cache and each further window distrusts one more
//! position, counted from the most downstream node inward.
//!
//! ## Example
//!
//! ```ignore
//! use pathway::{Graph, HealingOptions};
//!
//! let graph = Graph::default();
//! let discovery = graph.node_async("discovery", fetch_metadata).with_cache(disk_cache)?;
//! let jwks = discovery.then(&graph.node_async("jwks", fetch_jwks))?;
//!
//! let keys = jwks
//!     .get_with_healing(HealingOptions::default().validator(|keys| !keys.is_null()))
//!     .await?;
//! ```

mod branch;
mod healing;
mod metrics;
mod session;

pub use healing::HealingOptions;
pub use metrics::{AttemptMetrics, AttemptOutcome, HealingReport};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{PathwayError, PathwayResult};
use crate::graph::Pathway;
use crate::value::Value;
use session::Session;

/// Order in which a sequence's left and right sides are driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// The right side receives the left side lazily and decides when to
    /// force it; a trusted cache hit on the right skips the left entirely.
    #[default]
    LazyRightDriven,
    /// The left side is fully resolved before any right-side work,
    /// cache reads included.
    EagerLeftFirst,
}

impl FromStr for Direction {
    type Err = PathwayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lazy" | "lazy_right_driven" | "lazy-right-driven" => Ok(Self::LazyRightDriven),
            "eager" | "eager_left_first" | "eager-left-first" => Ok(Self::EagerLeftFirst),
            other => Err(PathwayError::Config(format!("unknown direction '{}'", other))),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LazyRightDriven => f.write_str("lazy-right-driven"),
            Self::EagerLeftFirst => f.write_str("eager-left-first"),
        }
    }
}

/// Options of a single [`Pathway::evaluate`] call.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluateOptions {
    /// Count of rightmost positions whose caches are not read.
    pub window: usize,
    /// Falls back to the graph's default direction.
    pub direction: Option<Direction>,
}

impl EvaluateOptions {
    pub fn window(window: usize) -> Self {
        Self {
            window,
            direction: None,
        }
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }
}

/// Diagnostics delivered to a pathway's event hook while it is healed.
#[derive(Debug, Clone)]
pub enum PathwayEvent {
    AttemptStarted { window: usize },
    /// Evaluation succeeded but the validator did not accept the value.
    AttemptRejected { window: usize },
    AttemptFailed { window: usize, error: PathwayError },
    Healed { window: usize },
    Exhausted { depth: usize },
}

impl Pathway {
    /// Evaluate once with the given distrust window.
    ///
    /// Errors escaping the evaluation are annotated with this pathway's name
    /// and the window in effect. Misuse errors surface unannotated before any
    /// evaluator runs.
    pub async fn evaluate(&self, input: Value, options: EvaluateOptions) -> PathwayResult<Value> {
        let direction = options
            .direction
            .unwrap_or(self.graph.options().default_direction);
        let session = Session::new(self.graph.clone(), options.window, direction);
        let branch = session.planner.branch(self.id, 0)?;

        tracing::trace!(
            pipeline = %self.name(),
            window = options.window,
            %direction,
            "Evaluating pathway"
        );

        let _closing = session.closing();
        let input = session.ready(input);
        branch
            .run(&session, input)
            .force()
            .await
            .map_err(|e| PathwayError::Evaluation {
                pipeline: self.name(),
                window: options.window,
                source: Box::new(e),
            })
    }

    /// Evaluate with every cache trusted and no input.
    pub async fn get(&self) -> PathwayResult<Value> {
        self.evaluate(Value::Null, EvaluateOptions::default()).await
    }

    pub(crate) fn emit(&self, event: PathwayEvent) {
        if let Ok(node) = self.node() {
            node.emit(event);
        }
    }
}
