//! Composable, self-healing asynchronous dependency pipelines.
//!
//! A pipeline is a graph of asynchronous nodes, each with an evaluator, an
//! optional persistent cache and optional validators. Nodes are composed with
//! a small algebra ([`Pathway::extend`], [`Pathway::expand`],
//! [`Pathway::assert`], [`Graph::combined`], [`Pathway::isolate`],
//! [`Pathway::do_when`]) and evaluated with intra-call memoization so a
//! dependency shared by several branches runs once per call.
//!
//! When a cached value turns out to be stale,
//! [`Pathway::get_with_healing`] re-evaluates with a distrust window that
//! grows from the most downstream node inward until a validator accepts the
//! result.
//!
//! ```ignore
//! let graph = pathway::Graph::new(pathway::GraphOptions::from_env()?);
//! let token = graph.value("client-1").then(&fetch_token)?;
//! let value = token.get_with_healing(pathway::HealingOptions::default()).await?;
//! ```

pub mod cache;
pub mod errors;
pub mod graph;
pub mod logging;
pub mod options;
pub mod pipeline;
pub mod value;

pub use cache::{FileCache, MemoryCache, PersistentCache};
pub use errors::{ErrorKind, PathwayError, PathwayResult, validation_failed};
pub use graph::{ConditionalBuilder, Encapsulation, Graph, IsolationPolicy, NodeId, Pathway, Shape};
pub use logging::{LoggingOptions, init_logging};
pub use options::GraphOptions;
pub use pipeline::{
    AttemptMetrics, AttemptOutcome, Direction, EvaluateOptions, HealingOptions, HealingReport,
    PathwayEvent,
};
pub use value::Value;
