//! Pipeline-construction memoization.
//!
//! Business code typically exposes functions such as "the pipeline that
//! fetches the JWKS of data holder X". Routing them through
//! [`Graph::memoized`] guarantees that two call sites asking for the same
//! arguments get the identical pathway, which keeps structural sharing intact
//! across independently written builders.

use serde::Serialize;

use super::{Graph, Pathway};
use crate::errors::PathwayResult;

impl Graph {
    /// Construct once per distinct `(name, args)`.
    ///
    /// Arguments are compared by their serialized form. `build` runs without
    /// any table lock held, so it may itself call `memoized`.
    ///
    /// An unnamed result is named after the factory. When `build` returns a
    /// composite shared with other call sites, they see that name too.
    pub fn memoized<A, F>(&self, name: &str, args: &A, build: F) -> PathwayResult<Pathway>
    where
        A: Serialize + ?Sized,
        F: FnOnce(&Graph, &A) -> PathwayResult<Pathway>,
    {
        let key = (name.to_string(), serde_json::to_string(args)?);
        if let Some(id) = self.inner.factories.lock().get(&key) {
            return Ok(self.handle(*id));
        }

        let built = build(self, args)?;
        self.check_owner(&built)?;

        let id = *self.inner.factories.lock().entry(key).or_insert(built.id);
        if id == built.id {
            tracing::debug!(factory = name, node = %id, "Constructed pipeline");
            if built.node()?.name().is_none() {
                built.node()?.set_name(name);
            }
        }
        Ok(self.handle(id))
    }

    /// Construct on every call and tag the result with `name`.
    ///
    /// The tag is written to the node, so a shared composite returned by
    /// `build` is renamed for every handle to it. Each call may add nodes
    /// to the graph; prefer [`Graph::memoized`] outside startup code.
    pub fn tagged<F>(&self, name: &str, build: F) -> PathwayResult<Pathway>
    where
        F: FnOnce(&Graph) -> PathwayResult<Pathway>,
    {
        let built = build(self)?;
        self.check_owner(&built)?;
        Ok(built.named(name))
    }
}
