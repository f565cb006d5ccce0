//! In-memory query interpretation.
//!
//! Reads are recognized into a [`QueryPlan`] and evaluated over cached rows.
//! Writes are recognized into a [`Mutation`] and mirrored into the cache
//! before the server confirms them.

mod eval;
mod mutation;
mod parse;
mod plan;

pub use eval::{like, Truth};
pub use mutation::{Mutation, OnConflict};
pub use plan::{CompareOp, Filter, Projection, QueryPlan, SortKey};
