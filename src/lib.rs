//! Typed access to feature flags.
//!
//! A [FlagEngine] loads a YAML or JSON flag document from one or more [Retriever]s, evaluates
//! it per user, and keeps it fresh in the background. Flags declare named `variations`, a
//! `defaultRule`, and optional `targeting` rules made of structured clauses
//! (`attribute`/`op`/`values`); targeting `query` strings are not supported.
//!
//! The [TypedFlags] extension trait layers typed accessors over any [Engine]: each returns a
//! [Resolved] carrying either the flag's value or the caller's default alongside the [Error]
//! that forced it. The [global] module binds the same accessors to a process-wide client.

mod accessors;
mod attribute_value;
mod config;
mod context;
mod engine;
mod error;
mod eval;
mod flag;
mod flag_value;
pub mod global;
mod poller;
mod retriever;
mod rule;
mod store;
mod test_common;
mod util;
mod variation;

pub use accessors::*;
pub use attribute_value::*;
pub use config::*;
pub use context::*;
pub use engine::*;
pub use error::*;
pub use eval::*;
pub use flag::*;
pub use flag_value::*;
pub use retriever::*;
pub use rule::*;
pub use store::*;
pub use variation::*;
