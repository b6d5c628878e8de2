//! Persistent runtime storage: the Value Store (per-frame slots) and the
//! State Buffer (cross-frame cells) — spec.md §4.1, §4.2.
//!
//! Time continuity (`TimeState`) is a plain data type owned by `core-model`;
//! this crate re-exports it alongside the two storage engines so callers
//! assembling a full runtime state only need one `use core_state::*;`.

pub mod state_buffer;
pub mod value_store;

pub use core_model::TimeState;
pub use state_buffer::StateBuffer;
pub use value_store::ValueStore;
