//! Schedule Executor, Time Resolver, and Runtime Adapter
//! (spec.md §4.5, §4.10, §6).

pub mod adapter;
pub mod debug_probe;
pub mod executor;
pub mod time_resolver;

pub use adapter::{HostEvent, RuntimeAdapter, RuntimeCtx, Viewport};
pub use debug_probe::ProbeStore;
pub use executor::execute_frame;
pub use time_resolver::resolve as resolve_time;
