//! Signal Evaluator, Bus Combiner, and `nodeEval` opcode dispatch
//! (spec.md §4.6, §4.8, §4.10).

pub mod bus;
pub mod math;
pub mod node;
pub mod signal;

pub use bus::{combine_event_bus, combine_signal_bus};
pub use node::eval_node;
pub use signal::eval_signal;
