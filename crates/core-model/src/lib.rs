//! Shared domain types for the dataflow animation runtime: slot and state
//! metadata, the const pool, expression tables, the compiled program
//! contract, and the `RenderFrame` output contract.
//!
//! This crate holds no runtime behavior — only the types every other crate
//! in the workspace reads or produces. Keeping them here (rather than in
//! `core-exec`) avoids a dependency cycle between the executor and the
//! components it drives (eval, field, cache, hotswap all need these types
//! without needing each other).

pub mod bus;
pub mod const_pool;
pub mod error;
pub mod expr;
pub mod materialize;
pub mod opcode;
pub mod probe;
pub mod project;
pub mod render_frame;
pub mod schedule;
pub mod slot;
pub mod state_layout;
pub mod time;
pub mod value;

pub use bus::{EventBusSpec, EventCombineMode, Publisher, SignalBusSpec, SignalCombineMode, SilentValue};
pub use const_pool::{ConstBank, ConstId, ConstPool};
pub use error::RuntimeFault;
pub use expr::{
    ArithOp, CompareOp, EasingKind, EventExpr, EventExprId, FieldExpr, FieldExprId, FieldRecipe,
    FieldTransformOp, Lens, SignalExpr, SignalExprId, TimeSource, TrigOp, UnaryOp,
};
pub use materialize::{BufferFormat, BufferKey, ClipMode, CullMode, ElementType, PathCommand};
pub use opcode::OpCode;
pub use probe::{ProbeMode, ProbeSpec, ProbeSummary, ProbeTarget};
pub use project::{Camera, Mat4, ProjectConfig, ProjectCounters, Vec3};
pub use render_frame::{ClearMode, InstanceBatch2D, Pass, PathBatch2D, PerfCounters, RenderFrame};
pub use schedule::{
    AssembleSpec, ClearSpec, CompiledProgram, DebugMetadata, MaterializeColorSpec,
    MaterializeInstancesSpec, MaterializePathSpec, OutputSpec, Schedule, Step, StepId, StepKind,
};
pub use slot::{Domain, SlotId, SlotMeta, World};
pub use state_layout::{BankSizes, StableKey, StateCellMeta, StateLayout};
pub use time::{CyclicMode, PlaybackMode, TimeModel, TimeResolution, TimeState, WrapPayload};
pub use value::{StorageClass, Value};
