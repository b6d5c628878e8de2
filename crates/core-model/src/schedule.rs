//! The compiled program ingest contract (spec.md §3 "Compiled Program",
//! §4.10 "Schedule Executor").

use std::collections::HashMap;

use crate::bus::{EventBusSpec, SignalBusSpec};
use crate::const_pool::{ConstId, ConstPool};
use crate::expr::{EventExpr, FieldExpr, FieldExprId, SignalExpr, SignalExprId};
use crate::opcode::OpCode;
use crate::probe::ProbeSpec;
use crate::project::ProjectConfig;
use crate::slot::{SlotId, SlotMeta};
use crate::state_layout::StateLayout;
use crate::time::TimeModel;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearSpec {
    ColorConst(ConstId),
    None,
}

#[derive(Debug, Clone)]
pub struct MaterializeInstancesSpec {
    pub domain_slot: SlotId,
    pub x: FieldExprId,
    pub y: FieldExprId,
    pub z: Option<FieldExprId>,
    pub r: FieldExprId,
    pub g: FieldExprId,
    pub b: FieldExprId,
    pub a: FieldExprId,
    pub size: FieldExprId,
    pub alive: Option<FieldExprId>,
    pub out_slot: SlotId,
}

#[derive(Debug, Clone)]
pub struct MaterializeColorSpec {
    pub domain_slot: SlotId,
    pub color: FieldExprId,
    pub packed: bool,
    pub out_slot: SlotId,
}

#[derive(Debug, Clone)]
pub struct MaterializePathSpec {
    pub domain_slot: SlotId,
    pub cmd_field: FieldExprId,
    pub point_field: FieldExprId,
    pub out_slot: SlotId,
}

#[derive(Debug, Clone)]
pub struct AssembleSpec {
    pub pass_slots: Vec<SlotId>,
    pub clear: ClearSpec,
    pub out_slot: SlotId,
}

/// A single unit of scheduled work, in compiled, fixed total order
/// (spec.md §4.10).
#[derive(Debug, Clone)]
pub enum StepKind {
    TimeDerive,
    SignalEval {
        outputs: Vec<(SignalExprId, SlotId)>,
    },
    NodeEval {
        opcode: OpCode,
        inputs: Vec<SlotId>,
        outputs: Vec<SlotId>,
    },
    BusEval(SignalBusSpec),
    EventBusEval(EventBusSpec),
    Materialize(MaterializeInstancesSpec),
    MaterializeColor(MaterializeColorSpec),
    MaterializePath(MaterializePathSpec),
    MaterializeTestGeometry {
        domain_slot: SlotId,
        out_slot: SlotId,
    },
    Project3DTo2D(ProjectConfig),
    CameraEval {
        out_slot: SlotId,
    },
    MeshMaterialize {
        mesh_slot: SlotId,
        out_slot: SlotId,
    },
    RenderAssemble(AssembleSpec),
    DebugProbe(ProbeSpec),
}

#[derive(Debug, Clone)]
pub struct Step {
    pub id: StepId,
    pub kind: StepKind,
}

#[derive(Debug, Clone, Default)]
pub struct Schedule {
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Copy)]
pub struct OutputSpec {
    pub primary_output_slot: SlotId,
}

/// Debug metadata mapping steps and slots back to author nodes. Informational
/// only; the executor never consults it for correctness (spec.md §3).
#[derive(Debug, Clone, Default)]
pub struct DebugMetadata {
    pub step_to_node: HashMap<StepId, String>,
    pub slot_to_node: HashMap<SlotId, String>,
}

/// The opaque input contract the core consumes (spec.md §3, §6).
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    pub time_model: TimeModel,
    pub slots: Vec<SlotMeta>,
    pub state_layout: StateLayout,
    pub const_pool: ConstPool,
    pub signal_table: Vec<SignalExpr>,
    pub field_table: Vec<FieldExpr>,
    pub event_table: Vec<EventExpr>,
    pub schedule: Schedule,
    pub initial_slot_values: HashMap<SlotId, Value>,
    pub output: OutputSpec,
    pub debug: DebugMetadata,
    /// Compiler-designated slot the Time Resolver writes `tAbsMs` into.
    pub t_abs_slot: SlotId,
    /// Compiler-designated slot the Time Resolver writes `tModelMs` into.
    pub t_model_slot: SlotId,
    pub phase_slot: Option<SlotId>,
    pub progress_slot: Option<SlotId>,
    /// Compiler-designated slot the wrap event is triggered on (cyclic only).
    pub wrap_event_slot: Option<SlotId>,
}

impl CompiledProgram {
    pub fn slot_meta(&self, slot: SlotId) -> Option<&SlotMeta> {
        self.slots.iter().find(|m| m.id == slot)
    }

    pub fn signal_expr(&self, id: SignalExprId) -> Option<&SignalExpr> {
        self.signal_table.get(id.0 as usize)
    }

    pub fn field_expr(&self, id: FieldExprId) -> Option<&FieldExpr> {
        self.field_table.get(id.0 as usize)
    }

    pub fn event_expr(&self, id: crate::expr::EventExprId) -> Option<&EventExpr> {
        self.event_table.get(id.0 as usize)
    }
}
