//! Fatal, non-recoverable-inside-a-frame programming errors
//! (spec.md §7 "Programming errors from a malformed compiled program").
//!
//! These always name the offending step and/or slot so a compiler bug can
//! be traced back to its source, per spec.md §7: "fail the frame immediately
//! with a descriptive message naming the offending step id and slot id."

use crate::expr::{EventExprId, FieldExprId, SignalExprId};
use crate::schedule::StepId;
use crate::slot::SlotId;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum RuntimeFault {
    #[error("step {step:?} references slot {slot:?} which has no metadata entry")]
    MissingSlotMeta { step: StepId, slot: SlotId },

    #[error("step {step:?} wrote slot {slot:?} twice in the same frame")]
    DoubleWrite { step: StepId, slot: SlotId },

    #[error("step {step:?} wrote slot {slot:?} with storage class {attempted:?}, expected {expected:?}")]
    StorageMismatch {
        step: StepId,
        slot: SlotId,
        expected: crate::value::StorageClass,
        attempted: crate::value::StorageClass,
    },

    #[error("step {step:?} read slot {slot:?} which has no metadata entry")]
    UnknownSlotRead { step: StepId, slot: SlotId },

    #[error("signal expression id {0:?} is out of range")]
    BadSignalExprId(SignalExprId),

    #[error("field expression id {0:?} is out of range")]
    BadFieldExprId(FieldExprId),

    #[error("event expression id {0:?} is out of range")]
    BadEventExprId(EventExprId),

    #[error("step {step:?} of kind {kind} requires a non-empty {table} table but the program has none")]
    MissingRequiredTable {
        step: StepId,
        kind: &'static str,
        table: &'static str,
    },

    #[error("hot-swap failed while constructing the new runtime: {reason}")]
    HotSwapConstructionFailed { reason: String },
}
