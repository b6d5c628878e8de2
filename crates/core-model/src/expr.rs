//! Signal and field expression tables (spec.md §4.6, §4.7).
//!
//! Expression ids index dense tables owned by the [`crate::schedule::CompiledProgram`].
//! The graphs these ids describe are acyclic by construction (guaranteed
//! upstream by the compiler); the evaluator in `core-eval` relies on that to
//! terminate without a visited-set.

use crate::const_pool::ConstId;
use crate::slot::SlotId;
use crate::state_layout::StableKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalExprId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldExprId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventExprId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSource {
    TAbsMs,
    TModelMs,
    Phase01,
    Progress01,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Abs,
    Sqrt,
    Floor,
    Ceil,
    Round,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrigOp {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EasingKind {
    Linear,
    InQuad,
    OutQuad,
    InOutQuad,
    InCubic,
    OutCubic,
    InOutCubic,
}

/// One node of the acyclic signal expression graph. Evaluation semantics for
/// every variant live in `core-eval::signal` (spec.md §4.6 step 2 dispatch).
#[derive(Debug, Clone, PartialEq)]
pub enum SignalExpr {
    Const(ConstId),
    Time(TimeSource),
    SlotRead(SlotId),
    Arith(ArithOp, SignalExprId, SignalExprId),
    Unary(UnaryOp, SignalExprId),
    Compare(CompareOp, SignalExprId, SignalExprId),
    Trig(TrigOp, SignalExprId),
    /// `clamp(x, min, max)`.
    Clamp {
        x: SignalExprId,
        min: SignalExprId,
        max: SignalExprId,
    },
    Lerp {
        a: SignalExprId,
        b: SignalExprId,
        t: SignalExprId,
    },
    Smoothstep {
        edge0: SignalExprId,
        edge1: SignalExprId,
        x: SignalExprId,
    },
    /// Quantization step count `<= 0` is normalized to `1` (spec.md §4.6).
    Quantize {
        x: SignalExprId,
        steps: SignalExprId,
    },
    Easing {
        kind: EasingKind,
        t: SignalExprId,
    },
}

/// Transform applied to an existing field to derive a new one
/// (spec.md §4.7 "transform of another field").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTransformOp {
    Negate,
    Invert,
}

/// How a field's per-element values are produced before lenses are applied
/// (spec.md §4.7).
#[derive(Debug, Clone, PartialEq)]
pub enum FieldRecipe {
    Const(ConstId),
    BroadcastSignal(SignalExprId),
    /// Per-element pseudo-random value seeded by `(seed, elementIndex)`.
    RandomSeeded { seed: u64 },
    Transform {
        base: FieldExprId,
        op: FieldTransformOp,
    },
    /// Lookup by a compiler-assigned source tag (e.g. a named attribute
    /// stream attached to the domain).
    SourceTag(String),
}

/// A per-listener transformation applied when a field is consumed
/// (spec.md Glossary "Lens").
#[derive(Debug, Clone, PartialEq)]
pub enum Lens {
    Ease(EasingKind),
    /// Exponential approach toward the target value; `rate` is per-ms decay.
    /// Maintains its own persistent micro-state (previous value, previous
    /// time, one pair per domain element) in the State Buffer, addressed by
    /// `state_key` (spec.md §4.7).
    Slew {
        rate: SignalExprId,
        state_key: StableKey,
    },
    Quantize { steps: SignalExprId },
    Scale { factor: SignalExprId },
    Warp { amount: SignalExprId },
    Clamp { min: SignalExprId, max: SignalExprId },
    Deadzone { threshold: SignalExprId },
    MapRange {
        in_min: SignalExprId,
        in_max: SignalExprId,
        out_min: SignalExprId,
        out_max: SignalExprId,
    },
    Polarity,
    Broadcast,
    PerElementOffset { offset: SignalExprId },
}

/// One node of the field expression table.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldExpr {
    pub id: FieldExprId,
    /// Slot holding the domain element count `N`.
    pub domain_slot: SlotId,
    pub recipe: FieldRecipe,
    pub lenses: Vec<Lens>,
}

/// Minimal discrete-event predicate table entry. The wrap event is triggered
/// directly by the Time Resolver (spec.md §4.5); other events may be
/// declared by the compiler as rising-edge detectors over a signal.
#[derive(Debug, Clone, PartialEq)]
pub enum EventExpr {
    RisingEdge {
        signal: SignalExprId,
        threshold: SignalExprId,
    },
}
