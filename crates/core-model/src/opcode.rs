//! Opcodes for `nodeEval` steps (spec.md §4.10).
//!
//! `nodeEval` is deliberately generic: it reads `inputSlots`, evaluates an
//! opcode, and writes `outputSlots`. Integrators and delays are the only
//! opcodes that touch the State Buffer; everything else is a pure function
//! of its inputs for the current frame.

use crate::state_layout::StableKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Add,
    Sub,
    Mul,
    Div,
    Sin,
    Cos,
    /// Vec2 add: reads `(x0,y0,x1,y1)`, writes `(x,y)`.
    Vec2Add,
    /// Vec2 scale: reads `(x,y,scalar)`, writes `(x,y)`.
    Vec2Scale,
    /// HSV -> RGB, each channel in `[0,1]`. Reads `(h,s,v)`, writes `(r,g,b)`.
    HsvToRgb,
    /// RGB -> HSV, each channel in `[0,1]`. Reads `(r,g,b)`, writes `(h,s,v)`.
    RgbToHsv,
    /// Persistent running sum: `state += input * dtMs`. Identified by a
    /// stable state key so hot-swap can preserve the accumulator
    /// (spec.md §4.11).
    Integrate { state_key: StableKey },
    /// Outputs the value the input held `delayMs` ago, backed by a ring
    /// buffer in the State Buffer, keyed the same way.
    Delay { state_key: StableKey, delay_ms: f64 },
}
