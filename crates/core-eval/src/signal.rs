//! Signal Evaluator: recursive expression tree evaluation over the Frame
//! Cache and slot reads (spec.md §4.6).
//!
//! The expression graph is acyclic by compiler guarantee, so this is a
//! plain recursive-descent evaluator with no cycle detection. Step 1 of
//! spec.md §4.6 is a cache check; step 3 writes the result back with the
//! current frame's stamp.

use core_model::{ArithOp, CompareOp, CompiledProgram, RuntimeFault, SignalExpr, SignalExprId,
    StepId, TimeResolution, TimeSource, TrigOp};
use core_cache::FrameCache;
use core_state::ValueStore;

use crate::math;

pub fn eval_signal(
    program: &CompiledProgram,
    cache: &mut FrameCache,
    value_store: &ValueStore,
    time: &TimeResolution,
    step: StepId,
    id: SignalExprId,
) -> Result<f64, RuntimeFault> {
    if let Some(v) = cache.signal_get(id) {
        return Ok(v);
    }
    let expr = program
        .signal_expr(id)
        .ok_or(RuntimeFault::BadSignalExprId(id))?
        .clone();
    let result = dispatch(program, cache, value_store, time, step, &expr)?;
    cache.signal_set(id, result);
    Ok(result)
}

fn dispatch(
    program: &CompiledProgram,
    cache: &mut FrameCache,
    value_store: &ValueStore,
    time: &TimeResolution,
    step: StepId,
    expr: &SignalExpr,
) -> Result<f64, RuntimeFault> {
    let mut rec = |id: SignalExprId| eval_signal(program, cache, value_store, time, step, id);
    Ok(match expr {
        SignalExpr::Const(const_id) => program
            .const_pool
            .resolve_f64(*const_id)
            .unwrap_or(0.0),
        SignalExpr::Time(src) => match src {
            TimeSource::TAbsMs => time.t_abs_ms,
            TimeSource::TModelMs => time.t_model_ms,
            TimeSource::Phase01 => time.phase01.unwrap_or(0.0),
            TimeSource::Progress01 => time.progress01.unwrap_or(0.0),
        },
        SignalExpr::SlotRead(slot) => value_store.read(step, *slot)?.as_f64().unwrap_or(0.0),
        SignalExpr::Arith(op, a, b) => {
            let a = rec(*a)?;
            let b = rec(*b)?;
            match op {
                ArithOp::Add => a + b,
                ArithOp::Sub => a - b,
                ArithOp::Mul => a * b,
                ArithOp::Div => a / b,
                ArithOp::Mod => a % b,
            }
        }
        SignalExpr::Unary(op, a) => {
            let a = rec(*a)?;
            match op {
                core_model::UnaryOp::Neg => -a,
                core_model::UnaryOp::Abs => a.abs(),
                core_model::UnaryOp::Sqrt => a.sqrt(),
                core_model::UnaryOp::Floor => a.floor(),
                core_model::UnaryOp::Ceil => a.ceil(),
                core_model::UnaryOp::Round => a.round(),
            }
        }
        SignalExpr::Compare(op, a, b) => {
            let a = rec(*a)?;
            let b = rec(*b)?;
            let result = match op {
                CompareOp::Lt => a < b,
                CompareOp::Le => a <= b,
                CompareOp::Gt => a > b,
                CompareOp::Ge => a >= b,
                CompareOp::Eq => a == b,
                CompareOp::Ne => a != b,
            };
            if result {
                1.0
            } else {
                0.0
            }
        }
        SignalExpr::Trig(op, a) => {
            let a = rec(*a)?;
            match op {
                TrigOp::Sin => a.sin(),
                TrigOp::Cos => a.cos(),
                TrigOp::Tan => a.tan(),
                TrigOp::Asin => a.asin(),
                TrigOp::Acos => a.acos(),
                TrigOp::Atan => a.atan(),
            }
        }
        SignalExpr::Clamp { x, min, max } => math::clamp(rec(*x)?, rec(*min)?, rec(*max)?),
        SignalExpr::Lerp { a, b, t } => math::lerp(rec(*a)?, rec(*b)?, rec(*t)?),
        SignalExpr::Smoothstep { edge0, edge1, x } => {
            math::smoothstep(rec(*edge0)?, rec(*edge1)?, rec(*x)?)
        }
        SignalExpr::Quantize { x, steps } => math::quantize(rec(*x)?, rec(*steps)?),
        SignalExpr::Easing { kind, t } => math::ease(*kind, rec(*t)?),
    })
}
