//! Field Materializer (spec.md §4.7): turns a lazily-described per-element
//! function into an explicit `N`-element buffer, consulting the Frame
//! Cache's field-handle table (spec.md §4.4) before recomputing.
//!
//! The buffer produced here is always a full-precision `Vec<f64>`; it's
//! cached under `fieldExprId` alone since recipe and lens evaluation don't
//! depend on the format a caller eventually narrows to. Narrowing to
//! `u8`/`f32` happens once, downstream in `core_field::instances`, which
//! caches *that* result in the buffer map keyed by `(fieldExprId,
//! domainSlot, format)` so two channels sharing a field never duplicate the
//! narrowing work either.

use std::collections::HashMap;
use std::sync::Arc;

use core_cache::FrameCache;
use core_model::{
    CompiledProgram, FieldExpr, FieldExprId, FieldRecipe, FieldTransformOp, Lens, RuntimeFault,
    SlotId, StateCellMeta, StepId, TimeResolution, Value,
};
use core_eval::math;
use core_state::{StateBuffer, ValueStore};

/// Named per-element attribute streams a compiled program may attach to a
/// domain (e.g. imported mesh vertex attributes). `SourceTag` recipes read
/// from here; a tag with no matching entry is a fatal program error rather
/// than a silent zero-fill, since it means the compiler emitted a reference
/// the host never populated.
pub type AttributeStreams = HashMap<String, Vec<f64>>;

pub struct FieldContext<'a> {
    pub program: &'a CompiledProgram,
    pub value_store: &'a ValueStore,
    pub time: &'a TimeResolution,
    pub attributes: &'a AttributeStreams,
    pub step: StepId,
}

fn domain_len(ctx: &FieldContext, domain_slot: SlotId) -> Result<usize, RuntimeFault> {
    let v = ctx.value_store.read(ctx.step, domain_slot)?;
    Ok(v.as_f64().unwrap_or(0.0).max(0.0).round() as usize)
}

/// SplitMix64, used only to turn `(seed, elementIndex)` into a deterministic
/// pseudo-random value in `[0, 1)` for `FieldRecipe::RandomSeeded`. Hand
/// rolled rather than pulled from a `rand` crate so the sequence is stable
/// across Rust/toolchain versions, which matters for a program that is
/// expected to replay identically every time it's loaded.
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

fn random_seeded(seed: u64, n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let bits = splitmix64(seed.wrapping_add(i as u64));
            (bits >> 11) as f64 / (1u64 << 53) as f64
        })
        .collect()
}

/// Materialize a field's raw per-element `f64` values, consulting the Frame
/// Cache's field-handle table first (spec.md §4.4 "field handle/stamp
/// arrays"). This tier is keyed by `fieldExprId` alone — recipe and lens
/// evaluation don't depend on which typed output format a caller eventually
/// narrows the result to, so the same computation serves every consumer of
/// a given field within the frame. Narrowing to a specific buffer format
/// happens downstream (`core_field::instances`), which caches *that* result
/// in the buffer map keyed by `(fieldExprId, domainSlot, format)` per
/// spec.md §4.4.
pub fn materialize_field(
    ctx: &FieldContext,
    cache: &mut FrameCache,
    state: &mut StateBuffer,
    dt_ms: f64,
    domain_slot: SlotId,
    field_id: FieldExprId,
) -> Result<Arc<Vec<f64>>, RuntimeFault> {
    if let Some(hit) = cache.field_get(field_id) {
        if let Some(buf) = hit.as_object().and_then(|a| a.clone().downcast::<Vec<f64>>().ok()) {
            return Ok(buf);
        }
    }

    let expr = ctx
        .program
        .field_expr(field_id)
        .ok_or(RuntimeFault::BadFieldExprId(field_id))?
        .clone();
    let n = domain_len(ctx, domain_slot)?;
    let mut values = eval_recipe(ctx, cache, state, dt_ms, domain_slot, &expr, n)?;
    for lens in &expr.lenses {
        apply_lens(ctx, cache, state, dt_ms, &expr, lens, &mut values)?;
    }
    let buf = Arc::new(values);
    cache.field_set(field_id, Value::Object(buf.clone()));
    Ok(buf)
}

fn eval_recipe(
    ctx: &FieldContext,
    cache: &mut FrameCache,
    state: &mut StateBuffer,
    dt_ms: f64,
    domain_slot: SlotId,
    expr: &FieldExpr,
    n: usize,
) -> Result<Vec<f64>, RuntimeFault> {
    Ok(match &expr.recipe {
        FieldRecipe::Const(const_id) => {
            let v = ctx.program.const_pool.resolve_f64(*const_id).unwrap_or(0.0);
            vec![v; n]
        }
        FieldRecipe::BroadcastSignal(sig_id) => {
            let v = core_eval::eval_signal(ctx.program, cache, ctx.value_store, ctx.time, ctx.step, *sig_id)?;
            vec![v; n]
        }
        FieldRecipe::RandomSeeded { seed } => random_seeded(*seed, n),
        FieldRecipe::Transform { base, op } => {
            let base_buf = materialize_field(ctx, cache, state, dt_ms, domain_slot, *base)?;
            base_buf
                .iter()
                .map(|x| match op {
                    FieldTransformOp::Negate => -x,
                    FieldTransformOp::Invert => 1.0 / x,
                })
                .collect()
        }
        FieldRecipe::SourceTag(tag) => ctx
            .attributes
            .get(tag)
            .cloned()
            .ok_or_else(|| RuntimeFault::MissingRequiredTable {
                step: ctx.step,
                kind: "fieldRecipe.sourceTag",
                table: "attributeStreams",
            })?,
    })
}

fn eval_scalar(
    ctx: &FieldContext,
    cache: &mut FrameCache,
    sig_id: core_model::SignalExprId,
) -> Result<f64, RuntimeFault> {
    core_eval::eval_signal(ctx.program, cache, ctx.value_store, ctx.time, ctx.step, sig_id)
}

fn slew_cell(state: &StateBuffer, key: &core_model::StableKey) -> Option<StateCellMeta> {
    state.find(key).cloned()
}

fn apply_lens(
    ctx: &FieldContext,
    cache: &mut FrameCache,
    state: &mut StateBuffer,
    dt_ms: f64,
    expr: &FieldExpr,
    lens: &Lens,
    values: &mut [f64],
) -> Result<(), RuntimeFault> {
    match lens {
        Lens::Ease(kind) => {
            for v in values.iter_mut() {
                *v = math::ease(*kind, *v);
            }
        }
        Lens::Slew { rate, state_key } => {
            let rate_val = eval_scalar(ctx, cache, *rate)?;
            let cell = slew_cell(state, state_key).ok_or_else(|| RuntimeFault::MissingRequiredTable {
                step: ctx.step,
                kind: "lens.slew",
                table: "stateLayout.cells",
            })?;
            let n = values.len().min(cell.size as usize / 2);
            let slice = state.f64_slice_mut(&cell);
            let reset = ctx.time.is_scrub;
            for i in 0..n {
                let prev_value = slice[2 * i];
                let prev_time = slice[2 * i + 1];
                let target = values[i];
                let dt = if reset { 0.0 } else { ctx.time.t_abs_ms - prev_time };
                let next = if reset {
                    target
                } else {
                    let alpha = 1.0 - (-rate_val * dt.max(0.0)).exp();
                    math::lerp(prev_value, target, alpha.clamp(0.0, 1.0))
                };
                slice[2 * i] = next;
                slice[2 * i + 1] = ctx.time.t_abs_ms;
                values[i] = next;
            }
        }
        Lens::Quantize { steps } => {
            let steps_val = eval_scalar(ctx, cache, *steps)?;
            for v in values.iter_mut() {
                *v = math::quantize(*v, steps_val);
            }
        }
        Lens::Scale { factor } => {
            let f = eval_scalar(ctx, cache, *factor)?;
            for v in values.iter_mut() {
                *v *= f;
            }
        }
        Lens::Warp { amount } => {
            let a = eval_scalar(ctx, cache, *amount)?;
            for v in values.iter_mut() {
                *v += (*v * std::f64::consts::TAU).sin() * a;
            }
        }
        Lens::Clamp { min, max } => {
            let lo = eval_scalar(ctx, cache, *min)?;
            let hi = eval_scalar(ctx, cache, *max)?;
            for v in values.iter_mut() {
                *v = math::clamp(*v, lo, hi);
            }
        }
        Lens::Deadzone { threshold } => {
            let t = eval_scalar(ctx, cache, *threshold)?;
            for v in values.iter_mut() {
                if v.abs() < t {
                    *v = 0.0;
                }
            }
        }
        Lens::MapRange {
            in_min,
            in_max,
            out_min,
            out_max,
        } => {
            let in_min = eval_scalar(ctx, cache, *in_min)?;
            let in_max = eval_scalar(ctx, cache, *in_max)?;
            let out_min = eval_scalar(ctx, cache, *out_min)?;
            let out_max = eval_scalar(ctx, cache, *out_max)?;
            let span = in_max - in_min;
            for v in values.iter_mut() {
                let t = if span == 0.0 { 0.0 } else { (*v - in_min) / span };
                *v = math::lerp(out_min, out_max, t);
            }
        }
        Lens::Polarity => {
            for v in values.iter_mut() {
                *v = *v * 2.0 - 1.0;
            }
        }
        Lens::Broadcast => {
            if let Some(first) = values.first().copied() {
                values.iter_mut().for_each(|v| *v = first);
            }
        }
        Lens::PerElementOffset { offset } => {
            let o = eval_scalar(ctx, cache, *offset)?;
            for (i, v) in values.iter_mut().enumerate() {
                *v += o * i as f64;
            }
        }
    }
    let _ = expr;
    Ok(())
}
