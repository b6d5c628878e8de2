//! `nodeEval` opcode dispatch (spec.md §4.10).
//!
//! Every opcode reads a fixed-arity slice of `inputSlots` and writes a
//! fixed-arity slice of `outputSlots`; arity mismatches are a compiled-program
//! bug and surface as [`RuntimeFault::MissingRequiredTable`]-shaped faults via
//! the slice length check below. `Integrate` and `Delay` are the only opcodes
//! that touch the [`StateBuffer`] — every other opcode is a pure function of
//! its inputs for the current frame.

use core_model::{OpCode, RuntimeFault, SlotId, StepId, Value};
use core_state::{StateBuffer, ValueStore};
use smallvec::SmallVec;

/// Opcodes never read more than 4 input slots (`Vec2Add` is the widest), so a
/// stack-allocated buffer avoids a heap allocation per `nodeEval` step.
type Operands = SmallVec<[f64; 4]>;

fn want(step: StepId, got: usize, want: usize, table: &'static str) -> Result<(), RuntimeFault> {
    if got != want {
        return Err(RuntimeFault::MissingRequiredTable {
            step,
            kind: "nodeEval",
            table,
        });
    }
    Ok(())
}

fn read_all(
    value_store: &ValueStore,
    step: StepId,
    slots: &[SlotId],
) -> Result<Operands, RuntimeFault> {
    slots
        .iter()
        .map(|s| Ok(value_store.read(step, *s)?.as_f64().unwrap_or(0.0)))
        .collect()
}

fn write_all(
    value_store: &mut ValueStore,
    step: StepId,
    slots: &[SlotId],
    values: &[f64],
) -> Result<(), RuntimeFault> {
    for (slot, v) in slots.iter().zip(values) {
        value_store.write(step, *slot, Value::F64(*v))?;
    }
    Ok(())
}

/// HSV -> RGB, `h/s/v` all in `[0,1]`.
fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    if s <= 0.0 {
        return (v, v, v);
    }
    let h6 = (h - h.floor()) * 6.0;
    let i = h6.floor() as i32;
    let f = h6 - h6.floor();
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match i.rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

fn rgb_to_hsv(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let v = max;
    let s = if max <= 0.0 { 0.0 } else { delta / max };
    if delta <= 0.0 {
        return (0.0, s, v);
    }
    let h = if max == r {
        ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    };
    ((h / 6.0).rem_euclid(1.0), s, v)
}

/// Evaluate one `nodeEval` step. `dt_ms` is the current frame's resolved time
/// delta, used by `Integrate` and `Delay`.
pub fn eval_node(
    value_store: &mut ValueStore,
    state: &mut StateBuffer,
    step: StepId,
    opcode: &OpCode,
    inputs: &[SlotId],
    outputs: &[SlotId],
    dt_ms: f64,
) -> Result<(), RuntimeFault> {
    match opcode {
        OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div => {
            want(step, inputs.len(), 2, "inputSlots")?;
            want(step, outputs.len(), 1, "outputSlots")?;
            let v = read_all(value_store, step, inputs)?;
            let r = match opcode {
                OpCode::Add => v[0] + v[1],
                OpCode::Sub => v[0] - v[1],
                OpCode::Mul => v[0] * v[1],
                OpCode::Div => v[0] / v[1],
                _ => unreachable!(),
            };
            write_all(value_store, step, outputs, &[r])
        }
        OpCode::Sin | OpCode::Cos => {
            want(step, inputs.len(), 1, "inputSlots")?;
            want(step, outputs.len(), 1, "outputSlots")?;
            let v = read_all(value_store, step, inputs)?;
            let r = match opcode {
                OpCode::Sin => v[0].sin(),
                OpCode::Cos => v[0].cos(),
                _ => unreachable!(),
            };
            write_all(value_store, step, outputs, &[r])
        }
        OpCode::Vec2Add => {
            want(step, inputs.len(), 4, "inputSlots")?;
            want(step, outputs.len(), 2, "outputSlots")?;
            let v = read_all(value_store, step, inputs)?;
            write_all(value_store, step, outputs, &[v[0] + v[2], v[1] + v[3]])
        }
        OpCode::Vec2Scale => {
            want(step, inputs.len(), 3, "inputSlots")?;
            want(step, outputs.len(), 2, "outputSlots")?;
            let v = read_all(value_store, step, inputs)?;
            write_all(value_store, step, outputs, &[v[0] * v[2], v[1] * v[2]])
        }
        OpCode::HsvToRgb => {
            want(step, inputs.len(), 3, "inputSlots")?;
            want(step, outputs.len(), 3, "outputSlots")?;
            let v = read_all(value_store, step, inputs)?;
            let (r, g, b) = hsv_to_rgb(v[0], v[1], v[2]);
            write_all(value_store, step, outputs, &[r, g, b])
        }
        OpCode::RgbToHsv => {
            want(step, inputs.len(), 3, "inputSlots")?;
            want(step, outputs.len(), 3, "outputSlots")?;
            let v = read_all(value_store, step, inputs)?;
            let (h, s, val) = rgb_to_hsv(v[0], v[1], v[2]);
            write_all(value_store, step, outputs, &[h, s, val])
        }
        OpCode::Integrate { state_key } => {
            want(step, inputs.len(), 1, "inputSlots")?;
            want(step, outputs.len(), 1, "outputSlots")?;
            let input = read_all(value_store, step, inputs)?[0];
            let cell = state
                .find(state_key)
                .cloned()
                .ok_or_else(|| RuntimeFault::HotSwapConstructionFailed {
                    reason: format!("no state cell for integrator {state_key:?}"),
                })?;
            let acc = {
                let slice = state.f64_slice_mut(&cell);
                slice[0] += input * dt_ms;
                slice[0]
            };
            write_all(value_store, step, outputs, &[acc])
        }
        OpCode::Delay {
            state_key,
            delay_ms,
        } => {
            want(step, inputs.len(), 1, "inputSlots")?;
            want(step, outputs.len(), 1, "outputSlots")?;
            let input = read_all(value_store, step, inputs)?[0];
            let cell = state
                .find(state_key)
                .cloned()
                .ok_or_else(|| RuntimeFault::HotSwapConstructionFailed {
                    reason: format!("no state cell for delay {state_key:?}"),
                })?;
            // Cell layout: slot 0 is the write cursor, slots 1.. are the ring
            // history. `delay_ms` is converted to a frame offset using the
            // current frame's delta so the buffer doesn't need its own clock.
            let ring_len = (cell.size as usize).saturating_sub(1).max(1);
            let frames_back = if dt_ms > 0.0 {
                ((delay_ms / dt_ms).round() as i64).clamp(1, ring_len as i64) as usize
            } else {
                1
            };
            let out = {
                let slice = state.f64_slice_mut(&cell);
                let cursor = slice[0] as usize % ring_len;
                let read_idx = (cursor + ring_len - frames_back) % ring_len;
                let delayed = slice[1 + read_idx];
                slice[1 + cursor] = input;
                slice[0] = ((cursor + 1) % ring_len) as f64;
                delayed
            };
            write_all(value_store, step, outputs, &[out])
        }
    }
}
