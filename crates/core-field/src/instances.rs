//! MaterializeInstances / MaterializeColor / MaterializePath (spec.md §4.9).
//!
//! Each of these reads one or more field buffers (full `f64` precision, via
//! [`crate::field::materialize_field`]) and narrows them into the typed
//! arrays a [`InstanceBatch2D`] or [`PathBatch2D`] actually carries.

use std::sync::Arc;

use core_cache::FrameCache;
use core_model::{
    BufferFormat, BufferKey, ElementType, FieldExprId, InstanceBatch2D, MaterializeColorSpec,
    MaterializeInstancesSpec, MaterializePathSpec, PathBatch2D, PathCommand, RuntimeFault, SlotId,
    StepId, Value,
};
use core_state::StateBuffer;

use crate::field::{materialize_field, FieldContext};

fn to_u8_channel(values: &[f64]) -> Vec<u8> {
    values
        .iter()
        .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect()
}

fn to_f32_channel(values: &[f64]) -> Vec<f32> {
    values.iter().map(|v| *v as f32).collect()
}

/// Materialize a field and narrow it to `f32`, caching the narrowed result
/// in the buffer map keyed by `(fieldExprId, domainSlot, format)` (spec.md
/// §4.4) so repeated narrowing of the same field within a frame (e.g. one
/// position field feeding both `MaterializeInstances` and a debug probe)
/// doesn't redo the conversion.
fn cached_f32_channel(
    ctx: &FieldContext,
    cache: &mut FrameCache,
    state: &mut StateBuffer,
    dt_ms: f64,
    domain_slot: SlotId,
    field_id: FieldExprId,
) -> Result<Arc<Vec<f32>>, RuntimeFault> {
    let key = BufferKey {
        field_expr: field_id,
        domain_slot,
        format: BufferFormat::new(1, ElementType::F32),
    };
    if let Some(hit) = cache.buffer_get(&key) {
        if let Some(buf) = hit.as_object().and_then(|a| a.clone().downcast::<Vec<f32>>().ok()) {
            return Ok(buf);
        }
    }
    let raw = materialize_field(ctx, cache, state, dt_ms, domain_slot, field_id)?;
    let narrowed = Arc::new(to_f32_channel(&raw));
    cache.buffer_set(key, Value::Object(narrowed.clone()));
    Ok(narrowed)
}

/// As [`cached_f32_channel`], narrowing to `u8` (color channels, `alive`
/// flags) instead.
fn cached_u8_channel(
    ctx: &FieldContext,
    cache: &mut FrameCache,
    state: &mut StateBuffer,
    dt_ms: f64,
    domain_slot: SlotId,
    field_id: FieldExprId,
) -> Result<Arc<Vec<u8>>, RuntimeFault> {
    let key = BufferKey {
        field_expr: field_id,
        domain_slot,
        format: BufferFormat::new(1, ElementType::U8),
    };
    if let Some(hit) = cache.buffer_get(&key) {
        if let Some(buf) = hit.as_object().and_then(|a| a.clone().downcast::<Vec<u8>>().ok()) {
            return Ok(buf);
        }
    }
    let raw = materialize_field(ctx, cache, state, dt_ms, domain_slot, field_id)?;
    let narrowed = Arc::new(to_u8_channel(&raw));
    cache.buffer_set(key, Value::Object(narrowed.clone()));
    Ok(narrowed)
}

pub fn materialize_instances(
    ctx: &FieldContext,
    cache: &mut FrameCache,
    state: &mut StateBuffer,
    dt_ms: f64,
    spec: &MaterializeInstancesSpec,
) -> Result<InstanceBatch2D, RuntimeFault> {
    let x = cached_f32_channel(ctx, cache, state, dt_ms, spec.domain_slot, spec.x)?;
    let y = cached_f32_channel(ctx, cache, state, dt_ms, spec.domain_slot, spec.y)?;
    let r = cached_u8_channel(ctx, cache, state, dt_ms, spec.domain_slot, spec.r)?;
    let g = cached_u8_channel(ctx, cache, state, dt_ms, spec.domain_slot, spec.g)?;
    let b = cached_u8_channel(ctx, cache, state, dt_ms, spec.domain_slot, spec.b)?;
    let a = cached_u8_channel(ctx, cache, state, dt_ms, spec.domain_slot, spec.a)?;
    let size = cached_f32_channel(ctx, cache, state, dt_ms, spec.domain_slot, spec.size)?;
    let z = spec
        .z
        .map(|field| cached_f32_channel(ctx, cache, state, dt_ms, spec.domain_slot, field))
        .transpose()?
        .map(|v| (*v).clone());
    let alive = spec
        .alive
        .map(|field| cached_u8_channel(ctx, cache, state, dt_ms, spec.domain_slot, field))
        .transpose()?
        .map(|v| (*v).clone());

    Ok(InstanceBatch2D {
        x: (*x).clone(),
        y: (*y).clone(),
        r: (*r).clone(),
        g: (*g).clone(),
        b: (*b).clone(),
        a: (*a).clone(),
        size: (*size).clone(),
        z,
        alive,
    })
}

/// Packed `u8x4` color buffer (`rgba`), used by [`MaterializeColorSpec`] when
/// `packed` is set; otherwise callers read the four channel arrays out of a
/// [`crate::instances::ColorChannels`] directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorChannels {
    pub r: Vec<u8>,
    pub g: Vec<u8>,
    pub b: Vec<u8>,
    pub a: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MaterializedColor {
    Channels(ColorChannels),
    Packed(Vec<u32>),
}

/// Unpack one element's color value: the low 32 bits hold `0xRRGGBBAA`, the
/// convention the compiler uses to let a single scalar field expression
/// produce a whole color (the field/lens vocabulary is scalar-only, so a
/// 4-channel color has to be carried as one packed number instead of a
/// genuine vector field).
fn unpack_rgba(v: f64) -> (u8, u8, u8, u8) {
    let bits = v.round() as i64 as u32;
    (
        (bits >> 24) as u8,
        (bits >> 16) as u8,
        (bits >> 8) as u8,
        bits as u8,
    )
}

pub fn materialize_color(
    ctx: &FieldContext,
    cache: &mut FrameCache,
    state: &mut StateBuffer,
    dt_ms: f64,
    spec: &MaterializeColorSpec,
) -> Result<MaterializedColor, RuntimeFault> {
    let color = materialize_field(ctx, cache, state, dt_ms, spec.domain_slot, spec.color)?;
    if spec.packed {
        Ok(MaterializedColor::Packed(
            color.iter().map(|v| v.round() as i64 as u32).collect(),
        ))
    } else {
        let mut channels = ColorChannels {
            r: Vec::with_capacity(color.len()),
            g: Vec::with_capacity(color.len()),
            b: Vec::with_capacity(color.len()),
            a: Vec::with_capacity(color.len()),
        };
        for v in color.iter() {
            let (r, g, b, a) = unpack_rgba(*v);
            channels.r.push(r);
            channels.g.push(g);
            channels.b.push(b);
            channels.a.push(a);
        }
        Ok(MaterializedColor::Channels(channels))
    }
}

pub fn materialize_path(
    ctx: &FieldContext,
    cache: &mut FrameCache,
    state: &mut StateBuffer,
    dt_ms: f64,
    step: StepId,
    spec: &MaterializePathSpec,
) -> Result<PathBatch2D, RuntimeFault> {
    let cmd_buf = materialize_field(ctx, cache, state, dt_ms, spec.domain_slot, spec.cmd_field)?;
    let point_buf = materialize_field(ctx, cache, state, dt_ms, spec.domain_slot, spec.point_field)?;

    let mut batch = PathBatch2D::default();
    let mut point_cursor = 0usize;
    let mut cmd_start = 0u32;
    let mut point_start = 0u32;
    let mut cur_cmd_len = 0u32;
    let mut cur_point_len = 0u32;

    for raw in cmd_buf.iter() {
        let opcode = PathCommand::from_u16(raw.round() as u16).ok_or(
            RuntimeFault::MissingRequiredTable {
                step,
                kind: "materializePath",
                table: "pathCommandOpcode",
            },
        )?;
        batch.cmds.push(opcode as u16);
        cur_cmd_len += 1;
        let n = opcode.param_count();
        for _ in 0..n {
            let v = point_buf.get(point_cursor).copied().unwrap_or(0.0);
            batch.params.push(v as f32);
            point_cursor += 1;
        }
        cur_point_len += n as u32;
        if matches!(opcode, PathCommand::Close) {
            batch.cmd_start.push(cmd_start);
            batch.cmd_len.push(cur_cmd_len);
            batch.point_start.push(point_start);
            batch.point_len.push(cur_point_len);
            cmd_start += cur_cmd_len;
            point_start += cur_point_len;
            cur_cmd_len = 0;
            cur_point_len = 0;
        }
    }
    if cur_cmd_len > 0 {
        batch.cmd_start.push(cmd_start);
        batch.cmd_len.push(cur_cmd_len);
        batch.point_start.push(point_start);
        batch.point_len.push(cur_point_len);
    }

    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_model::{CompiledProgram, ConstPool, Domain, FieldExpr, FieldExprId, FieldRecipe, SlotId, SlotMeta, StorageClass, TimeResolution, World, Value};
    use core_state::ValueStore;
    use std::collections::HashMap;

    fn base_program(field_table: Vec<FieldExpr>, const_pool: ConstPool) -> CompiledProgram {
        CompiledProgram {
            time_model: core_model::TimeModel::Infinite,
            slots: vec![SlotMeta::new(SlotId(0), StorageClass::I32, 0, World::Scalar, Domain::Int)],
            state_layout: Default::default(),
            const_pool,
            signal_table: vec![],
            field_table,
            event_table: vec![],
            schedule: core_model::Schedule::default(),
            initial_slot_values: HashMap::new(),
            output: core_model::OutputSpec {
                primary_output_slot: SlotId(0),
            },
            debug: core_model::DebugMetadata::default(),
            t_abs_slot: SlotId(0),
            t_model_slot: SlotId(0),
            phase_slot: None,
            progress_slot: None,
            wrap_event_slot: None,
        }
    }

    fn no_time() -> TimeResolution {
        TimeResolution {
            t_abs_ms: 0.0,
            t_model_ms: 0.0,
            phase01: None,
            progress01: None,
            wrap: None,
            is_scrub: false,
        }
    }

    #[test]
    fn instances_narrows_colors_to_u8_and_positions_to_f32() {
        let mut pool = ConstPool::new();
        let half = pool.push_f64(0.5);
        let one = pool.push_f64(1.0);
        let fields: Vec<FieldExpr> = (0..7)
            .map(|i| FieldExpr {
                id: FieldExprId(i),
                domain_slot: SlotId(0),
                recipe: FieldRecipe::Const(if i % 2 == 0 { half } else { one }),
                lenses: vec![],
            })
            .collect();
        let program = base_program(fields, pool);
        let mut vs = ValueStore::new(&program.slots);
        vs.load_initial(SlotId(0), Value::I32(2)).unwrap();
        let mut cache = FrameCache::new(0, 7);
        let mut state = StateBuffer::default();
        let time = no_time();
        let attrs = HashMap::new();
        let ctx = FieldContext {
            program: &program,
            value_store: &vs,
            time: &time,
            attributes: &attrs,
            step: StepId(0),
        };
        let spec = MaterializeInstancesSpec {
            domain_slot: SlotId(0),
            x: FieldExprId(0),
            y: FieldExprId(1),
            z: None,
            r: FieldExprId(2),
            g: FieldExprId(3),
            b: FieldExprId(4),
            a: FieldExprId(5),
            size: FieldExprId(6),
            alive: None,
            out_slot: SlotId(1),
        };
        let batch = materialize_instances(&ctx, &mut cache, &mut state, 16.0, &spec).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.r, vec![128, 128]);
        assert_eq!(batch.g, vec![255, 255]);
        assert_eq!(batch.x, vec![0.5, 0.5]);
    }

    #[test]
    fn narrowed_channel_is_cached_in_the_buffer_map() {
        let mut pool = ConstPool::new();
        let c = pool.push_f64(0.5);
        let field = FieldExpr {
            id: FieldExprId(0),
            domain_slot: SlotId(0),
            recipe: FieldRecipe::Const(c),
            lenses: vec![],
        };
        let program = base_program(vec![field], pool);
        let mut vs = ValueStore::new(&program.slots);
        vs.load_initial(SlotId(0), Value::I32(3)).unwrap();
        let mut cache = FrameCache::new(0, 1);
        let mut state = StateBuffer::default();
        let time = no_time();
        let attrs = HashMap::new();
        let ctx = FieldContext {
            program: &program,
            value_store: &vs,
            time: &time,
            attributes: &attrs,
            step: StepId(0),
        };
        let a = cached_f32_channel(&ctx, &mut cache, &mut state, 16.0, SlotId(0), FieldExprId(0)).unwrap();
        let b = cached_f32_channel(&ctx, &mut cache, &mut state, 16.0, SlotId(0), FieldExprId(0)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn path_groups_commands_up_to_close() {
        // Per-element commands/points come from named attribute streams
        // rather than a uniform recipe, since a real path's command list
        // varies element to element.
        let fields = vec![
            FieldExpr {
                id: FieldExprId(0),
                domain_slot: SlotId(0),
                recipe: FieldRecipe::SourceTag("cmds".into()),
                lenses: vec![],
            },
            FieldExpr {
                id: FieldExprId(1),
                domain_slot: SlotId(0),
                recipe: FieldRecipe::SourceTag("points".into()),
                lenses: vec![],
            },
        ];
        let program = base_program(fields, ConstPool::new());
        let mut vs = ValueStore::new(&program.slots);
        vs.load_initial(SlotId(0), Value::I32(3)).unwrap();
        let mut cache = FrameCache::new(0, 2);
        let mut state = StateBuffer::default();
        let time = no_time();
        let mut attrs = HashMap::new();
        attrs.insert(
            "cmds".to_string(),
            vec![
                PathCommand::MoveTo as u16 as f64,
                PathCommand::LineTo as u16 as f64,
                PathCommand::Close as u16 as f64,
            ],
        );
        attrs.insert("points".to_string(), vec![0.0, 0.0, 1.0, 1.0]);
        let ctx = FieldContext {
            program: &program,
            value_store: &vs,
            time: &time,
            attributes: &attrs,
            step: StepId(0),
        };
        let spec = MaterializePathSpec {
            domain_slot: SlotId(0),
            cmd_field: FieldExprId(0),
            point_field: FieldExprId(1),
            out_slot: SlotId(1),
        };
        let batch = materialize_path(&ctx, &mut cache, &mut state, 16.0, StepId(0), &spec).unwrap();
        assert_eq!(batch.cmds, vec![0, 1, 4]);
        assert_eq!(batch.cmd_start, vec![0]);
        assert_eq!(batch.cmd_len, vec![3]);
        assert_eq!(batch.point_start, vec![0]);
        assert_eq!(batch.point_len, vec![4]);
    }
}
