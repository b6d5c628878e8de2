//! Project3DTo2D (spec.md §4.9): projects a domain of 3D points through a
//! camera's view-projection matrix into a 2D instance batch.
//!
//! All arithmetic here is `f32` (single precision), matching spec.md's
//! determinism requirement: "All arithmetic is 32-bit float... so repeated
//! compilations are deterministic." Widening to `f64` anywhere in this path
//! would make results depend on whether the host happens to run with
//! extended precision.

use core_cache::FrameCache;
use core_model::{
    Camera, ClipMode, CullMode, InstanceBatch2D, ProjectConfig, ProjectCounters, RuntimeFault,
    StepId,
};
use core_state::{StateBuffer, ValueStore};

use crate::field::{materialize_field, FieldContext};

fn read_camera(value_store: &ValueStore, step: StepId, slot: core_model::SlotId) -> Result<Camera, RuntimeFault> {
    let v = value_store.read(step, slot)?;
    v.as_object()
        .and_then(|a| a.downcast_ref::<Camera>())
        .copied()
        .ok_or(RuntimeFault::MissingSlotMeta { step, slot })
}

pub fn project_3d_to_2d(
    ctx: &FieldContext,
    cache: &mut FrameCache,
    state: &mut StateBuffer,
    dt_ms: f64,
    step: StepId,
    cfg: &ProjectConfig,
) -> Result<(InstanceBatch2D, ProjectCounters), RuntimeFault> {
    let camera = read_camera(ctx.value_store, step, cfg.camera_slot)?;
    let xs = materialize_field(ctx, cache, state, dt_ms, cfg.domain_slot, cfg.pos_x)?;
    let ys = materialize_field(ctx, cache, state, dt_ms, cfg.domain_slot, cfg.pos_y)?;
    let zs = materialize_field(ctx, cache, state, dt_ms, cfg.domain_slot, cfg.pos_z)?;

    let mut counters = ProjectCounters::default();
    let mut projected: Vec<(f32, f32, f32, usize)> = Vec::with_capacity(xs.len());

    for (i, ((x, y), z)) in xs.iter().zip(ys.iter()).zip(zs.iter()).enumerate() {
        let (x, y, z) = (*x as f32, *y as f32, *z as f32);
        if !x.is_finite() || !y.is_finite() || !z.is_finite() {
            counters.non_finite += 1;
            continue;
        }
        let clip = camera.view_projection.mul_point(x, y, z);
        let w = clip[3];
        if w.abs() <= f32::EPSILON {
            counters.culled += 1;
            continue;
        }
        let ndc = [clip[0] / w, clip[1] / w, clip[2] / w];
        if matches!(cfg.cull, CullMode::Frustum)
            && (ndc[0] < -1.0 || ndc[0] > 1.0 || ndc[1] < -1.0 || ndc[1] > 1.0 || ndc[2] < -1.0 || ndc[2] > 1.0)
        {
            counters.culled += 1;
            continue;
        }
        let (ndc_x, ndc_y) = match cfg.clip {
            ClipMode::Discard => (ndc[0], ndc[1]),
            ClipMode::Clamp => (ndc[0].clamp(-1.0, 1.0), ndc[1].clamp(-1.0, 1.0)),
        };
        let screen_x = ndc_x * (cfg.viewport_w * 0.5);
        let screen_y = -ndc_y * (cfg.viewport_h * 0.5);
        projected.push((screen_x, screen_y, ndc[2], i));
    }

    if cfg.sort_by_depth {
        projected.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal).then(a.3.cmp(&b.3)));
    }

    let mut batch = InstanceBatch2D::default();
    batch.size = vec![1.0; projected.len()];
    batch.r = vec![255; projected.len()];
    batch.g = vec![255; projected.len()];
    batch.b = vec![255; projected.len()];
    batch.a = vec![255; projected.len()];
    for (x, y, _, _) in &projected {
        batch.x.push(*x);
        batch.y.push(*y);
    }

    Ok((batch, counters))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_model::{
        CompiledProgram, ConstPool, Domain, FieldExpr, FieldExprId, FieldRecipe, Mat4, SlotId,
        SlotMeta, StorageClass, TimeResolution, Value, World,
    };
    use std::collections::HashMap;
    use std::sync::Arc;

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

    fn program_with_position(pool: ConstPool, x: f64, y: f64, z: f64) -> CompiledProgram {
        let mut pool = pool;
        let cx = pool.push_f64(x);
        let cy = pool.push_f64(y);
        let cz = pool.push_f64(z);
        let fields = vec![
            FieldExpr { id: FieldExprId(0), domain_slot: SlotId(0), recipe: FieldRecipe::Const(cx), lenses: vec![] },
            FieldExpr { id: FieldExprId(1), domain_slot: SlotId(0), recipe: FieldRecipe::Const(cy), lenses: vec![] },
            FieldExpr { id: FieldExprId(2), domain_slot: SlotId(0), recipe: FieldRecipe::Const(cz), lenses: vec![] },
        ];
        CompiledProgram {
            time_model: core_model::TimeModel::Infinite,
            slots: vec![
                SlotMeta::new(SlotId(0), StorageClass::I32, 0, World::Scalar, Domain::Int),
                SlotMeta::new(SlotId(1), StorageClass::Object, 0, World::Special, Domain::Other),
            ],
            state_layout: Default::default(),
            const_pool: pool,
            signal_table: vec![],
            field_table: fields,
            event_table: vec![],
            schedule: core_model::Schedule::default(),
            initial_slot_values: HashMap::new(),
            output: core_model::OutputSpec { primary_output_slot: SlotId(0) },
            debug: core_model::DebugMetadata::default(),
            t_abs_slot: SlotId(0),
            t_model_slot: SlotId(0),
            phase_slot: None,
            progress_slot: None,
            wrap_event_slot: None,
        }
    }

    #[test]
    fn identity_camera_maps_origin_to_screen_center() {
        let program = program_with_position(ConstPool::new(), 0.0, 0.0, 0.0);
        let mut vs = core_state::ValueStore::new(&program.slots);
        vs.load_initial(SlotId(0), Value::I32(1)).unwrap();
        vs.load_initial(SlotId(1), Value::Object(Arc::new(Camera { view_projection: Mat4::IDENTITY }))).unwrap();
        let mut cache = FrameCache::new(0, 3);
        let mut state = StateBuffer::default();
        let time = no_time();
        let attrs = HashMap::new();
        let ctx = FieldContext { program: &program, value_store: &vs, time: &time, attributes: &attrs, step: StepId(0) };
        let cfg = ProjectConfig {
            domain_slot: SlotId(0),
            camera_slot: SlotId(1),
            pos_x: FieldExprId(0),
            pos_y: FieldExprId(1),
            pos_z: FieldExprId(2),
            cull: CullMode::None,
            clip: ClipMode::Discard,
            sort_by_depth: false,
            viewport_w: 800.0,
            viewport_h: 600.0,
            out_slot: SlotId(2),
        };
        let (batch, counters) = project_3d_to_2d(&ctx, &mut cache, &mut state, 16.0, StepId(0), &cfg).unwrap();
        assert_eq!(counters.non_finite, 0);
        assert_eq!(counters.culled, 0);
        assert_eq!(batch.x, vec![0.0]);
        assert_eq!(batch.y, vec![0.0]);
    }

    #[test]
    fn non_finite_position_is_counted_and_culled() {
        let mut pool = ConstPool::new();
        let nan_const = pool.push_f64(f64::NAN);
        let zero = pool.push_f64(0.0);
        let fields = vec![
            FieldExpr { id: FieldExprId(0), domain_slot: SlotId(0), recipe: FieldRecipe::Const(nan_const), lenses: vec![] },
            FieldExpr { id: FieldExprId(1), domain_slot: SlotId(0), recipe: FieldRecipe::Const(zero), lenses: vec![] },
            FieldExpr { id: FieldExprId(2), domain_slot: SlotId(0), recipe: FieldRecipe::Const(zero), lenses: vec![] },
        ];
        let mut program = program_with_position(ConstPool::new(), 0.0, 0.0, 0.0);
        program.const_pool = pool;
        program.field_table = fields;
        let mut vs = core_state::ValueStore::new(&program.slots);
        vs.load_initial(SlotId(0), Value::I32(1)).unwrap();
        vs.load_initial(SlotId(1), Value::Object(Arc::new(Camera { view_projection: Mat4::IDENTITY }))).unwrap();
        let mut cache = FrameCache::new(0, 3);
        let mut state = StateBuffer::default();
        let time = no_time();
        let attrs = HashMap::new();
        let ctx = FieldContext { program: &program, value_store: &vs, time: &time, attributes: &attrs, step: StepId(0) };
        let cfg = ProjectConfig {
            domain_slot: SlotId(0),
            camera_slot: SlotId(1),
            pos_x: FieldExprId(0),
            pos_y: FieldExprId(1),
            pos_z: FieldExprId(2),
            cull: CullMode::None,
            clip: ClipMode::Discard,
            sort_by_depth: false,
            viewport_w: 800.0,
            viewport_h: 600.0,
            out_slot: SlotId(2),
        };
        let (batch, counters) = project_3d_to_2d(&ctx, &mut cache, &mut state, 16.0, StepId(0), &cfg).unwrap();
        assert_eq!(counters.non_finite, 1);
        assert!(batch.x.is_empty());
    }
}
