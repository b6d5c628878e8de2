//! Schedule Executor (spec.md §4.10): the seven-step `execute_frame` loop
//! that advances one frame, dispatching every compiled step in order.

use std::sync::Arc;

use core_eval::{combine_event_bus, combine_signal_bus, eval_node, eval_signal};
use core_field::{
    assemble_render_frame, materialize_color, materialize_instances, materialize_path,
    project_3d_to_2d, AttributeStreams, FieldContext,
};
use core_hotswap::RuntimeState;
use core_model::{
    Camera, Mat4, Pass, PlaybackMode, ProbeTarget, RenderFrame, RuntimeFault, SlotId, StepId,
    StepKind, Value,
};

use crate::debug_probe::ProbeStore;
use crate::time_resolver;

/// Reserved step id used when writing the outputs of time resolution, which
/// is not itself a scheduled step with a compiler-assigned id.
const TIME_STEP: StepId = StepId(u32::MAX - 1);

fn write_f64(
    runtime: &mut RuntimeState,
    step: StepId,
    slot: SlotId,
    v: f64,
) -> Result<(), RuntimeFault> {
    runtime.value_store.write(step, slot, Value::F64(v))
}

/// Advance the runtime by one frame and produce the frame's `RenderFrame`
/// (spec.md §4.10). `attributes` carries any named per-element source
/// streams a `FieldRecipe::SourceTag` may reference; `probes` accumulates
/// this frame's debug-probe readings and is never part of hot-swap's
/// preserved state.
pub fn execute_frame(
    program: &core_model::CompiledProgram,
    runtime: &mut RuntimeState,
    probes: &mut ProbeStore,
    attributes: &AttributeStreams,
    t_abs_ms: f64,
    mode: PlaybackMode,
) -> Result<RenderFrame, RuntimeFault> {
    // Step 1: advance the Frame Cache.
    runtime.cache.new_frame();
    // Step 2: reset the Event Store.
    runtime.event_store.reset();
    // Step 3: reset the Value Store's per-frame write tracker.
    runtime.value_store.clear_frame();

    // Step 4: write tAbsMs and invoke the Time Resolver.
    write_f64(runtime, TIME_STEP, program.t_abs_slot, t_abs_ms)?;
    let resolution = time_resolver::resolve(&program.time_model, &mut runtime.time_state, t_abs_ms, mode);
    write_f64(runtime, TIME_STEP, program.t_model_slot, resolution.t_model_ms)?;
    if let (Some(slot), Some(phase)) = (program.phase_slot, resolution.phase01) {
        write_f64(runtime, TIME_STEP, slot, phase)?;
    }
    if let (Some(slot), Some(progress)) = (program.progress_slot, resolution.progress01) {
        write_f64(runtime, TIME_STEP, slot, progress)?;
    }
    if let (Some(slot), Some(wrap)) = (program.wrap_event_slot, resolution.wrap) {
        runtime
            .event_store
            .trigger(slot, t_abs_ms, core_events::EventPayload::Wrap(wrap));
    }
    let dt_ms = runtime.time_state.last_delta_ms;

    // Step 5: dispatch every scheduled step in compiled order.
    for step in &program.schedule.steps {
        dispatch_step(program, runtime, probes, attributes, &resolution, dt_ms, step)?;
    }

    // Step 6: read the primary output slot.
    let out = runtime
        .value_store
        .read(TIME_STEP, program.output.primary_output_slot)?;
    let frame = out
        .as_object()
        .and_then(|a| a.downcast_ref::<RenderFrame>())
        .cloned()
        .ok_or(RuntimeFault::MissingSlotMeta {
            step: TIME_STEP,
            slot: program.output.primary_output_slot,
        })?;

    // Step 7: advance the outer frame counter.
    runtime.frame_id += 1;

    Ok(frame)
}

fn dispatch_step(
    program: &core_model::CompiledProgram,
    runtime: &mut RuntimeState,
    probes: &mut ProbeStore,
    attributes: &AttributeStreams,
    resolution: &core_model::TimeResolution,
    dt_ms: f64,
    step: &core_model::Step,
) -> Result<(), RuntimeFault> {
    let id = step.id;
    match &step.kind {
        // Already applied as part of the preamble in step 4; a compiler
        // that still emits a distinct step for it is a no-op here.
        StepKind::TimeDerive => {}

        StepKind::SignalEval { outputs } => {
            for (sig_id, slot) in outputs {
                let v = eval_signal(
                    program,
                    &mut runtime.cache,
                    &runtime.value_store,
                    resolution,
                    id,
                    *sig_id,
                )?;
                runtime.value_store.write(id, *slot, Value::F64(v))?;
            }
        }

        StepKind::NodeEval { opcode, inputs, outputs } => {
            eval_node(
                &mut runtime.value_store,
                &mut runtime.state_buffer,
                id,
                opcode,
                inputs,
                outputs,
                dt_ms,
            )?;
        }

        StepKind::BusEval(spec) => {
            let v = combine_signal_bus(&runtime.value_store, id, spec, |cid| {
                program.const_pool.resolve_f64(cid).unwrap_or(0.0)
            })?;
            runtime.value_store.write(id, spec.out_slot, Value::F64(v))?;
        }

        StepKind::EventBusEval(spec) => {
            if let Some(payload) = combine_event_bus(&runtime.event_store, spec) {
                runtime.event_store.trigger(spec.out_slot, resolution.t_abs_ms, payload);
            }
        }

        StepKind::Materialize(spec) => {
            let ctx = field_ctx(program, &runtime.value_store, resolution, attributes, id);
            let batch = materialize_instances(&ctx, &mut runtime.cache, &mut runtime.state_buffer, dt_ms, spec)?;
            let pass = Arc::new(Pass::Instances2D(batch)) as Arc<dyn std::any::Any + Send + Sync>;
            runtime.value_store.write(id, spec.out_slot, Value::Object(pass))?;
        }

        StepKind::MaterializeColor(spec) => {
            let ctx = field_ctx(program, &runtime.value_store, resolution, attributes, id);
            let color = materialize_color(&ctx, &mut runtime.cache, &mut runtime.state_buffer, dt_ms, spec)?;
            let boxed = Arc::new(color) as Arc<dyn std::any::Any + Send + Sync>;
            runtime.value_store.write(id, spec.out_slot, Value::Object(boxed))?;
        }

        StepKind::MaterializePath(spec) => {
            let ctx = field_ctx(program, &runtime.value_store, resolution, attributes, id);
            let batch = materialize_path(&ctx, &mut runtime.cache, &mut runtime.state_buffer, dt_ms, id, spec)?;
            let pass = Arc::new(Pass::Paths2D(batch)) as Arc<dyn std::any::Any + Send + Sync>;
            runtime.value_store.write(id, spec.out_slot, Value::Object(pass))?;
        }

        StepKind::MaterializeTestGeometry { domain_slot, out_slot } => {
            let batch = materialize_test_geometry(&runtime.value_store, id, *domain_slot)?;
            let pass = Arc::new(Pass::Instances2D(batch)) as Arc<dyn std::any::Any + Send + Sync>;
            runtime.value_store.write(id, *out_slot, Value::Object(pass))?;
        }

        StepKind::Project3DTo2D(cfg) => {
            let ctx = field_ctx(program, &runtime.value_store, resolution, attributes, id);
            let (batch, counters) =
                project_3d_to_2d(&ctx, &mut runtime.cache, &mut runtime.state_buffer, dt_ms, id, cfg)?;
            tracing::trace!(
                target: "exec.project",
                step = id.0,
                non_finite = counters.non_finite,
                culled = counters.culled,
                "projected"
            );
            let pass = Arc::new(Pass::Instances2D(batch)) as Arc<dyn std::any::Any + Send + Sync>;
            runtime.value_store.write(id, cfg.out_slot, Value::Object(pass))?;
        }

        // No camera table exists on the compiled program contract this
        // core consumes, so CameraEval writes a fixed identity camera.
        // Documented as a deliberate scope decision (DESIGN.md) rather
        // than an oversight: spec.md treats the 3D path as optional and
        // doesn't specify camera authoring, only that a camera handle
        // reaches Project3DTo2D.
        StepKind::CameraEval { out_slot } => {
            let camera = Arc::new(Camera { view_projection: Mat4::IDENTITY }) as Arc<dyn std::any::Any + Send + Sync>;
            runtime.value_store.write(id, *out_slot, Value::Object(camera))?;
        }

        // As above: no mesh table exists, so MeshMaterialize passes its
        // input handle through unchanged rather than performing any real
        // per-vertex transform.
        StepKind::MeshMaterialize { mesh_slot, out_slot } => {
            let mesh = runtime.value_store.read(id, *mesh_slot)?;
            runtime.value_store.write(id, *out_slot, mesh)?;
        }

        StepKind::RenderAssemble(spec) => {
            let frame = assemble_render_frame(program, &runtime.value_store, id, spec)?;
            let boxed = Arc::new(frame) as Arc<dyn std::any::Any + Send + Sync>;
            runtime.value_store.write(id, spec.out_slot, Value::Object(boxed))?;
        }

        StepKind::DebugProbe(spec) => {
            let current = match spec.target {
                ProbeTarget::Slot(slot) => runtime.value_store.read(id, slot)?.as_f64().unwrap_or(0.0),
                ProbeTarget::Signal(sig_id) => eval_signal(
                    program,
                    &mut runtime.cache,
                    &runtime.value_store,
                    resolution,
                    id,
                    sig_id,
                )?,
            };
            probes.record(spec, current);
        }
    }
    Ok(())
}

fn field_ctx<'a>(
    program: &'a core_model::CompiledProgram,
    value_store: &'a core_state::ValueStore,
    resolution: &'a core_model::TimeResolution,
    attributes: &'a AttributeStreams,
    step: StepId,
) -> FieldContext<'a> {
    FieldContext {
        program,
        value_store,
        time: resolution,
        attributes,
        step,
    }
}

/// Built-in placeholder domain used by `MaterializeTestGeometry`: `N`
/// points evenly spaced around a unit circle, opaque white, unit size. A
/// debugging affordance for exercising the render pipeline without a
/// compiled field graph, not a field-driven materializer.
fn materialize_test_geometry(
    value_store: &core_state::ValueStore,
    step: StepId,
    domain_slot: SlotId,
) -> Result<core_model::InstanceBatch2D, RuntimeFault> {
    let n = value_store
        .read(step, domain_slot)?
        .as_f64()
        .unwrap_or(0.0)
        .max(0.0)
        .round() as usize;
    let mut batch = core_model::InstanceBatch2D::default();
    for i in 0..n {
        let theta = (i as f32 / n.max(1) as f32) * std::f32::consts::TAU;
        batch.x.push(theta.cos());
        batch.y.push(theta.sin());
        batch.r.push(255);
        batch.g.push(255);
        batch.b.push(255);
        batch.a.push(255);
        batch.size.push(1.0);
    }
    Ok(batch)
}
