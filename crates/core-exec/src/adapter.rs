//! Runtime Adapter (spec.md §6 "Adapter surface"): the host-facing seam
//! wrapping one compiled program's [`RuntimeState`] and exposing the two
//! operations a host actually calls, `signal` and `swap_program`, plus a
//! stub `event` kept for symmetry with host event pipelines spec.md §6
//! notes are "not yet part of the core".
//!
//! Fatal programming errors inside a frame surface as `RuntimeFault`
//! (typed, precise); construction and hot-swap failures at this boundary
//! use `anyhow`, matching the teacher's convention of `anyhow` at outer
//! seams and a precise typed error at the core (spec.md §4.13 / §9).

use anyhow::Context;

use core_field::AttributeStreams;
use core_hotswap::{HotSwapEngine, RuntimeState};
use core_model::{CompiledProgram, PlaybackMode, RenderFrame};

use crate::debug_probe::ProbeStore;
use crate::executor::execute_frame;

/// Non-program host knobs carried alongside a `signal` call. Distinct from
/// [`core_config::HostConfig`]'s `animrt.toml`-sourced defaults: this is the
/// live per-call value a host may resize every frame, not a load-time
/// default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub w: u32,
    pub h: u32,
    pub dpr: f32,
}

/// Everything `signal` needs from the host beyond the absolute clock
/// reading (spec.md §6: "`runtimeCtx` carries viewport `{w, h, dpr}`").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuntimeCtx {
    pub viewport: Viewport,
    pub mode: PlaybackMode,
}

/// Placeholder host event type. The core does not yet interpret any host
/// event; [`RuntimeAdapter::event`] exists only so a host can wire its
/// input pipeline against a stable method signature ahead of that work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostEvent;

/// Owns one compiled program's runtime and is the only thing a host talks
/// to. Never interleaves `signal` with `swap_program` — spec.md §5 requires
/// hot-swap to happen strictly between frames, which holding `&mut self`
/// across both methods enforces at the type level.
pub struct RuntimeAdapter {
    program: CompiledProgram,
    runtime: RuntimeState,
    probes: ProbeStore,
    attributes: AttributeStreams,
}

impl RuntimeAdapter {
    /// Allocate a fresh runtime for `program` (spec.md §4.11 step 1).
    pub fn new(program: CompiledProgram) -> anyhow::Result<Self> {
        let runtime = RuntimeState::allocate(&program).context("allocating runtime state")?;
        Ok(Self {
            program,
            runtime,
            probes: ProbeStore::new(),
            attributes: AttributeStreams::new(),
        })
    }

    /// Replace named per-element source streams a `FieldRecipe::SourceTag`
    /// may reference. Not part of the compiled program or the preserved
    /// hot-swap surface; a host updates these out of band (e.g. audio
    /// analysis buffers, sensor feeds).
    pub fn set_attribute(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.attributes.insert(name.into(), values);
    }

    /// Advance one frame and return its `RenderFrame` (spec.md §6
    /// `signal(tAbsMs, runtimeCtx) → RenderFrame`).
    pub fn signal(&mut self, t_abs_ms: f64, ctx: RuntimeCtx) -> Result<RenderFrame, core_model::RuntimeFault> {
        let span = tracing::trace_span!(
            "exec.frame",
            t_abs_ms,
            w = ctx.viewport.w,
            h = ctx.viewport.h,
            dpr = ctx.viewport.dpr,
        );
        let _enter = span.enter();
        match execute_frame(
            &self.program,
            &mut self.runtime,
            &mut self.probes,
            &self.attributes,
            t_abs_ms,
            ctx.mode,
        ) {
            Ok(frame) => Ok(frame),
            Err(fault) => {
                tracing::error!(target: "exec.frame", error = %fault, "frame_failed");
                Err(fault)
            }
        }
    }

    /// Stub host event sink (spec.md §6: "A stub `event(hostEvent) → []`
    /// exists for symmetry with host event pipelines that are not yet part
    /// of the core"). Always returns no results.
    pub fn event(&mut self, _host_event: HostEvent) -> Vec<()> {
        Vec::new()
    }

    /// Replace the running program with a recompiled version, preserving
    /// state and time continuity (spec.md §4.11). On failure the adapter
    /// keeps running the previous program unchanged (spec.md §7 "hot-swap
    /// failure modes are confined").
    pub fn swap_program(&mut self, new_program: CompiledProgram) -> anyhow::Result<()> {
        let new_runtime = HotSwapEngine::swap(&self.runtime, &self.program, &new_program)
            .context("hot-swapping runtime state")?;
        self.runtime = new_runtime;
        self.program = new_program;
        Ok(())
    }

    /// Read back a named debug probe's latest summary.
    pub fn probe(&self, name: &str) -> core_model::ProbeSummary {
        self.probes.read(name)
    }

    pub fn program(&self) -> &CompiledProgram {
        &self.program
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_model::{
        BankSizes, ConstPool, DebugMetadata, Domain, OutputSpec, Schedule, SlotId, StableKey,
        StateCellMeta, StateLayout, StorageClass, TimeModel, World,
    };
    use std::collections::HashMap;

    fn ctx() -> RuntimeCtx {
        RuntimeCtx {
            viewport: Viewport { w: 640, h: 480, dpr: 1.0 },
            mode: PlaybackMode::Playback,
        }
    }

    fn minimal_program() -> CompiledProgram {
        let t_abs = SlotId(0);
        let t_model = SlotId(1);
        let out = SlotId(2);
        CompiledProgram {
            time_model: TimeModel::Infinite,
            slots: vec![
                core_model::SlotMeta::new(t_abs, StorageClass::F64, 0, World::Special, Domain::Float),
                core_model::SlotMeta::new(t_model, StorageClass::F64, 1, World::Special, Domain::Float),
                core_model::SlotMeta::new(out, StorageClass::Object, 0, World::Special, Domain::RenderTree),
            ],
            state_layout: StateLayout::default(),
            const_pool: ConstPool::new(),
            signal_table: vec![],
            field_table: vec![],
            event_table: vec![],
            schedule: Schedule {
                steps: vec![core_model::Step {
                    id: core_model::StepId(0),
                    kind: core_model::StepKind::RenderAssemble(core_model::AssembleSpec {
                        pass_slots: vec![],
                        clear: core_model::ClearSpec::None,
                        out_slot: out,
                    }),
                }],
            },
            initial_slot_values: HashMap::new(),
            output: OutputSpec { primary_output_slot: out },
            debug: DebugMetadata::default(),
            t_abs_slot: t_abs,
            t_model_slot: t_model,
            phase_slot: None,
            progress_slot: None,
            wrap_event_slot: None,
        }
    }

    #[test]
    fn signal_advances_the_frame_counter() {
        let mut adapter = RuntimeAdapter::new(minimal_program()).unwrap();
        adapter.signal(0.0, ctx()).unwrap();
        adapter.signal(16.0, ctx()).unwrap();
        assert_eq!(adapter.runtime.frame_id, 2);
    }

    #[test]
    fn event_stub_always_returns_empty() {
        let mut adapter = RuntimeAdapter::new(minimal_program()).unwrap();
        assert!(adapter.event(HostEvent).is_empty());
    }

    #[test]
    fn swap_program_preserves_state_and_time_across_frames() {
        let mut program = minimal_program();
        let key = StableKey::new("n1", "acc");
        program.state_layout = StateLayout {
            cells: vec![StateCellMeta {
                key: key.clone(),
                storage: StorageClass::F64,
                offset: 0,
                size: 1,
                initial_const_id: None,
            }],
            bank_sizes: BankSizes { f64_len: 1, f32_len: 0, i32_len: 0 },
        };

        let mut adapter = RuntimeAdapter::new(program.clone()).unwrap();
        adapter.signal(0.0, ctx()).unwrap();
        adapter.runtime.state_buffer.f64_slice_mut(&key_cell(&program, &key))[0] = 9.0;

        let new_program = program.clone();
        adapter.swap_program(new_program.clone()).unwrap();

        assert_eq!(adapter.runtime.frame_id, 1);
        assert_eq!(
            adapter.runtime.state_buffer.f64_slice(&key_cell(&new_program, &key)),
            &[9.0]
        );
    }

    fn key_cell(program: &CompiledProgram, key: &StableKey) -> StateCellMeta {
        program.state_layout.find(key).unwrap().clone()
    }
}
