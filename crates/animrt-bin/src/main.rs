//! `animrt` entrypoint: loads host configuration, builds an in-process demo
//! program, and drives the Runtime Adapter one frame at a time, printing a
//! summary of each `RenderFrame` (spec.md §6).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;

use core_exec::{RuntimeAdapter, RuntimeCtx, Viewport};
use core_model::{
    AssembleSpec, ClearSpec, CompiledProgram, ConstPool, CyclicMode, DebugMetadata, Domain,
    OutputSpec, ProbeMode, ProbeSpec, ProbeTarget, Schedule, SignalExpr, SignalExprId, SlotId,
    SlotMeta, StorageClass, Step, StepId, StepKind, TimeModel, TimeSource, TrigOp, Value, World,
};

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "animrt", version, about = "Dataflow animation runtime core demo host")]
struct Args {
    /// Optional host configuration file (defaults to `./animrt.toml` if present).
    #[arg(long = "config")]
    config: Option<PathBuf>,
    /// Number of frames to run.
    #[arg(long, default_value_t = 120)]
    frames: u32,
    /// Fixed per-frame delta, in milliseconds.
    #[arg(long = "dt-ms", default_value_t = 16.666)]
    dt_ms: f64,
}

fn configure_logging() -> Option<WorkerGuard> {
    let log_dir = Path::new(".");
    let log_path = log_dir.join("animrt.log");
    if log_path.exists() {
        let _ = std::fs::remove_file(&log_path);
    }
    let file_appender = tracing_appender::rolling::never(log_dir, "animrt.log");
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    match tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(nb_writer)
        .try_init()
    {
        Ok(_) => Some(guard),
        Err(_) => None,
    }
}

/// A small built-in program: a 3-second looping clock drives a sine signal
/// (sampled through a debug probe) and a fixed-count ring of test geometry
/// assembled into a single-pass `RenderFrame`. Exists to exercise the
/// Schedule Executor end to end without depending on a compiler.
fn demo_program() -> CompiledProgram {
    let t_abs = SlotId(0);
    let t_model = SlotId(1);
    let phase = SlotId(2);
    let domain_count = SlotId(3);
    let sin_slot = SlotId(4);
    let pass = SlotId(5);
    let out = SlotId(6);

    let slots = vec![
        SlotMeta::new(t_abs, StorageClass::F64, 0, World::Special, Domain::Float),
        SlotMeta::new(t_model, StorageClass::F64, 1, World::Special, Domain::Float),
        SlotMeta::new(phase, StorageClass::F64, 2, World::Special, Domain::Phase01),
        SlotMeta::new(domain_count, StorageClass::I32, 0, World::Scalar, Domain::Int),
        SlotMeta::new(sin_slot, StorageClass::F64, 3, World::Signal, Domain::Float),
        SlotMeta::new(pass, StorageClass::Object, 0, World::Special, Domain::RenderTree),
        SlotMeta::new(out, StorageClass::Object, 1, World::Special, Domain::RenderTree),
    ];

    let mut const_pool = ConstPool::new();
    let clear_rgba = const_pool.push_f64(0x102030FFu32 as f64);

    let mut initial_slot_values = HashMap::new();
    initial_slot_values.insert(domain_count, Value::I32(24));

    // signal_table[0] = tModelMs; signal_table[1] = sin(tModelMs).
    let signal_table = vec![
        SignalExpr::Time(TimeSource::TModelMs),
        SignalExpr::Trig(TrigOp::Sin, SignalExprId(0)),
    ];
    let sin_signal = SignalExprId(1);

    let schedule = Schedule {
        steps: vec![
            Step {
                id: StepId(0),
                kind: StepKind::SignalEval {
                    outputs: vec![(sin_signal, sin_slot)],
                },
            },
            Step {
                id: StepId(1),
                kind: StepKind::DebugProbe(ProbeSpec {
                    name: "sin_wave".into(),
                    target: ProbeTarget::Signal(sin_signal),
                    mode: ProbeMode::Value,
                }),
            },
            Step {
                id: StepId(2),
                kind: StepKind::MaterializeTestGeometry {
                    domain_slot: domain_count,
                    out_slot: pass,
                },
            },
            Step {
                id: StepId(3),
                kind: StepKind::RenderAssemble(AssembleSpec {
                    pass_slots: vec![pass],
                    clear: ClearSpec::ColorConst(clear_rgba),
                    out_slot: out,
                }),
            },
        ],
    };

    CompiledProgram {
        time_model: TimeModel::Cyclic { period_ms: 3000.0, mode: CyclicMode::Loop },
        slots,
        state_layout: Default::default(),
        const_pool,
        signal_table,
        field_table: vec![],
        event_table: vec![],
        schedule,
        initial_slot_values,
        output: OutputSpec { primary_output_slot: out },
        debug: DebugMetadata::default(),
        t_abs_slot: t_abs,
        t_model_slot: t_model,
        phase_slot: Some(phase),
        progress_slot: None,
        wrap_event_slot: None,
    }
}

fn main() -> Result<()> {
    let _log_guard = configure_logging();
    let args = Args::parse();

    let host_config = core_config::load_from(args.config.clone())?;
    tracing::info!(
        target: "runtime",
        w = host_config.viewport.w,
        h = host_config.viewport.h,
        dpr = host_config.viewport.dpr,
        frames = args.frames,
        "startup"
    );

    let program = demo_program();
    core_config::validate_program(&program)?;

    let mut adapter = RuntimeAdapter::new(program)?;
    let ctx = RuntimeCtx {
        viewport: Viewport {
            w: host_config.viewport.w,
            h: host_config.viewport.h,
            dpr: host_config.viewport.dpr,
        },
        mode: core_model::PlaybackMode::Playback,
    };

    let mut t_abs_ms = 0.0;
    for frame_idx in 0..args.frames {
        let frame = adapter.signal(t_abs_ms, ctx)?;
        let sin = adapter.probe("sin_wave");
        tracing::info!(
            target: "runtime.frame",
            frame_idx,
            t_abs_ms,
            passes = frame.passes.len(),
            sin = ?sin,
            "frame"
        );
        t_abs_ms += args.dt_ms;
    }

    tracing::info!(target: "runtime", "shutdown");
    Ok(())
}
