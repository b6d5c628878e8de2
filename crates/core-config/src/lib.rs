//! Program ingest validation and host runtime configuration.
//!
//! Two concerns live here, both host-boundary rather than per-frame
//! concerns (spec.md §6, §9 design note "global mutable state -> explicit
//! Runtime State value" — this crate never touches that state, only the
//! inputs that precede it):
//!
//! 1. [`validate_program`] walks a [`CompiledProgram`]'s schedule once at
//!    load time and confirms every step's referenced slots, expression ids
//!    and sub-tables are present, per spec.md §6: "the core validates only
//!    that required sub-tables are present when steps that reference them
//!    are scheduled."
//! 2. [`HostConfig`] parses an optional `animrt.toml`, the non-program
//!    knobs a host legitimately owns (default viewport, a frame-cache
//!    capacity hint, debug-probe sampling).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Deserialize;

use core_model::{CompiledProgram, RuntimeFault, SlotId, StepId, StepKind};

fn check_slot(program: &CompiledProgram, step: StepId, slot: SlotId) -> Result<(), RuntimeFault> {
    if program.slot_meta(slot).is_none() {
        return Err(RuntimeFault::MissingSlotMeta { step, slot });
    }
    Ok(())
}

/// Validate that every step's referenced slots, expression ids, and
/// sub-tables exist in the program before any frame is ever executed.
/// Mirrors the fatal-programming-error checks [`core_state::ValueStore`]
/// and the evaluators perform per-access, but surfaces them once at load
/// time instead of mid-frame.
pub fn validate_program(program: &CompiledProgram) -> Result<(), RuntimeFault> {
    for step in &program.schedule.steps {
        let id = step.id;
        match &step.kind {
            StepKind::TimeDerive => {}
            StepKind::SignalEval { outputs } => {
                if outputs.is_empty() {
                    continue;
                }
                for (sig_id, slot) in outputs {
                    if program.signal_expr(*sig_id).is_none() {
                        return Err(RuntimeFault::BadSignalExprId(*sig_id));
                    }
                    check_slot(program, id, *slot)?;
                }
            }
            StepKind::NodeEval { inputs, outputs, .. } => {
                for slot in inputs.iter().chain(outputs.iter()) {
                    check_slot(program, id, *slot)?;
                }
            }
            StepKind::BusEval(spec) => {
                for p in &spec.publishers {
                    check_slot(program, id, p.slot)?;
                }
                check_slot(program, id, spec.out_slot)?;
            }
            StepKind::EventBusEval(spec) => {
                for p in &spec.publishers {
                    check_slot(program, id, p.slot)?;
                }
                check_slot(program, id, spec.out_slot)?;
            }
            StepKind::Materialize(spec) => {
                check_slot(program, id, spec.domain_slot)?;
                check_slot(program, id, spec.out_slot)?;
                for f in [spec.x, spec.y, spec.r, spec.g, spec.b, spec.a, spec.size] {
                    if program.field_expr(f).is_none() {
                        return Err(RuntimeFault::BadFieldExprId(f));
                    }
                }
                if let Some(f) = spec.z {
                    if program.field_expr(f).is_none() {
                        return Err(RuntimeFault::BadFieldExprId(f));
                    }
                }
                if let Some(f) = spec.alive {
                    if program.field_expr(f).is_none() {
                        return Err(RuntimeFault::BadFieldExprId(f));
                    }
                }
                if program.field_table.is_empty() {
                    return Err(RuntimeFault::MissingRequiredTable {
                        step: id,
                        kind: "materialize",
                        table: "fieldTable",
                    });
                }
            }
            StepKind::MaterializeColor(spec) => {
                check_slot(program, id, spec.domain_slot)?;
                check_slot(program, id, spec.out_slot)?;
                if program.field_expr(spec.color).is_none() {
                    return Err(RuntimeFault::BadFieldExprId(spec.color));
                }
            }
            StepKind::MaterializePath(spec) => {
                check_slot(program, id, spec.domain_slot)?;
                check_slot(program, id, spec.out_slot)?;
                if program.field_expr(spec.cmd_field).is_none() {
                    return Err(RuntimeFault::BadFieldExprId(spec.cmd_field));
                }
                if program.field_expr(spec.point_field).is_none() {
                    return Err(RuntimeFault::BadFieldExprId(spec.point_field));
                }
            }
            StepKind::MaterializeTestGeometry { domain_slot, out_slot } => {
                check_slot(program, id, *domain_slot)?;
                check_slot(program, id, *out_slot)?;
            }
            StepKind::Project3DTo2D(cfg) => {
                check_slot(program, id, cfg.domain_slot)?;
                check_slot(program, id, cfg.camera_slot)?;
                check_slot(program, id, cfg.out_slot)?;
                for f in [cfg.pos_x, cfg.pos_y, cfg.pos_z] {
                    if program.field_expr(f).is_none() {
                        return Err(RuntimeFault::BadFieldExprId(f));
                    }
                }
            }
            StepKind::CameraEval { out_slot } => check_slot(program, id, *out_slot)?,
            StepKind::MeshMaterialize { mesh_slot, out_slot } => {
                check_slot(program, id, *mesh_slot)?;
                check_slot(program, id, *out_slot)?;
            }
            StepKind::RenderAssemble(spec) => {
                for slot in &spec.pass_slots {
                    check_slot(program, id, *slot)?;
                }
                check_slot(program, id, spec.out_slot)?;
            }
            StepKind::DebugProbe(_) => {}
        }
    }
    check_slot(program, StepId(u32::MAX), program.t_abs_slot)?;
    check_slot(program, StepId(u32::MAX), program.t_model_slot)?;
    check_slot(program, StepId(u32::MAX), program.output.primary_output_slot)?;
    Ok(())
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ViewportConfig {
    #[serde(default = "ViewportConfig::default_w")]
    pub w: u32,
    #[serde(default = "ViewportConfig::default_h")]
    pub h: u32,
    #[serde(default = "ViewportConfig::default_dpr")]
    pub dpr: f32,
}

impl ViewportConfig {
    const fn default_w() -> u32 {
        1280
    }
    const fn default_h() -> u32 {
        720
    }
    const fn default_dpr() -> f32 {
        1.0
    }
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            w: Self::default_w(),
            h: Self::default_h(),
            dpr: Self::default_dpr(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ProbeConfig {
    /// Sample every Nth frame instead of every frame; 0/1 means "every frame".
    #[serde(default)]
    pub sample_every: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct HostConfigFile {
    #[serde(default)]
    viewport: ViewportConfig,
    #[serde(default)]
    probe: ProbeConfig,
    #[serde(default)]
    cache_capacity_hint: Option<usize>,
}

/// Non-program-authored host knobs (spec.md §6 `runtimeCtx`, §9 "ambient
/// configuration"). Unknown TOML keys are ignored so a newer host config can
/// be read by an older core without erroring.
#[derive(Debug, Clone, Default)]
pub struct HostConfig {
    pub viewport: ViewportConfig,
    pub probe: ProbeConfig,
    pub cache_capacity_hint: Option<usize>,
}

impl From<HostConfigFile> for HostConfig {
    fn from(f: HostConfigFile) -> Self {
        Self {
            viewport: f.viewport,
            probe: f.probe,
            cache_capacity_hint: f.cache_capacity_hint,
        }
    }
}

/// Best-effort discovery: prefer `./animrt.toml`, matching the teacher's
/// "local working directory file wins" convention.
pub fn discover() -> PathBuf {
    PathBuf::from("animrt.toml")
}

/// Load host configuration from `path`, or defaults if the file is absent
/// or fails to parse (a malformed host config is a host inconvenience, not
/// a core fault — never block startup over it).
pub fn load_from(path: Option<PathBuf>) -> Result<HostConfig> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        return Ok(HostConfig::default());
    };
    match toml::from_str::<HostConfigFile>(&content) {
        Ok(file) => Ok(file.into()),
        Err(e) => {
            tracing::warn!(target: "config", path = %path.display(), error = %e, "animrt_toml_parse_failed_using_defaults");
            Ok(HostConfig::default())
        }
    }
}

pub fn load(path: &Path) -> Result<HostConfig> {
    load_from(Some(path.to_path_buf()))
}
