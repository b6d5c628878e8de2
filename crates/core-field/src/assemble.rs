//! RenderAssemble (spec.md §4.9): gathers prior batches from designated
//! slots into one versioned `RenderFrame`, the stable hot-swap handoff
//! point.

use core_model::{AssembleSpec, ClearMode, ClearSpec, CompiledProgram, Pass, RenderFrame, RuntimeFault, StepId};
use core_state::ValueStore;

pub fn assemble_render_frame(
    program: &CompiledProgram,
    value_store: &ValueStore,
    step: StepId,
    spec: &AssembleSpec,
) -> Result<RenderFrame, RuntimeFault> {
    let clear = match spec.clear {
        ClearSpec::None => ClearMode::None,
        ClearSpec::ColorConst(id) => {
            let packed = program.const_pool.resolve_f64(id).unwrap_or(0.0) as i64 as u32;
            ClearMode::Color { rgba: packed }
        }
    };

    let mut frame = RenderFrame::new(clear);
    for slot in &spec.pass_slots {
        let v = value_store.read(step, *slot)?;
        let pass = v
            .as_object()
            .and_then(|a| a.downcast_ref::<Pass>())
            .cloned()
            .ok_or(RuntimeFault::MissingSlotMeta { step, slot: *slot })?;
        frame.passes.push(pass);
    }
    Ok(frame)
}
