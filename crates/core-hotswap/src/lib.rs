//! Runtime State allocation and the Hot-Swap Engine (spec.md §3 "Ownership",
//! §4.11).
//!
//! `RuntimeState` bundles everything the Schedule Executor mutates across a
//! frame: the Value Store, State Buffer, Event Store, Frame Cache, Time
//! State, and the outer frame counter. It's allocated here rather than in
//! `core-exec` so hot-swap — a map-join against a fresh allocation — never
//! needs to depend on the executor crate, avoiding a cycle (`core-exec`
//! depends on `core-hotswap`, not the reverse).

use core_cache::FrameCache;
use core_events::EventStore;
use core_model::{CompiledProgram, RuntimeFault, TimeState};
use core_state::{StateBuffer, ValueStore};

/// Everything the executor owns and mutates for one compiled program
/// (spec.md §3 "Ownership": "the Schedule Executor owns one mutable Runtime
/// State").
pub struct RuntimeState {
    pub value_store: ValueStore,
    pub state_buffer: StateBuffer,
    pub event_store: EventStore,
    pub cache: FrameCache,
    pub time_state: TimeState,
    /// Outer frame counter, incremented once per `execute_frame` call
    /// (distinct from, but kept in step with, the Frame Cache's own
    /// `frameId` — spec.md §4.11 step 3 copies both across a swap).
    pub frame_id: u64,
}

impl RuntimeState {
    /// Allocate a fresh runtime for `program`: Value Store (including
    /// compile-time initial slot values), State Buffer (const-pool
    /// defaults), an empty Event Store, a zeroed Frame Cache, and zeroed
    /// Time State (spec.md §4.11 step 1).
    pub fn allocate(program: &CompiledProgram) -> Result<Self, RuntimeFault> {
        let mut value_store = ValueStore::new(&program.slots);
        for (&slot, value) in &program.initial_slot_values {
            value_store.load_initial(slot, value.clone())?;
        }
        let state_buffer = StateBuffer::new(&program.state_layout, &program.const_pool);
        let cache = FrameCache::new(program.signal_table.len(), program.field_table.len());
        Ok(Self {
            value_store,
            state_buffer,
            event_store: EventStore::new(),
            cache,
            time_state: TimeState::new(),
            frame_id: 0,
        })
    }
}

/// Replace a running program with a recompiled version without losing
/// state or time continuity (spec.md §4.11).
pub struct HotSwapEngine;

impl HotSwapEngine {
    /// Build a new `RuntimeState` for `new_program`, preserving state cells
    /// that match by stable key/storage/size from `old`, and preserving
    /// frame and time continuity. Never mutates `old` — on construction
    /// failure the caller keeps running the old runtime/program unchanged
    /// (spec.md §7 "Hot-swap failure modes are confined").
    pub fn swap(
        old: &RuntimeState,
        old_program: &CompiledProgram,
        new_program: &CompiledProgram,
    ) -> Result<RuntimeState, RuntimeFault> {
        let mut new_state = RuntimeState::allocate(new_program).map_err(|e| {
            tracing::error!(target: "hotswap.apply", error = %e, "construction_failed");
            RuntimeFault::HotSwapConstructionFailed {
                reason: e.to_string(),
            }
        })?;

        Self::preserve_state_cells(old, old_program, new_program, &mut new_state);

        // Preserve time continuity (step 3): frame counters and TimeState.
        new_state.frame_id = old.frame_id;
        new_state.cache.restore_frame_id(old.cache.frame_id());
        new_state.time_state = old.time_state;

        // Invalidate per-frame caches on the new runtime (step 4). The
        // fresh allocation already has zeroed stamps and an empty buffer
        // map, but `invalidate` is still called for the case a future
        // allocation strategy starts warm.
        new_state.cache.invalidate();

        tracing::debug!(
            target: "hotswap.apply",
            preserved_cells = new_program.state_layout.cells.len(),
            frame_id = new_state.frame_id,
            "swapped"
        );
        Ok(new_state)
    }

    fn preserve_state_cells(
        old: &RuntimeState,
        old_program: &CompiledProgram,
        new_program: &CompiledProgram,
        new_state: &mut RuntimeState,
    ) {
        for new_cell in &new_program.state_layout.cells {
            let matched = old_program
                .state_layout
                .find(&new_cell.key)
                .filter(|old_cell| old_cell.storage == new_cell.storage && old_cell.size == new_cell.size);
            if let Some(old_cell) = matched {
                new_state
                    .state_buffer
                    .copy_cell_from(new_cell, &old.state_buffer, old_cell);
                tracing::trace!(target: "hotswap.apply", key = ?new_cell.key, "cell_preserved");
            } else {
                tracing::trace!(target: "hotswap.apply", key = ?new_cell.key, "cell_reinitialized");
            }
            // Cells in `old_program` but not `new_program` are simply never
            // visited here, which is the "dropped silently" behavior spec.md
            // §4.11 step 2 calls for.
        }
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

    fn program_with_layout(layout: StateLayout) -> CompiledProgram {
        CompiledProgram {
            time_model: TimeModel::Infinite,
            slots: vec![core_model::SlotMeta::new(
                SlotId(0),
                StorageClass::F64,
                0,
                World::Special,
                Domain::Float,
            )],
            state_layout: layout,
            const_pool: ConstPool::new(),
            signal_table: vec![],
            field_table: vec![],
            event_table: vec![],
            schedule: Schedule::default(),
            initial_slot_values: HashMap::new(),
            output: OutputSpec {
                primary_output_slot: SlotId(0),
            },
            debug: DebugMetadata::default(),
            t_abs_slot: SlotId(0),
            t_model_slot: SlotId(0),
            phase_slot: None,
            progress_slot: None,
            wrap_event_slot: None,
        }
    }

    #[test]
    fn matching_cell_is_preserved_nonmatching_dropped_new_initialized() {
        let mut const_pool = ConstPool::new();
        let forty_two = const_pool.push_f64(42.0);

        let old_layout = StateLayout {
            cells: vec![
                StateCellMeta {
                    key: StableKey::new("nodeA", "accumulator"),
                    storage: StorageClass::F64,
                    offset: 0,
                    size: 1,
                    initial_const_id: None,
                },
                StateCellMeta {
                    key: StableKey::new("nodeB", "value"),
                    storage: StorageClass::F64,
                    offset: 1,
                    size: 1,
                    initial_const_id: None,
                },
            ],
            bank_sizes: BankSizes {
                f64_len: 2,
                f32_len: 0,
                i32_len: 0,
            },
        };
        let mut old_program = program_with_layout(old_layout.clone());
        old_program.const_pool = const_pool.clone();

        let new_layout = StateLayout {
            cells: vec![
                StateCellMeta {
                    key: StableKey::new("nodeA", "accumulator"),
                    storage: StorageClass::F64,
                    offset: 0,
                    size: 1,
                    initial_const_id: None,
                },
                StateCellMeta {
                    key: StableKey::new("nodeC", "value"),
                    storage: StorageClass::F64,
                    offset: 1,
                    size: 1,
                    initial_const_id: Some(forty_two),
                },
            ],
            bank_sizes: BankSizes {
                f64_len: 2,
                f32_len: 0,
                i32_len: 0,
            },
        };
        let mut new_program = program_with_layout(new_layout);
        new_program.const_pool = const_pool;

        let mut old_runtime = RuntimeState::allocate(&old_program).unwrap();
        let acc_cell = old_program
            .state_layout
            .find(&StableKey::new("nodeA", "accumulator"))
            .unwrap()
            .clone();
        old_runtime.state_buffer.f64_slice_mut(&acc_cell)[0] = 77.7;
        let val_cell = old_program
            .state_layout
            .find(&StableKey::new("nodeB", "value"))
            .unwrap()
            .clone();
        old_runtime.state_buffer.f64_slice_mut(&val_cell)[0] = 11.1;
        old_runtime.frame_id = 9;

        let new_runtime = HotSwapEngine::swap(&old_runtime, &old_program, &new_program).unwrap();

        let new_acc = new_program
            .state_layout
            .find(&StableKey::new("nodeA", "accumulator"))
            .unwrap()
            .clone();
        assert_eq!(new_runtime.state_buffer.f64_slice(&new_acc), &[77.7]);

        let new_c = new_program
            .state_layout
            .find(&StableKey::new("nodeC", "value"))
            .unwrap()
            .clone();
        assert_eq!(new_runtime.state_buffer.f64_slice(&new_c), &[42.0]);

        assert_eq!(new_runtime.frame_id, 9);
    }

    #[test]
    fn swap_to_identical_program_is_identity_on_state() {
        let layout = StateLayout {
            cells: vec![StateCellMeta {
                key: StableKey::new("n1", "x"),
                storage: StorageClass::F64,
                offset: 0,
                size: 1,
                initial_const_id: None,
            }],
            bank_sizes: BankSizes {
                f64_len: 1,
                f32_len: 0,
                i32_len: 0,
            },
        };
        let program = program_with_layout(layout);
        let mut old_runtime = RuntimeState::allocate(&program).unwrap();
        let cell = program.state_layout.find(&StableKey::new("n1", "x")).unwrap().clone();
        old_runtime.state_buffer.f64_slice_mut(&cell)[0] = 5.0;

        let new_runtime = HotSwapEngine::swap(&old_runtime, &program, &program).unwrap();
        assert_eq!(new_runtime.state_buffer.f64_slice(&cell), &[5.0]);
    }

    #[test]
    fn frame_cache_id_and_time_state_are_preserved() {
        let program = program_with_layout(StateLayout::default());
        let mut old_runtime = RuntimeState::allocate(&program).unwrap();
        old_runtime.cache.new_frame();
        old_runtime.cache.new_frame();
        old_runtime.time_state.wrap_count = 3;
        old_runtime.time_state.prev_t_abs_ms = 1234.5;
        old_runtime.time_state.has_prev = true;

        let new_runtime = HotSwapEngine::swap(&old_runtime, &program, &program).unwrap();
        assert_eq!(new_runtime.cache.frame_id(), old_runtime.cache.frame_id());
        assert_eq!(new_runtime.time_state.wrap_count, 3);
        assert_eq!(new_runtime.time_state.prev_t_abs_ms, 1234.5);
    }
}
