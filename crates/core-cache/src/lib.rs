//! Frame Cache: stamp-based memoization for signal values and field handles
//! (spec.md §3 "Frame Cache Entries", §4.4).
//!
//! Stamp semantics (spec.md §4.4):
//! - `frameId` starts at 1, not 0, so a zero-filled stamp array means "never
//!   cached" rather than colliding with a real frame.
//! - `new_frame` increments `frameId` and clears the buffer map in O(1); it
//!   does **not** zero the stamp arrays — a hit is simply `stamp[i] ==
//!   frameId`, so last frame's stamps just stop matching.
//! - `invalidate` zeros the stamp arrays and clears the buffer map but
//!   leaves `frameId` untouched; it stays monotonic across invalidations
//!   (hot-swap relies on this — spec.md §4.11 step 4).

use std::collections::HashMap;
use std::hash::BuildHasherDefault;

use ahash::AHasher;
use core_model::{BufferKey, FieldExprId, SignalExprId, Value};

type FastMap<K, V> = HashMap<K, V, BuildHasherDefault<AHasher>>;

#[derive(Debug)]
pub struct FrameCache {
    frame_id: u32,
    signal_values: Vec<f64>,
    signal_stamps: Vec<u32>,
    field_handles: Vec<Option<Value>>,
    field_stamps: Vec<u32>,
    buffer_map: FastMap<BufferKey, Value>,
}

impl FrameCache {
    /// `signal_count`/`field_count` are the sizes of the program's signal
    /// and field expression tables (spec.md §4.4 "Capacities are derived
    /// from the sizes of the signal and field expression tables").
    pub fn new(signal_count: usize, field_count: usize) -> Self {
        Self {
            frame_id: 1,
            signal_values: vec![0.0; signal_count],
            signal_stamps: vec![0; signal_count],
            field_handles: (0..field_count).map(|_| None).collect(),
            field_stamps: vec![0; field_count],
            buffer_map: FastMap::default(),
        }
    }

    pub fn frame_id(&self) -> u32 {
        self.frame_id
    }

    /// Restore a previously observed `frameId`, preserving monotonicity
    /// across hot-swap (spec.md §4.11 step 3: "Copy `frameId` ... from old
    /// to new"). Does not touch stamps or the buffer map.
    pub fn restore_frame_id(&mut self, frame_id: u32) {
        self.frame_id = frame_id;
    }

    /// Advance to a new frame: increment `frameId`, clear the buffer map.
    /// O(1) — stamp arrays are left alone.
    pub fn new_frame(&mut self) -> u32 {
        self.frame_id += 1;
        self.buffer_map.clear();
        self.frame_id
    }

    /// Zero all stamps and clear the buffer map. `frameId` is untouched and
    /// remains monotonic (used by hot-swap to invalidate derived state
    /// without resetting time continuity).
    pub fn invalidate(&mut self) {
        self.signal_stamps.iter_mut().for_each(|s| *s = 0);
        self.field_stamps.iter_mut().for_each(|s| *s = 0);
        self.buffer_map.clear();
    }

    pub fn signal_get(&self, id: SignalExprId) -> Option<f64> {
        let idx = id.0 as usize;
        if self.signal_stamps.get(idx).copied() == Some(self.frame_id) {
            tracing::trace!(target: "cache.signal", ?id, "hit");
            Some(self.signal_values[idx])
        } else {
            None
        }
    }

    pub fn signal_set(&mut self, id: SignalExprId, value: f64) {
        let idx = id.0 as usize;
        self.signal_values[idx] = value;
        self.signal_stamps[idx] = self.frame_id;
    }

    pub fn field_get(&self, id: FieldExprId) -> Option<&Value> {
        let idx = id.0 as usize;
        if self.field_stamps.get(idx).copied() == Some(self.frame_id) {
            tracing::trace!(target: "cache.field", ?id, "hit");
            self.field_handles[idx].as_ref()
        } else {
            None
        }
    }

    pub fn field_set(&mut self, id: FieldExprId, handle: Value) {
        let idx = id.0 as usize;
        self.field_handles[idx] = Some(handle);
        self.field_stamps[idx] = self.frame_id;
    }

    pub fn buffer_get(&self, key: &BufferKey) -> Option<&Value> {
        let hit = self.buffer_map.get(key);
        if hit.is_some() {
            tracing::trace!(target: "cache.buffer", ?key, "hit");
        }
        hit
    }

    pub fn buffer_set(&mut self, key: BufferKey, value: Value) {
        self.buffer_map.insert(key, value);
    }
}
