//! Const Pool: four immutable parallel stores indexed by [`ConstId`]
//! (spec.md §3 "Const Pool").

use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstBank {
    Json,
    F64,
    F32,
    I32,
}

/// Immutable compile-time value store. Banks are append-only at construction
/// and never mutated afterward — the pool is shared, read-only input.
#[derive(Debug, Clone, Default)]
pub struct ConstPool {
    json: Vec<JsonValue>,
    f64s: Vec<f64>,
    f32s: Vec<f32>,
    i32s: Vec<i32>,
    /// `constId -> (bank, localIdx)`.
    index: Vec<(ConstBank, u32)>,
}

impl ConstPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_f64(&mut self, v: f64) -> ConstId {
        let idx = self.f64s.len() as u32;
        self.f64s.push(v);
        self.register(ConstBank::F64, idx)
    }

    pub fn push_f32(&mut self, v: f32) -> ConstId {
        let idx = self.f32s.len() as u32;
        self.f32s.push(v);
        self.register(ConstBank::F32, idx)
    }

    pub fn push_i32(&mut self, v: i32) -> ConstId {
        let idx = self.i32s.len() as u32;
        self.i32s.push(v);
        self.register(ConstBank::I32, idx)
    }

    pub fn push_json(&mut self, v: JsonValue) -> ConstId {
        let idx = self.json.len() as u32;
        self.json.push(v);
        self.register(ConstBank::Json, idx)
    }

    fn register(&mut self, bank: ConstBank, local_idx: u32) -> ConstId {
        let id = ConstId(self.index.len() as u32);
        self.index.push((bank, local_idx));
        id
    }

    /// Resolve a const to an `f64`, widening from whichever numeric bank it
    /// lives in. Returns `None` for `Json` entries or an out-of-range id —
    /// callers treat a miss as "no initial value" (spec.md §3 I3).
    pub fn resolve_f64(&self, id: ConstId) -> Option<f64> {
        let (bank, idx) = *self.index.get(id.0 as usize)?;
        let idx = idx as usize;
        match bank {
            ConstBank::F64 => self.f64s.get(idx).copied(),
            ConstBank::F32 => self.f32s.get(idx).copied().map(|v| v as f64),
            ConstBank::I32 => self.i32s.get(idx).copied().map(|v| v as f64),
            ConstBank::Json => None,
        }
    }

    pub fn resolve_json(&self, id: ConstId) -> Option<&JsonValue> {
        let (bank, idx) = *self.index.get(id.0 as usize)?;
        if bank != ConstBank::Json {
            return None;
        }
        self.json.get(idx as usize)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
