//! Value Store: per-frame slot storage (spec.md §4.1).
//!
//! Storage is banked by [`StorageClass`] so numeric slots never get boxed.
//! `write` enforces single-writer-per-frame (I2) by tracking the set of
//! slots written this frame and failing on a repeat. `clear_frame` resets
//! only that tracker — stored values persist across the boundary so that
//! initial values and persistent "carry" reads (I3) keep working without any
//! special-casing at read time.
//!
//! Compile-time initial slot values are installed once via
//! [`ValueStore::load_initial`], which writes the bank directly without
//! touching the write-tracker — spec.md §9's open question resolves these as
//! *pre-frame* installation, not a per-frame write, so a step is still free
//! to write that same slot on frame 1.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use core_model::{RuntimeFault, SlotId, SlotMeta, StepId, StorageClass, Value};

#[derive(Debug, Default)]
struct Banks {
    f64s: Vec<f64>,
    f32s: Vec<f32>,
    i32s: Vec<i32>,
    u32s: Vec<u32>,
    objects: Vec<Option<Arc<dyn std::any::Any + Send + Sync>>>,
}

impl Banks {
    fn ensure_len(&mut self, class: StorageClass, offset: u32) {
        let needed = offset as usize + 1;
        match class {
            StorageClass::F64 => {
                if self.f64s.len() < needed {
                    self.f64s.resize(needed, 0.0);
                }
            }
            StorageClass::F32 => {
                if self.f32s.len() < needed {
                    self.f32s.resize(needed, 0.0);
                }
            }
            StorageClass::I32 => {
                if self.i32s.len() < needed {
                    self.i32s.resize(needed, 0);
                }
            }
            StorageClass::U32 => {
                if self.u32s.len() < needed {
                    self.u32s.resize(needed, 0);
                }
            }
            StorageClass::Object => {
                if self.objects.len() < needed {
                    self.objects.resize(needed, None);
                }
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct ValueStore {
    metas: HashMap<SlotId, SlotMeta>,
    banks: Banks,
    written_this_frame: HashSet<SlotId>,
}

impl ValueStore {
    pub fn new(slots: &[SlotMeta]) -> Self {
        let mut store = ValueStore::default();
        for meta in slots {
            store.banks.ensure_len(meta.storage, meta.offset);
            store.metas.insert(meta.id, meta.clone());
        }
        store
    }

    fn meta(&self, slot: SlotId) -> Option<&SlotMeta> {
        self.metas.get(&slot)
    }

    /// Install a compile-time initial value. Not tracked as a per-frame
    /// write (spec.md §9).
    pub fn load_initial(&mut self, slot: SlotId, value: Value) -> Result<(), RuntimeFault> {
        self.write_raw(slot, value, None)
    }

    /// Write `value` into `slot` as part of executing `step`. Fails if the
    /// slot is unknown, the storage class doesn't match, or the slot has
    /// already been written this frame.
    pub fn write(&mut self, step: StepId, slot: SlotId, value: Value) -> Result<(), RuntimeFault> {
        if self.written_this_frame.contains(&slot) {
            return Err(RuntimeFault::DoubleWrite { step, slot });
        }
        self.write_raw(slot, value, Some(step))?;
        self.written_this_frame.insert(slot);
        tracing::trace!(target: "state.value_store", ?slot, "write");
        Ok(())
    }

    fn write_raw(
        &mut self,
        slot: SlotId,
        value: Value,
        step: Option<StepId>,
    ) -> Result<(), RuntimeFault> {
        let meta = self.meta(slot).ok_or_else(|| {
            step.map(|s| RuntimeFault::MissingSlotMeta { step: s, slot })
                .unwrap_or(RuntimeFault::MissingSlotMeta {
                    step: StepId(u32::MAX),
                    slot,
                })
        })?;
        let expected = meta.storage;
        let attempted = value.storage_class();
        if expected != attempted {
            return Err(RuntimeFault::StorageMismatch {
                step: step.unwrap_or(StepId(u32::MAX)),
                slot,
                expected,
                attempted,
            });
        }
        let offset = meta.offset as usize;
        match value {
            Value::F64(v) => self.banks.f64s[offset] = v,
            Value::F32(v) => self.banks.f32s[offset] = v,
            Value::I32(v) => self.banks.i32s[offset] = v,
            Value::U32(v) => self.banks.u32s[offset] = v,
            Value::Object(v) => self.banks.objects[offset] = Some(v),
        }
        Ok(())
    }

    /// Read the current value of `slot`. Returns the compiler-supplied
    /// initial value, the last value written (possibly in an earlier
    /// frame), or the implementation-defined numeric zero default if
    /// nothing was ever written (spec.md §3 I3).
    pub fn read(&self, step: StepId, slot: SlotId) -> Result<Value, RuntimeFault> {
        let meta = self
            .meta(slot)
            .ok_or(RuntimeFault::UnknownSlotRead { step, slot })?;
        let offset = meta.offset as usize;
        Ok(match meta.storage {
            StorageClass::F64 => Value::F64(self.banks.f64s[offset]),
            StorageClass::F32 => Value::F32(self.banks.f32s[offset]),
            StorageClass::I32 => Value::I32(self.banks.i32s[offset]),
            StorageClass::U32 => Value::U32(self.banks.u32s[offset]),
            StorageClass::Object => self
                .banks
                .objects
                .get(offset)
                .and_then(|o| o.clone())
                .map(Value::Object)
                .unwrap_or_else(|| Value::zero_for(StorageClass::Object)),
        })
    }

    pub fn has_written_this_frame(&self, slot: SlotId) -> bool {
        self.written_this_frame.contains(&slot)
    }

    /// Reset the per-frame write tracker. Stored values are untouched.
    pub fn clear_frame(&mut self) {
        self.written_this_frame.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_model::Domain;
    use core_model::World;

    fn meta(id: u32, storage: StorageClass, offset: u32) -> SlotMeta {
        SlotMeta::new(SlotId(id), storage, offset, World::Signal, Domain::Float)
    }

    #[test]
    fn write_then_read_roundtrip() {
        let metas = vec![meta(0, StorageClass::F64, 0)];
        let mut vs = ValueStore::new(&metas);
        vs.write(StepId(1), SlotId(0), Value::F64(3.5)).unwrap();
        assert_eq!(vs.read(StepId(1), SlotId(0)).unwrap(), Value::F64(3.5));
    }

    #[test]
    fn double_write_same_frame_is_fatal() {
        let metas = vec![meta(0, StorageClass::F64, 0)];
        let mut vs = ValueStore::new(&metas);
        vs.write(StepId(1), SlotId(0), Value::F64(1.0)).unwrap();
        let err = vs.write(StepId(2), SlotId(0), Value::F64(2.0)).unwrap_err();
        assert_eq!(
            err,
            RuntimeFault::DoubleWrite {
                step: StepId(2),
                slot: SlotId(0)
            }
        );
    }

    #[test]
    fn clear_frame_allows_rewrite_and_preserves_value() {
        let metas = vec![meta(0, StorageClass::F64, 0)];
        let mut vs = ValueStore::new(&metas);
        vs.write(StepId(1), SlotId(0), Value::F64(1.0)).unwrap();
        vs.clear_frame();
        assert_eq!(vs.read(StepId(1), SlotId(0)).unwrap(), Value::F64(1.0));
        vs.write(StepId(1), SlotId(0), Value::F64(2.0)).unwrap();
        assert_eq!(vs.read(StepId(1), SlotId(0)).unwrap(), Value::F64(2.0));
    }

    #[test]
    fn storage_mismatch_is_fatal() {
        let metas = vec![meta(0, StorageClass::F64, 0)];
        let mut vs = ValueStore::new(&metas);
        let err = vs.write(StepId(1), SlotId(0), Value::I32(1)).unwrap_err();
        assert!(matches!(err, RuntimeFault::StorageMismatch { .. }));
    }

    #[test]
    fn unwritten_numeric_slot_defaults_to_zero() {
        let metas = vec![meta(0, StorageClass::F64, 0)];
        let vs = ValueStore::new(&metas);
        assert_eq!(vs.read(StepId(1), SlotId(0)).unwrap(), Value::F64(0.0));
    }

    #[test]
    fn initial_load_is_not_a_tracked_write() {
        let metas = vec![meta(0, StorageClass::F64, 0)];
        let mut vs = ValueStore::new(&metas);
        vs.load_initial(SlotId(0), Value::F64(9.0)).unwrap();
        assert!(!vs.has_written_this_frame(SlotId(0)));
        vs.write(StepId(1), SlotId(0), Value::F64(1.0)).unwrap();
        assert_eq!(vs.read(StepId(1), SlotId(0)).unwrap(), Value::F64(1.0));
    }

    #[test]
    fn unknown_slot_read_and_write_are_fatal() {
        let vs = ValueStore::new(&[]);
        assert!(matches!(
            vs.read(StepId(1), SlotId(5)),
            Err(RuntimeFault::UnknownSlotRead { .. })
        ));
        let mut vs2 = ValueStore::new(&[]);
        assert!(matches!(
            vs2.write(StepId(1), SlotId(5), Value::F64(1.0)),
            Err(RuntimeFault::MissingSlotMeta { .. })
        ));
    }
}
