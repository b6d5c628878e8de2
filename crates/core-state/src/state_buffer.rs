//! State Buffer: persistent cross-frame storage cells (spec.md §4.2).
//!
//! Cells are addressed by `(storage, offset, size)` rather than by pointer,
//! which is what lets hot-swap treat preservation as a key-join against the
//! new layout (spec.md §9).

use core_model::{ConstPool, StableKey, StateCellMeta, StateLayout, StorageClass};

#[derive(Debug, Default)]
pub struct StateBuffer {
    cells: Vec<StateCellMeta>,
    f64_bank: Vec<f64>,
    f32_bank: Vec<f32>,
    i32_bank: Vec<i32>,
}

impl StateBuffer {
    pub fn new(layout: &StateLayout, const_pool: &ConstPool) -> Self {
        let mut buf = StateBuffer {
            cells: layout.cells.clone(),
            f64_bank: vec![0.0; layout.bank_sizes.f64_len as usize],
            f32_bank: vec![0.0; layout.bank_sizes.f32_len as usize],
            i32_bank: vec![0; layout.bank_sizes.i32_len as usize],
        };
        for cell in &buf.cells.clone() {
            buf.init_cell(cell, const_pool);
        }
        buf
    }

    fn init_cell(&mut self, cell: &StateCellMeta, const_pool: &ConstPool) {
        let init = cell
            .initial_const_id
            .and_then(|id| const_pool.resolve_f64(id))
            .unwrap_or(0.0);
        let start = cell.offset as usize;
        let end = start + cell.size as usize;
        match cell.storage {
            StorageClass::F64 => self.f64_bank[start..end].fill(init),
            StorageClass::F32 => self.f32_bank[start..end].fill(init as f32),
            StorageClass::I32 => self.i32_bank[start..end].fill(init as i32),
            StorageClass::U32 | StorageClass::Object => {
                // State cells are numeric-only; these classes never appear
                // in a compiled state layout.
            }
        }
    }

    pub fn find(&self, key: &StableKey) -> Option<&StateCellMeta> {
        self.cells.iter().find(|c| &c.key == key)
    }

    pub fn f64_slice(&self, cell: &StateCellMeta) -> &[f64] {
        let start = cell.offset as usize;
        &self.f64_bank[start..start + cell.size as usize]
    }

    pub fn f64_slice_mut(&mut self, cell: &StateCellMeta) -> &mut [f64] {
        let start = cell.offset as usize;
        &mut self.f64_bank[start..start + cell.size as usize]
    }

    pub fn f32_slice(&self, cell: &StateCellMeta) -> &[f32] {
        let start = cell.offset as usize;
        &self.f32_bank[start..start + cell.size as usize]
    }

    pub fn f32_slice_mut(&mut self, cell: &StateCellMeta) -> &mut [f32] {
        let start = cell.offset as usize;
        &mut self.f32_bank[start..start + cell.size as usize]
    }

    pub fn i32_slice(&self, cell: &StateCellMeta) -> &[i32] {
        let start = cell.offset as usize;
        &self.i32_bank[start..start + cell.size as usize]
    }

    pub fn i32_slice_mut(&mut self, cell: &StateCellMeta) -> &mut [i32] {
        let start = cell.offset as usize;
        &mut self.i32_bank[start..start + cell.size as usize]
    }

    /// Copy `old_cell`'s elements from `old` into `new_cell` in `self`.
    /// Caller (the Hot-Swap Engine) guarantees storage class and size match
    /// (spec.md §4.11 step 2); this is a plain element-wise copy.
    pub fn copy_cell_from(
        &mut self,
        new_cell: &StateCellMeta,
        old: &StateBuffer,
        old_cell: &StateCellMeta,
    ) {
        debug_assert_eq!(new_cell.storage, old_cell.storage);
        debug_assert_eq!(new_cell.size, old_cell.size);
        match new_cell.storage {
            StorageClass::F64 => {
                let src = old.f64_slice(old_cell).to_vec();
                self.f64_slice_mut(new_cell).copy_from_slice(&src);
            }
            StorageClass::F32 => {
                let src = old.f32_slice(old_cell).to_vec();
                self.f32_slice_mut(new_cell).copy_from_slice(&src);
            }
            StorageClass::I32 => {
                let src = old.i32_slice(old_cell).to_vec();
                self.i32_slice_mut(new_cell).copy_from_slice(&src);
            }
            StorageClass::U32 | StorageClass::Object => {}
        }
    }
}
