//! State Cell metadata and layout (spec.md §3 "State Cell").

use crate::const_pool::ConstId;
use crate::value::StorageClass;

/// Stable identifier for a persistent state cell: `(nodeId, role)`. Stable
/// across recompilations of the same author graph, which is what makes
/// hot-swap a map-join rather than a graph rewrite (spec.md §9).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StableKey {
    pub node_id: String,
    pub role: String,
}

impl StableKey {
    pub fn new(node_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            role: role.into(),
        }
    }
}

/// Compiler-emitted description of one persistent state cell.
#[derive(Debug, Clone)]
pub struct StateCellMeta {
    pub key: StableKey,
    pub storage: StorageClass,
    pub offset: u32,
    pub size: u32,
    pub initial_const_id: Option<ConstId>,
}

/// The fixed set of state cells for a compiled program (spec.md §3: "the set
/// of cells is fixed for a given compiled program").
#[derive(Debug, Clone, Default)]
pub struct StateLayout {
    pub cells: Vec<StateCellMeta>,
    pub bank_sizes: BankSizes,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BankSizes {
    pub f64_len: u32,
    pub f32_len: u32,
    pub i32_len: u32,
}

impl StateLayout {
    pub fn find(&self, key: &StableKey) -> Option<&StateCellMeta> {
        self.cells.iter().find(|c| &c.key == key)
    }
}
