//! Slot identity and compiler-emitted slot metadata (spec.md §3 "Slot").

use crate::value::StorageClass;

/// Non-negative integer naming a typed storage location, written at most
/// once per frame (I2). Validity of a given id against a program's slot
/// table is enforced by [`crate::error::RuntimeFault`] producers, not by
/// this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u32);

/// The broad role a slot plays, used by the bus combiner and materializer to
/// decide eligibility (e.g. only `Signal`/`Event` worlds may be bus publishers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum World {
    Signal,
    Field,
    Event,
    Config,
    Scalar,
    Special,
}

/// Semantic domain of a slot's value, independent of storage class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Float,
    Int,
    Phase01,
    Waveform,
    RenderTree,
    Other,
}

/// Compiler-emitted metadata describing one slot. Present in the program's
/// slot table; every slot referenced by any scheduled step must appear here
/// (spec.md §3 invariant I1).
#[derive(Debug, Clone)]
pub struct SlotMeta {
    pub id: SlotId,
    pub storage: StorageClass,
    /// Offset into the storage bank selected by `storage`.
    pub offset: u32,
    pub world: World,
    pub domain: Domain,
    pub category: String,
    pub bus_eligible: bool,
}

impl SlotMeta {
    pub fn new(
        id: SlotId,
        storage: StorageClass,
        offset: u32,
        world: World,
        domain: Domain,
    ) -> Self {
        Self {
            id,
            storage,
            offset,
            world,
            domain,
            category: String::new(),
            bus_eligible: false,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn bus_eligible(mut self, yes: bool) -> Self {
        self.bus_eligible = yes;
        self
    }
}
