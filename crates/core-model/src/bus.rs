//! Bus combiner configuration (spec.md §4.8).

use crate::const_pool::ConstId;
use crate::slot::SlotId;

/// A single publisher contributing to a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Publisher {
    pub slot: SlotId,
    pub enabled: bool,
    pub sort_key: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalCombineMode {
    Sum,
    Average,
    Min,
    Max,
    Last,
    Product,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCombineMode {
    Merge,
    First,
    Last,
}

/// Silent default used when no enabled publisher contributes
/// (spec.md §4.8, Glossary "Silent value").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SilentValue {
    Zero,
    One,
    Const(ConstId),
}

#[derive(Debug, Clone)]
pub struct SignalBusSpec {
    pub publishers: Vec<Publisher>,
    pub mode: SignalCombineMode,
    pub silent: SilentValue,
    pub out_slot: SlotId,
}

#[derive(Debug, Clone)]
pub struct EventBusSpec {
    pub publishers: Vec<Publisher>,
    pub mode: EventCombineMode,
    pub out_slot: SlotId,
}
