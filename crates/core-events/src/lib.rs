//! Event Store: per-frame, one-shot discrete event triggers
//! (spec.md §3 "Event", §4.3).
//!
//! Events are kept out of the Value Store deliberately: they are discrete,
//! not continuous, and storing them as ordinary slot values would let a
//! consumer read a stale trigger from a prior frame as if it just fired.
//! `reset()` runs once at the very start of every frame, before any step.

use std::collections::HashMap;

use core_model::{SlotId, WrapPayload};

/// Payload carried by a triggered event. The wrap event always carries
/// `Wrap`; other compiler-declared events may carry their own shape or
/// nothing at all.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Wrap(WrapPayload),
    RisingEdge { value: f64 },
    /// Union of several publishers' payloads on one frame, produced by an
    /// event bus in `merge` mode (spec.md §4.8). Order is publisher sortKey
    /// order, matching the "stably re-sorted" combine rule.
    Merged(Vec<EventPayload>),
    None,
}

#[derive(Debug, Default)]
pub struct EventStore {
    /// Slots triggered this frame, with the event's `(time, payload)`
    /// (spec.md §3: "a publisher's slot holds a time-sorted list of
    /// `(time, payload)`"). Multiple triggers to the same slot within a
    /// frame overwrite the entry — last trigger wins within the frame
    /// (spec.md §4.3) — so the list this runtime actually keeps is reduced
    /// to at most one entry per slot per frame, not the full history; a bus
    /// merge still needs the per-entry `time` to sort by (P9).
    triggered: HashMap<SlotId, (f64, EventPayload)>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&mut self, slot: SlotId, time: f64, payload: EventPayload) {
        tracing::trace!(target: "events.store", ?slot, time, "trigger");
        self.triggered.insert(slot, (time, payload));
    }

    pub fn check(&self, slot: SlotId) -> bool {
        self.triggered.contains_key(&slot)
    }

    pub fn payload(&self, slot: SlotId) -> Option<&EventPayload> {
        self.triggered.get(&slot).map(|(_, p)| p)
    }

    pub fn time(&self, slot: SlotId) -> Option<f64> {
        self.triggered.get(&slot).map(|(t, _)| *t)
    }

    /// Return the payload iff the slot was triggered this frame, without
    /// removing it (events within a frame are read-many, reset at the next
    /// frame boundary — not consumed-once within the frame).
    pub fn consume(&self, slot: SlotId) -> Option<&EventPayload> {
        self.triggered.get(&slot).map(|(_, p)| p)
    }

    pub fn has_any(&self) -> bool {
        !self.triggered.is_empty()
    }

    pub fn triggered_slots(&self) -> Vec<SlotId> {
        self.triggered.keys().copied().collect()
    }

    /// Clear all triggers. Invoked at the start of every frame, before any
    /// scheduled step runs.
    pub fn reset(&mut self) {
        self.triggered.clear();
    }
}
