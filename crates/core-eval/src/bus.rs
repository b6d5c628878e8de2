//! Bus Combiner: aggregate publisher slots into one bus value (spec.md §4.8).
//!
//! Continuous signal buses read the current value of every enabled
//! publisher slot, order them by `sortKey` (ties by slot id, since
//! `Publisher` doesn't carry a separate identity), and fold with the
//! configured combine mode. Event buses instead read this frame's trigger
//! state for each publisher slot out of the [`EventStore`].

use core_model::{
    EventBusSpec, EventCombineMode, RuntimeFault, SignalBusSpec, SignalCombineMode, SilentValue,
    StepId,
};
use core_events::{EventPayload, EventStore};
use core_state::ValueStore;

/// Evaluate a continuous-signal bus and return its combined value.
pub fn combine_signal_bus(
    value_store: &ValueStore,
    step: StepId,
    spec: &SignalBusSpec,
    resolve_const: impl Fn(core_model::ConstId) -> f64,
) -> Result<f64, RuntimeFault> {
    let mut contributing: Vec<(i64, f64)> = Vec::with_capacity(spec.publishers.len());
    for p in &spec.publishers {
        if !p.enabled {
            continue;
        }
        let v = value_store.read(step, p.slot)?.as_f64().unwrap_or(0.0);
        contributing.push((p.sort_key, v));
    }
    contributing.sort_by_key(|(k, _)| *k);

    if contributing.is_empty() {
        return Ok(match spec.silent {
            SilentValue::Zero => 0.0,
            SilentValue::One => 1.0,
            SilentValue::Const(id) => resolve_const(id),
        });
    }

    let values = contributing.iter().map(|(_, v)| *v);
    Ok(match spec.mode {
        SignalCombineMode::Sum => values.sum(),
        SignalCombineMode::Average => {
            let n = contributing.len() as f64;
            values.sum::<f64>() / n
        }
        SignalCombineMode::Min => values.fold(f64::INFINITY, f64::min),
        SignalCombineMode::Max => values.fold(f64::NEG_INFINITY, f64::max),
        SignalCombineMode::Last => contributing.last().map(|(_, v)| *v).unwrap_or(0.0),
        SignalCombineMode::Product => values.product(),
    })
}

/// Evaluate a discrete-event bus and return the combined payload to trigger
/// on the bus's output slot, or `None` if nothing fired this frame (silent =
/// empty list).
///
/// `merge` orders the union by event `time` first, matching spec.md §3's
/// "time-sorted list of `(time, payload)`" and P9's "time-stable-sorted
/// concatenation". Publisher `sortKey` only breaks ties between events with
/// the same time, since a sort by `time` alone is otherwise unstable between
/// publishers that fired at the same instant.
pub fn combine_event_bus(event_store: &EventStore, spec: &EventBusSpec) -> Option<EventPayload> {
    let mut fired: Vec<(f64, i64, EventPayload)> = Vec::new();
    for p in &spec.publishers {
        if !p.enabled {
            continue;
        }
        if let (Some(time), Some(payload)) = (event_store.time(p.slot), event_store.payload(p.slot)) {
            fired.push((time, p.sort_key, payload.clone()));
        }
    }
    if fired.is_empty() {
        return None;
    }
    fired.sort_by(|(t1, k1, _), (t2, k2, _)| t1.total_cmp(t2).then(k1.cmp(k2)));

    Some(match spec.mode {
        EventCombineMode::Merge => {
            if fired.len() == 1 {
                fired.into_iter().next().unwrap().2
            } else {
                EventPayload::Merged(fired.into_iter().map(|(_, _, p)| p).collect())
            }
        }
        EventCombineMode::First => fired.into_iter().next().unwrap().2,
        EventCombineMode::Last => fired.into_iter().last().unwrap().2,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_model::{ConstId, Domain, Publisher, SlotId, SlotMeta, StorageClass, Value, World};

    fn vs_with(values: &[(u32, f64)]) -> ValueStore {
        let metas: Vec<SlotMeta> = values
            .iter()
            .enumerate()
            .map(|(i, (id, _))| {
                SlotMeta::new(SlotId(*id), StorageClass::F64, i as u32, World::Signal, Domain::Float)
            })
            .collect();
        let mut vs = ValueStore::new(&metas);
        for (id, v) in values {
            vs.load_initial(SlotId(*id), Value::F64(*v)).unwrap();
        }
        vs
    }

    fn publisher(slot: u32, enabled: bool, sort_key: i64) -> Publisher {
        Publisher {
            slot: SlotId(slot),
            enabled,
            sort_key,
        }
    }

    #[test]
    fn sum_ignores_disabled_publisher() {
        let vs = vs_with(&[(0, 1.0), (1, 10.0)]);
        let spec = SignalBusSpec {
            publishers: vec![publisher(0, true, 0), publisher(1, false, 1)],
            mode: SignalCombineMode::Sum,
            silent: SilentValue::Zero,
            out_slot: SlotId(9),
        };
        let v = combine_signal_bus(&vs, StepId(0), &spec, |_| 0.0).unwrap();
        assert_eq!(v, 1.0);
    }

    #[test]
    fn silent_value_when_no_publisher_contributes() {
        let vs = vs_with(&[(0, 1.0)]);
        let spec = SignalBusSpec {
            publishers: vec![publisher(0, false, 0)],
            mode: SignalCombineMode::Sum,
            silent: SilentValue::One,
            out_slot: SlotId(9),
        };
        let v = combine_signal_bus(&vs, StepId(0), &spec, |_| 0.0).unwrap();
        assert_eq!(v, 1.0);
    }

    #[test]
    fn silent_const_is_resolved_via_callback() {
        let vs = vs_with(&[]);
        let spec = SignalBusSpec {
            publishers: vec![],
            mode: SignalCombineMode::Max,
            silent: SilentValue::Const(ConstId(3)),
            out_slot: SlotId(9),
        };
        let v = combine_signal_bus(&vs, StepId(0), &spec, |id| {
            assert_eq!(id, ConstId(3));
            42.0
        })
        .unwrap();
        assert_eq!(v, 42.0);
    }

    #[test]
    fn product_and_average() {
        let vs = vs_with(&[(0, 2.0), (1, 3.0)]);
        let sum_spec = SignalBusSpec {
            publishers: vec![publisher(0, true, 0), publisher(1, true, 1)],
            mode: SignalCombineMode::Product,
            silent: SilentValue::Zero,
            out_slot: SlotId(9),
        };
        assert_eq!(
            combine_signal_bus(&vs, StepId(0), &sum_spec, |_| 0.0).unwrap(),
            6.0
        );
        let avg_spec = SignalBusSpec {
            mode: SignalCombineMode::Average,
            ..sum_spec
        };
        assert_eq!(
            combine_signal_bus(&vs, StepId(0), &avg_spec, |_| 0.0).unwrap(),
            2.5
        );
    }

    #[test]
    fn event_merge_combines_all_fired_publishers() {
        let mut store = EventStore::new();
        store.trigger(SlotId(0), 16.0, EventPayload::RisingEdge { value: 1.0 });
        store.trigger(SlotId(1), 16.0, EventPayload::RisingEdge { value: 2.0 });
        let spec = EventBusSpec {
            publishers: vec![publisher(0, true, 0), publisher(1, true, 1)],
            mode: EventCombineMode::Merge,
            out_slot: SlotId(9),
        };
        let merged = combine_event_bus(&store, &spec).unwrap();
        assert_eq!(
            merged,
            EventPayload::Merged(vec![
                EventPayload::RisingEdge { value: 1.0 },
                EventPayload::RisingEdge { value: 2.0 },
            ])
        );
    }

    #[test]
    fn event_merge_orders_by_time_not_by_sort_key() {
        let mut store = EventStore::new();
        // Publisher 1 has the later sortKey but fired earlier; merge must
        // honor event time over sortKey (spec.md §3, P9).
        store.trigger(SlotId(0), 40.0, EventPayload::RisingEdge { value: 1.0 });
        store.trigger(SlotId(1), 10.0, EventPayload::RisingEdge { value: 2.0 });
        let spec = EventBusSpec {
            publishers: vec![publisher(0, true, 0), publisher(1, true, 1)],
            mode: EventCombineMode::Merge,
            out_slot: SlotId(9),
        };
        let merged = combine_event_bus(&store, &spec).unwrap();
        assert_eq!(
            merged,
            EventPayload::Merged(vec![
                EventPayload::RisingEdge { value: 2.0 },
                EventPayload::RisingEdge { value: 1.0 },
            ])
        );
    }

    #[test]
    fn event_bus_silent_when_nothing_fired() {
        let store = EventStore::new();
        let spec = EventBusSpec {
            publishers: vec![publisher(0, true, 0)],
            mode: EventCombineMode::First,
            out_slot: SlotId(9),
        };
        assert!(combine_event_bus(&store, &spec).is_none());
    }
}
