//! Time Resolver: derives `(tModel, phase, progress, wrap, scrub)` from
//! `tAbsMs` (spec.md §4.5).
//!
//! Pure function of the time model, the persistent [`TimeState`], the
//! host's absolute clock reading, and a playback/scrub mode hint — it does
//! not touch slots or the Event Store itself; [`crate::executor`] writes
//! the resolved outputs to their designated slots and triggers the wrap
//! event, keeping this module testable in isolation.

use core_model::{CyclicMode, PlaybackMode, TimeModel, TimeResolution, TimeState, WrapPayload};

/// Resolve one frame's time outputs and advance `state` in place
/// (`prevTAbsMs`, `lastDeltaMs`, and — on an unsuppressed wrap —
/// `wrapCount`).
pub fn resolve(
    model: &TimeModel,
    state: &mut TimeState,
    t_abs_ms: f64,
    mode: PlaybackMode,
) -> TimeResolution {
    let delta_ms = if state.has_prev {
        t_abs_ms - state.prev_t_abs_ms
    } else {
        0.0
    };

    let period = match model {
        TimeModel::Cyclic { period_ms, .. } => Some(*period_ms),
        _ => None,
    };

    // Scrub suppression (spec.md §4.5): host-declared scrub, backward time,
    // or (cyclic only) a jump larger than one full period.
    let is_scrub = mode == PlaybackMode::Scrub
        || (state.has_prev && delta_ms < 0.0)
        || matches!(period, Some(p) if p > 0.0 && state.has_prev && delta_ms.abs() > p);

    let (t_model_ms, phase01, progress01) = match model {
        TimeModel::Finite { duration_ms } => {
            let t_model = t_abs_ms.clamp(0.0, *duration_ms);
            let progress = if *duration_ms > 0.0 { t_model / duration_ms } else { 0.0 };
            (t_model, None, Some(progress))
        }
        TimeModel::Cyclic { period_ms, mode: cyclic_mode } => {
            let p = *period_ms;
            if p <= 0.0 {
                (0.0, Some(0.0), None)
            } else {
                match cyclic_mode {
                    CyclicMode::Loop => {
                        let t_model = t_abs_ms.rem_euclid(p);
                        (t_model, Some(t_model / p), None)
                    }
                    CyclicMode::PingPong => {
                        let span = 2.0 * p;
                        let folded = t_abs_ms.rem_euclid(span);
                        let t_model = if folded <= p { folded } else { span - folded };
                        (t_model, Some(t_model / p), None)
                    }
                    CyclicMode::Once => {
                        let t_model = t_abs_ms.clamp(0.0, p);
                        (t_model, Some(t_model / p), None)
                    }
                }
            }
        }
        TimeModel::Infinite => (t_abs_ms, None, None),
    };

    // Wrap detection: forward playback only, normal-sized step, and the
    // period boundary was actually crossed (spec.md §4.5).
    let wrap = period.filter(|p| *p > 0.0).and_then(|p| {
        let normal_forward_step = mode == PlaybackMode::Playback
            && state.has_prev
            && delta_ms > 0.0
            && delta_ms.abs() <= p;
        if !normal_forward_step {
            return None;
        }
        let prev_periods = (state.prev_t_abs_ms / p).floor();
        let cur_periods = (t_abs_ms / p).floor();
        if cur_periods > prev_periods {
            Some(WrapPayload {
                phase: phase01.unwrap_or(0.0),
                count: state.wrap_count + 1,
                delta_ms,
            })
        } else {
            None
        }
    });
    let wrap = if is_scrub { None } else { wrap };

    if let Some(w) = &wrap {
        state.wrap_count = w.count;
    }
    state.prev_t_abs_ms = t_abs_ms;
    state.last_delta_ms = delta_ms;
    state.has_prev = true;

    TimeResolution {
        t_abs_ms,
        t_model_ms,
        phase01,
        progress01,
        wrap,
        is_scrub,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cyclic_loop(period_ms: f64) -> TimeModel {
        TimeModel::Cyclic {
            period_ms,
            mode: CyclicMode::Loop,
        }
    }

    #[test]
    fn cyclic_wrap_count_scenario() {
        let model = cyclic_loop(1000.0);
        let mut state = TimeState::new();
        let frames = [0.0, 950.0, 1010.0, 1500.0, 2100.0];
        let mut wraps = vec![];
        for t in frames {
            let res = resolve(&model, &mut state, t, PlaybackMode::Playback);
            if let Some(w) = res.wrap {
                wraps.push((w.count, w.phase));
            }
        }
        assert_eq!(wraps.len(), 2);
        assert_eq!(wraps[0].0, 1);
        assert!((wraps[0].1 - 0.01).abs() < 1e-9);
        assert_eq!(wraps[1].0, 2);
        assert!((wraps[1].1 - 0.1).abs() < 1e-9);
    }

    #[test]
    fn scrub_suppresses_wrap_on_backward_jump() {
        let model = cyclic_loop(1000.0);
        let mut state = TimeState::new();
        resolve(&model, &mut state, 1100.0, PlaybackMode::Playback);
        let res = resolve(&model, &mut state, 300.0, PlaybackMode::Playback);
        assert!(res.is_scrub);
        assert!(res.wrap.is_none());
        assert!((res.phase01.unwrap() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn scrub_mode_hint_suppresses_wrap_even_on_forward_step() {
        let model = cyclic_loop(1000.0);
        let mut state = TimeState::new();
        resolve(&model, &mut state, 900.0, PlaybackMode::Playback);
        let res = resolve(&model, &mut state, 1100.0, PlaybackMode::Scrub);
        assert!(res.is_scrub);
        assert!(res.wrap.is_none());
    }

    #[test]
    fn large_forward_jump_suppresses_wrap() {
        let model = cyclic_loop(1000.0);
        let mut state = TimeState::new();
        resolve(&model, &mut state, 0.0, PlaybackMode::Playback);
        let res = resolve(&model, &mut state, 5000.0, PlaybackMode::Playback);
        assert!(res.is_scrub);
        assert!(res.wrap.is_none());
    }

    #[test]
    fn finite_model_clamps_and_zero_duration_is_always_zero_progress() {
        let model = TimeModel::Finite { duration_ms: 2000.0 };
        let mut state = TimeState::new();
        let res = resolve(&model, &mut state, 5000.0, PlaybackMode::Playback);
        assert_eq!(res.t_model_ms, 2000.0);
        assert_eq!(res.progress01, Some(1.0));

        let zero_model = TimeModel::Finite { duration_ms: 0.0 };
        let mut state2 = TimeState::new();
        let res2 = resolve(&zero_model, &mut state2, 123.0, PlaybackMode::Playback);
        assert_eq!(res2.progress01, Some(0.0));
    }

    #[test]
    fn zero_period_cyclic_phase_is_always_zero() {
        let model = cyclic_loop(0.0);
        let mut state = TimeState::new();
        let res = resolve(&model, &mut state, 999.0, PlaybackMode::Playback);
        assert_eq!(res.phase01, Some(0.0));
        assert!(res.wrap.is_none());
    }

    #[test]
    fn infinite_model_passes_tabs_through() {
        let mut state = TimeState::new();
        let res = resolve(&TimeModel::Infinite, &mut state, 42.0, PlaybackMode::Playback);
        assert_eq!(res.t_model_ms, 42.0);
        assert_eq!(res.phase01, None);
        assert_eq!(res.progress01, None);
    }

    #[test]
    fn pingpong_reflects_second_half() {
        let model = TimeModel::Cyclic {
            period_ms: 1000.0,
            mode: CyclicMode::PingPong,
        };
        let mut state = TimeState::new();
        let res = resolve(&model, &mut state, 1500.0, PlaybackMode::Playback);
        // 1500 mod 2000 = 1500 > period(1000) -> reflect: 2000-1500=500.
        assert_eq!(res.t_model_ms, 500.0);
    }
}
