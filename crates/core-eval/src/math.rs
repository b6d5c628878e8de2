//! Shared numeric building blocks for signal expressions and field lenses
//! (spec.md §4.6, §4.7). Kept free of cache/store concerns so `core-field`
//! can reuse the exact same easing/quantize/clamp math for lenses without a
//! cyclic dependency on the signal evaluator's dispatch loop.
//!
//! Edge-case policy (spec.md §4.6): division is never trapped (IEEE
//! ±infinity/NaN propagate); easing inputs are clamped to `[0,1]` first;
//! quantization step counts `<= 0` are normalized to `1`.

use core_model::EasingKind;

pub fn clamp(x: f64, min: f64, max: f64) -> f64 {
    x.max(min).min(max)
}

pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

pub fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    if edge0 == edge1 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = clamp((x - edge0) / (edge1 - edge0), 0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

pub fn quantize(x: f64, steps: f64) -> f64 {
    let steps = if steps <= 0.0 { 1.0 } else { steps };
    (x * steps).round() / steps
}

pub fn ease(kind: EasingKind, t: f64) -> f64 {
    let t = clamp(t, 0.0, 1.0);
    match kind {
        EasingKind::Linear => t,
        EasingKind::InQuad => t * t,
        EasingKind::OutQuad => 1.0 - (1.0 - t) * (1.0 - t),
        EasingKind::InOutQuad => {
            if t < 0.5 {
                2.0 * t * t
            } else {
                1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
            }
        }
        EasingKind::InCubic => t * t * t,
        EasingKind::OutCubic => 1.0 - (1.0 - t).powi(3),
        EasingKind::InOutCubic => {
            if t < 0.5 {
                4.0 * t * t * t
            } else {
                1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
            }
        }
    }
}
