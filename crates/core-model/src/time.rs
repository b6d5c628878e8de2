//! Time model and persistent time state (spec.md §3 "Time State", §4.5).

/// How the host most recently moved time forward. Distinguishes normal
/// playback from a scrub gesture so the resolver can suppress wrap events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackMode {
    Playback,
    Scrub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclicMode {
    Loop,
    PingPong,
    Once,
}

/// The compiled program's time model, one of three shapes (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeModel {
    Finite { duration_ms: f64 },
    Cyclic { period_ms: f64, mode: CyclicMode },
    Infinite,
}

/// Persistent, cross-frame, cross-hot-swap record of time continuity
/// (spec.md §3 "Time State").
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeState {
    pub prev_t_abs_ms: f64,
    pub wrap_count: u64,
    pub last_delta_ms: f64,
    /// Set once the first frame has resolved time; `prev_t_abs_ms` is
    /// meaningless before that (there is no "previous" frame yet).
    pub has_prev: bool,
}

impl TimeState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Output of one Time Resolver invocation (spec.md §4.5 "Outputs").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeResolution {
    pub t_abs_ms: f64,
    pub t_model_ms: f64,
    pub phase01: Option<f64>,
    pub progress01: Option<f64>,
    pub wrap: Option<WrapPayload>,
    pub is_scrub: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WrapPayload {
    pub phase: f64,
    pub count: u64,
    pub delta_ms: f64,
}
