use std::time::Instant;

/// Value computed from the wall-clock bounds of a measurement.
///
/// Closures taking the start and end instants implement this trait.
pub trait TimeEvent: Send + Sync {
    fn calculate(&self, start: Instant, end: Instant) -> f64;
}

impl<F> TimeEvent for F
where
    F: Fn(Instant, Instant) -> f64 + Send + Sync,
{
    fn calculate(&self, start: Instant, end: Instant) -> f64 {
        self(start, end)
    }
}

/// Elapsed time between start and stop in a fixed unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Elapsed {
    Seconds,
    Milliseconds,
    Microseconds,
    Nanoseconds,
}

impl Elapsed {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Seconds => "seconds",
            Self::Milliseconds => "milliseconds",
            Self::Microseconds => "microseconds",
            Self::Nanoseconds => "nanoseconds",
        }
    }

    pub(super) const ALL: [Self; 4] = [
        Self::Seconds,
        Self::Milliseconds,
        Self::Microseconds,
        Self::Nanoseconds,
    ];
}

impl TimeEvent for Elapsed {
    fn calculate(&self, start: Instant, end: Instant) -> f64 {
        // Saturates to zero when the bounds are out of order.
        let elapsed = end.saturating_duration_since(start);
        match self {
            Self::Seconds => elapsed.as_secs_f64(),
            Self::Milliseconds => elapsed.as_secs_f64() * 1e3,
            Self::Microseconds => elapsed.as_secs_f64() * 1e6,
            Self::Nanoseconds => elapsed.as_nanos() as f64,
        }
    }
}
