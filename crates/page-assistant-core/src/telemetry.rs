//! Per-call timing and resource accounting.
//!
//! Every generation call is wrapped in [`measure`], which times it and
//! samples accelerator memory before and after. The larger sample is kept
//! as a conservative estimate. [`Telemetry`] folds several measurements
//! into the totals reported on a `GenerationResult`.

use std::time::{Duration, Instant};

use anyhow::Result;

/// Best-effort reading of a resource counter (accelerator memory, MB).
pub trait ResourceSampler: Send + Sync {
    fn name(&self) -> &str;

    fn sample(&self) -> Result<f64>;
}

/// Sampler for hosts without a measurable accelerator. Always reports 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSampler;

impl ResourceSampler for NullSampler {
    fn name(&self) -> &str {
        "none"
    }

    fn sample(&self) -> Result<f64> {
        Ok(0.0)
    }
}

/// Timing and resource reading for one measured call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Measurement {
    pub elapsed: Duration,
    pub resource_mb: f64,
}

/// Sample, never fail. Errors degrade to 0.
pub fn sample_or_zero(sampler: &dyn ResourceSampler) -> f64 {
    match sampler.sample() {
        Ok(v) if v.is_finite() && v >= 0.0 => v,
        Ok(v) => {
            tracing::debug!(sampler = sampler.name(), value = v, "discarding invalid sample");
            0.0
        }
        Err(e) => {
            tracing::debug!(sampler = sampler.name(), "resource sample failed: {:#}", e);
            0.0
        }
    }
}

/// Run `f`, returning its output together with the wall-clock time it took
/// and `max(sample_before, sample_after)`.
pub fn measure<T>(sampler: &dyn ResourceSampler, f: impl FnOnce() -> T) -> (T, Measurement) {
    let before = sample_or_zero(sampler);
    let start = Instant::now();
    let out = f();
    let elapsed = start.elapsed();
    let after = sample_or_zero(sampler);
    (
        out,
        Measurement {
            elapsed,
            resource_mb: before.max(after),
        },
    )
}

/// Running totals over the calls of one operation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Telemetry {
    pub elapsed: Duration,
    pub peak_resource_mb: f64,
    pub calls: u32,
}

impl Telemetry {
    pub fn record(&mut self, m: Measurement) {
        self.elapsed += m.elapsed;
        self.peak_resource_mb = self.peak_resource_mb.max(m.resource_mb);
        self.calls += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedSampler(Mutex<Vec<Result<f64>>>);

    impl ResourceSampler for ScriptedSampler {
        fn name(&self) -> &str {
            "scripted"
        }
        fn sample(&self) -> Result<f64> {
            self.0
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(0.0))
        }
    }

    #[test]
    fn test_measure_keeps_larger_sample() {
        // popped in reverse: before = 900, after = 1200
        let s = ScriptedSampler(Mutex::new(vec![Ok(1200.0), Ok(900.0)]));
        let (v, m) = measure(&s, || 7);
        assert_eq!(v, 7);
        assert_eq!(m.resource_mb, 1200.0);
    }

    #[test]
    fn test_sampling_failure_degrades_to_zero() {
        let s = ScriptedSampler(Mutex::new(vec![
            Err(anyhow::anyhow!("no gpu")),
            Err(anyhow::anyhow!("no gpu")),
        ]));
        let (_, m) = measure(&s, || ());
        assert_eq!(m.resource_mb, 0.0);
    }

    #[test]
    fn test_negative_sample_discarded() {
        let s = ScriptedSampler(Mutex::new(vec![Ok(-5.0)]));
        assert_eq!(sample_or_zero(&s), 0.0);
    }

    #[test]
    fn test_telemetry_accumulates() {
        let mut t = Telemetry::default();
        t.record(Measurement {
            elapsed: Duration::from_millis(100),
            resource_mb: 300.0,
        });
        t.record(Measurement {
            elapsed: Duration::from_millis(250),
            resource_mb: 200.0,
        });
        assert_eq!(t.calls, 2);
        assert_eq!(t.elapsed, Duration::from_millis(350));
        assert_eq!(t.peak_resource_mb, 300.0);
    }
}
