use std::fmt;
use std::sync::Arc;

/// per-file progress callback shared between the dispatcher and a pipeline
///
/// values are percentages; anything outside [0, 100] is clamped before the
/// callback sees it. A reporter without a callback is a no-op, so pipelines
/// can report unconditionally.
#[derive(Clone, Default)]
pub struct ProgressReporter {
    callback: Option<Arc<dyn Fn(f32) + Send + Sync>>,
}

impl ProgressReporter {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(f32) + Send + Sync + 'static,
    {
        Self { callback: Some(Arc::new(callback)) }
    }

    pub fn silent() -> Self {
        Self::default()
    }

    pub fn report(&self, percent: f32) {
        if let Some(callback) = &self.callback {
            let percent = if percent.is_nan() { 0.0 } else { percent.clamp(0.0, 100.0) };
            callback(percent);
        }
    }

    /// maps a fraction in [0, 1] linearly onto `start..=end` and reports it
    pub fn report_span(&self, fraction: f64, start: f32, end: f32) {
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        self.report(start + (end - start) * fraction as f32);
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("attached", &self.callback.is_some())
            .finish()
    }
}
