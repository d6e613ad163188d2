//! EMA (Exponential Moving Average) building block

/// Smoothing multiplier for an EMA of `period`: 2 / (period + 1)
pub fn ema_multiplier(period: usize) -> f64 {
    2.0 / (period as f64 + 1.0)
}

/// Simple mean of a sequence; `None` when empty
pub fn simple_average<'a>(values: impl IntoIterator<Item = &'a f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// EMA that must be seeded (usually with an SMA) before it can be stepped
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    multiplier: f64,
    value: Option<f64>,
}

impl Ema {
    /// Create an unseeded EMA
    pub fn new(period: usize) -> Self {
        Self {
            period,
            multiplier: ema_multiplier(period),
            value: None,
        }
    }

    /// Get EMA period
    pub fn period(&self) -> usize {
        self.period
    }

    /// Smoothing multiplier
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Set the starting value
    pub fn seed(&mut self, value: f64) {
        self.value = Some(value);
    }

    /// Check if a seed has been set
    pub fn is_seeded(&self) -> bool {
        self.value.is_some()
    }

    /// Step with a new value. Before seeding the value itself becomes the seed.
    pub fn next(&mut self, value: f64) -> f64 {
        let next = match self.value {
            Some(prev) => (value - prev) * self.multiplier + prev,
            None => value,
        };
        self.value = Some(next);
        next
    }

    /// Current value
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = None;
    }
}
