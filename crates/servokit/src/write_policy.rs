//! Optional suppression of redundant hardware writes.

/// Per-channel record of the last written position, used to skip writes
/// that the hardware could not resolve anyway.
///
/// With controller precision `n`, two positions closer than
/// `1 / (2 * (n - 1))` map to the same hardware value.
#[derive(Debug, Clone, Default)]
pub struct WritePolicy {
    lazy: bool,
    epsilon: f64,
    last: Vec<Option<f64>>,
}

impl WritePolicy {
    /// A policy that writes everything.
    pub fn new(channels: usize, precision: Option<u32>) -> Self {
        let mut policy = Self::default();
        policy.configure(channels, precision);
        policy
    }

    /// Half the distance between two adjacent hardware positions.
    pub fn epsilon_for(precision: u32) -> f64 {
        if precision < 2 {
            return 0.0;
        }
        1.0 / (2.0 * f64::from(precision - 1))
    }

    /// Resize for `channels` and recompute epsilon, keeping the lazy flag.
    pub fn configure(&mut self, channels: usize, precision: Option<u32>) {
        self.epsilon = precision.map_or(0.0, Self::epsilon_for);
        self.last = vec![None; channels];
    }

    /// Turn write suppression on or off.
    pub fn set_lazy(&mut self, lazy: bool) {
        self.lazy = lazy;
    }

    /// Whether write suppression is on.
    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    /// Minimum distance from the last written position that triggers a write.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Whether `position` must be sent to `channel`.
    pub fn should_write(&self, channel: usize, position: f64) -> bool {
        if !self.lazy {
            return true;
        }
        match self.last.get(channel).copied().flatten() {
            Some(last) => (position - last).abs() >= self.epsilon,
            None => true,
        }
    }

    /// Remember a successful write.
    pub fn record(&mut self, channel: usize, position: f64) {
        if let Some(slot) = self.last.get_mut(channel) {
            *slot = Some(position);
        }
    }

    /// Forget every written position, e.g. after a hardware reset.
    pub fn forget(&mut self) {
        self.last.iter_mut().for_each(|slot| *slot = None);
    }
}
