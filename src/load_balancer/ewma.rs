//! Exponentially weighted moving average over response times.
//!
//! Stored as the bits of an `f64` so updates are lock-free. The average is
//! seeded by the first sample; later samples are blended in at
//! [`SMOOTHING_WEIGHT`].

use std::sync::atomic::{AtomicU64, Ordering};

/// Weight given to each new sample against the running average.
pub const SMOOTHING_WEIGHT: f64 = 0.1;

#[derive(Debug)]
pub struct Ewma {
    bits: AtomicU64,
    weight: f64,
}

impl Ewma {
    pub fn new(weight: f64) -> Self {
        Self {
            // NaN marks "no samples yet".
            bits: AtomicU64::new(f64::NAN.to_bits()),
            weight,
        }
    }

    /// Current average in milliseconds, 0 before the first sample.
    pub fn get(&self) -> f64 {
        let value = f64::from_bits(self.bits.load(Ordering::Acquire));
        if value.is_nan() { 0.0 } else { value }
    }

    pub fn observe(&self, sample_ms: f64) {
        let mut current_bits = self.bits.load(Ordering::Acquire);
        loop {
            let current = f64::from_bits(current_bits);
            let next = if current.is_nan() {
                sample_ms
            } else {
                current * (1.0 - self.weight) + sample_ms * self.weight
            };

            match self.bits.compare_exchange_weak(
                current_bits,
                next.to_bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(updated) => current_bits = updated,
            }
        }
    }
}

impl Default for Ewma {
    fn default() -> Self {
        Self::new(SMOOTHING_WEIGHT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_seeds_then_blends() {
        let ewma = Ewma::default();
        assert_eq!(ewma.get(), 0.0);

        ewma.observe(100.0);
        assert_eq!(ewma.get(), 100.0);

        ewma.observe(200.0);
        assert!((ewma.get() - 110.0).abs() < 1e-9);
    }
}
