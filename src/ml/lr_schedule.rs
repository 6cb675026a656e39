// ============================================================
// Layer 5 — Polynomial Learning-Rate Schedule
// ============================================================
//   lr(i) = base_lr * (1 - i / total_iters) ^ power
//
// The iteration index is the global counter (it does not reset
// per epoch). Past total_iters the base is clamped at zero, so
// the rate bottoms out at 0 instead of going negative or NaN.

use crate::domain::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolyLrSchedule {
    base_lr:     f64,
    total_iters: usize,
    power:       f64,
}

impl PolyLrSchedule {
    pub fn new(base_lr: f64, total_iters: usize, power: f64) -> Result<Self, ConfigError> {
        if !base_lr.is_finite() {
            return Err(ConfigError::NotFinite { field: "base_lr", value: base_lr });
        }
        if base_lr <= 0.0 {
            return Err(ConfigError::NonPositive { field: "base_lr", value: base_lr.to_string() });
        }
        if !power.is_finite() {
            return Err(ConfigError::NotFinite { field: "power", value: power });
        }
        if power <= 0.0 {
            return Err(ConfigError::NonPositive { field: "power", value: power.to_string() });
        }
        if total_iters == 0 {
            return Err(ConfigError::NonPositive { field: "total_iters", value: "0".into() });
        }
        Ok(Self { base_lr, total_iters, power })
    }

    /// Schedule spanning `epochs * iters_per_epoch` iterations.
    pub fn for_run(
        base_lr:         f64,
        epochs:          usize,
        iters_per_epoch: usize,
        power:           f64,
    ) -> Result<Self, ConfigError> {
        let total = epochs.checked_mul(iters_per_epoch).ok_or(ConfigError::ScheduleOverflow {
            epochs,
            iterations_per_epoch: iters_per_epoch,
        })?;
        if total == 0 {
            return Err(ConfigError::EmptySchedule {
                epochs,
                iterations_per_epoch: iters_per_epoch,
            });
        }
        Self::new(base_lr, total, power)
    }

    pub fn rate(&self, iteration: usize) -> f64 {
        let progress = iteration as f64 / self.total_iters as f64;
        self.base_lr * (1.0 - progress).max(0.0).powf(self.power)
    }

    pub fn total_iters(&self) -> usize {
        self.total_iters
    }

    pub fn base_lr(&self) -> f64 {
        self.base_lr
    }
}
