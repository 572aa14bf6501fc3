//! Learning rate schedule

use burn::{lr_scheduler::LrScheduler, optim::LearningRate, tensor::backend::Backend};

/// Inverse time decay: `lr = initial / (1 + decay * step)`, one step per batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InverseTimeDecay {
    initial: LearningRate,
    decay: f64,
    step: usize,
}

impl InverseTimeDecay {
    pub fn new(initial: LearningRate, decay: f64) -> Self {
        Self {
            initial,
            decay: decay.max(0.0),
            step: 0,
        }
    }

    /// Rate the schedule yields at `step`
    pub fn rate_at(&self, step: usize) -> LearningRate {
        self.initial / (1.0 + self.decay * step as f64)
    }
}

impl LrScheduler for InverseTimeDecay {
    type Record<B: Backend> = usize;

    fn step(&mut self) -> LearningRate {
        let rate = self.rate_at(self.step);
        self.step += 1;
        rate
    }

    fn to_record<B: Backend>(&self) -> Self::Record<B> {
        self.step
    }

    fn load_record<B: Backend>(mut self, record: Self::Record<B>) -> Self {
        self.step = record;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_step_uses_initial_rate() {
        let mut schedule = InverseTimeDecay::new(1e-3, 1e-3 / 15.0);
        assert_eq!(schedule.step(), 1e-3);
        assert!(schedule.step() < 1e-3);
    }

    #[test]
    fn test_rate_halves_after_inverse_decay_steps() {
        let schedule = InverseTimeDecay::new(0.01, 0.5);
        assert!((schedule.rate_at(2) - 0.005).abs() < 1e-12);
        assert!(schedule.rate_at(100) < schedule.rate_at(10));
    }

    #[test]
    fn test_zero_decay_is_constant() {
        let mut schedule = InverseTimeDecay::new(0.002, 0.0);
        for _ in 0..5 {
            assert_eq!(schedule.step(), 0.002);
        }
    }

    #[test]
    fn test_record_restores_step() {
        type B = burn_ndarray::NdArray<f32>;
        let mut schedule = InverseTimeDecay::new(0.01, 0.1);
        schedule.step();
        schedule.step();
        let record = LrScheduler::to_record::<B>(&schedule);
        let restored = InverseTimeDecay::new(0.01, 0.1).load_record::<B>(record);
        assert_eq!(restored, schedule);
    }
}
