//! Implementation of a perceptron with integer weights.

use crate::Outcome;
use crate::history::*;
use crate::predictor::HistoryModel;

/// Parameters for building a [`Perceptron`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PerceptronParams {
    /// Number of history bits (and weights)
    pub len: usize,
    /// Smallest value of any weight or bias
    pub min_weight: i32,
    /// Largest value of any weight or bias
    pub max_weight: i32,
    /// Training threshold
    pub threshold: i32,
}
impl PerceptronParams {
    /// Parameters derived from the history length alone.
    pub fn new(len: usize) -> Self {
        let max_weight = Self::default_max_weight(len);
        Self {
            len,
            min_weight: Self::default_min_weight(max_weight),
            max_weight,
            threshold: Self::default_threshold(len),
        }
    }

    /// Papers suggest this constant (based on the history length).
    pub fn default_threshold(len: usize) -> i32 {
        ((1.93f64 * len as f64) + 14.0f64).round() as i32
    }

    /// The largest weight that fits in 'len' bits [saturating to `i32`].
    pub fn default_max_weight(len: usize) -> i32 {
        let bits = len.saturating_sub(1).min(31);
        ((1i64 << bits) - 1) as i32
    }

    pub fn default_min_weight(max_weight: i32) -> i32 {
        (-(max_weight as i64) - 1) as i32
    }

    /// Number of bits needed to store a single weight.
    pub fn weight_bits(&self) -> usize {
        let lo = self.min_weight as i64;
        let hi = self.max_weight as i64;
        let magnitude = hi.max(-lo - 1).max(0) as u64;
        (u64::BITS - magnitude.leading_zeros()) as usize + 1
    }

    /// Get the [approximate] number of storage bits.
    pub fn storage_bits(&self) -> usize {
        (self.len + 1) * self.weight_bits()
    }

    /// Clamp some initial value into the weight range.
    fn initial(&self, w: i32) -> i32 {
        w.clamp(self.min_weight, self.max_weight)
    }

    pub fn build(self) -> Perceptron {
        Perceptron {
            weights: vec![self.initial(0); self.len],
            bias: self.initial(1),
            params: self,
        }
    }
}

/// Perceptron [with integer weights].
///
/// See the following papers:
///
/// - "Neural Methods for Dynamic Branch Prediction" (Jiménez and Lin, 2002)
/// - "Fast Path-Based Neural Branch Prediction" (Jiménez, 2003)
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Perceptron {
    pub params: PerceptronParams,
    pub weights: Vec<i32>,
    pub bias: i32,
}
impl Perceptron {
    /// Reset the state.
    pub fn reset(&mut self) {
        let zero = self.params.initial(0);
        self.bias = self.params.initial(1);
        self.weights.iter_mut().for_each(|w| *w = zero);
    }

    /// Return a reference to the list of weights.
    pub fn weights(&self) -> &[i32] {
        &self.weights
    }

    pub fn bias(&self) -> i32 { self.bias }

    pub fn threshold(&self) -> i32 { self.params.threshold }

    fn clamp(&self, x: i32) -> i32 {
        x.clamp(self.params.min_weight, self.params.max_weight)
    }

    /// Convert from an [Outcome] into an [i32].
    fn outcome_to_val(outcome: Outcome) -> i32 {
        match outcome {
            Outcome::T => 1,
            Outcome::N => -1,
        }
    }

    /// Compute the output value for some history.
    /// The predicted outcome is determined by the sign of the output.
    pub fn output(&self, ghr: &HistoryRegister) -> i64 {
        assert_eq!(ghr.len(), self.weights.len(),
            "history length doesn't match the number of weights");
        self.weights.iter().enumerate().fold(self.bias as i64, |sum, (idx, w)| {
            sum + (Self::outcome_to_val(ghr.get(idx)) as i64) * (*w as i64)
        })
    }

    /// Given the output computed from some history and the correct outcome,
    /// adjust the weights. Returns 'true' if anything was adjusted.
    pub fn train(&mut self, ghr: &HistoryRegister, output: i64, outcome: Outcome)
        -> bool
    {
        assert_eq!(ghr.len(), self.weights.len());

        // Training occurs after a misprediction, or when the output value is
        // not above the threshold.
        let miss = Outcome::from_score(output) != outcome;
        let below_threshold = output.abs() <= self.params.threshold as i64;
        if !(miss || below_threshold) {
            return false;
        }

        // When a bit in the history matches the outcome, increment the
        // corresponding weight. Otherwise, decrement the corresponding weight.
        let outcome_val = Self::outcome_to_val(outcome);
        self.bias = self.clamp(self.bias.saturating_add(outcome_val));
        for idx in 0..self.weights.len() {
            let adj = if ghr.get(idx) == outcome { 1 } else { -1 };
            self.weights[idx] = self.clamp(self.weights[idx].saturating_add(adj));
        }
        true
    }
}

impl HistoryModel for Perceptron {
    type Output = i64;

    fn name(&self) -> &'static str { "Perceptron" }

    fn forward(&self, ghr: &HistoryRegister) -> i64 {
        self.output(ghr)
    }

    fn score(output: &i64) -> i64 { *output }

    fn train(&mut self, ghr: &HistoryRegister, output: &i64, outcome: Outcome)
        -> bool
    {
        Perceptron::train(self, ghr, *output, outcome)
    }

    fn reset(&mut self) {
        Perceptron::reset(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use Outcome::*;

    fn ghr_from(bits: &[Outcome]) -> HistoryRegister {
        let mut ghr = HistoryRegister::new(bits.len());
        for b in bits {
            ghr.push(*b);
        }
        ghr
    }

    #[test]
    fn default_params() {
        let p = PerceptronParams::new(4);
        assert_eq!(p.threshold, 22);
        assert_eq!(p.max_weight, 7);
        assert_eq!(p.min_weight, -8);
        assert_eq!(p.weight_bits(), 4);

        let p = PerceptronParams::new(2);
        assert_eq!(p.threshold, 18);
        assert_eq!((p.min_weight, p.max_weight), (-2, 1));

        let p = PerceptronParams::new(64);
        assert_eq!(p.max_weight, i32::MAX);
        assert_eq!(p.min_weight, i32::MIN);
        assert_eq!(p.weight_bits(), 32);
    }

    #[test]
    fn output_is_signed_sum() {
        let mut p = PerceptronParams::new(3).build();
        p.weights = vec![2, -1, 3];
        p.bias = -1;
        // -1 - 2 + (-1) + 3
        assert_eq!(p.output(&ghr_from(&[N, T, T])), -1);
        // -1 + 2 + 1 - 3
        assert_eq!(p.output(&ghr_from(&[T, N, N])), -1);
        assert_eq!(p.output(&ghr_from(&[T, T, T])), 3);
    }

    #[test]
    fn confident_correct_output_skips_training() {
        let mut p = PerceptronParams { threshold: 2, ..PerceptronParams::new(3) }
            .build();
        p.weights = vec![1, 1, 1];
        let ghr = ghr_from(&[T, T, T]);
        let out = p.output(&ghr);
        assert_eq!(out, 4);
        assert!(!p.train(&ghr, out, T));
        assert_eq!(p.weights(), &[1, 1, 1]);

        // Same output, but wrong
        assert!(p.train(&ghr, out, N));
        assert_eq!(p.weights(), &[0, 0, 0]);
        assert_eq!(p.bias(), 0);
    }

    #[test]
    fn training_saturates_at_bounds() {
        let mut p = PerceptronParams::new(2).build();
        let ghr = ghr_from(&[T, N]);
        for _ in 0..10 {
            let out = p.output(&ghr);
            p.train(&ghr, out, T);
        }
        assert_eq!(p.weights(), &[1, -2]);
        assert_eq!(p.bias(), 1);

        p.reset();
        assert_eq!(p.weights(), &[0, 0]);
        assert_eq!(p.bias(), 1);
    }
}
