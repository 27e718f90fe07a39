//! Implementations of perceptron-based direction predictors.

pub mod table;
pub mod perceptron;
pub mod forest;
pub mod config;
pub mod session;
pub mod speculative;
pub mod stat;

pub use table::*;
pub use perceptron::*;
pub use forest::*;
pub use config::*;
pub use session::*;
pub use speculative::*;
pub use stat::*;

use crate::history::*;
use crate::Outcome;

/// Interface to a model that predicts a direction from global history.
///
/// Predicting and training are split in two: [`HistoryModel::forward`]
/// returns raw output which the caller holds onto until the outcome is
/// known, and [`HistoryModel::train`] consumes that same output together
/// with the history it was computed from.
pub trait HistoryModel {
    /// Raw output from a forward pass.
    type Output: Clone + std::fmt::Debug;

    fn name(&self) -> &'static str;

    /// Compute output for some history.
    fn forward(&self, ghr: &HistoryRegister) -> Self::Output;

    /// The signed score contained in some output.
    fn score(output: &Self::Output) -> i64;

    /// The outcome predicted by some output.
    fn predict(output: &Self::Output) -> Outcome {
        Outcome::from_score(Self::score(output))
    }

    /// Given the history and output from an earlier forward pass, update the
    /// model with the correct outcome. Returns 'true' if the model changed.
    fn train(&mut self, ghr: &HistoryRegister, output: &Self::Output,
        outcome: Outcome) -> bool;

    /// Reset the learned state of the model.
    fn reset(&mut self);
}

/// A model selected at runtime by a [`PredictorConfig`].
#[derive(Clone, Debug)]
pub enum DirectionModel {
    Perceptron(Perceptron),
    Forest(PerceptronForest),
}

/// Output from a [`DirectionModel`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelOutput {
    Perceptron(i64),
    Forest(ForestOutput),
}

impl HistoryModel for DirectionModel {
    type Output = ModelOutput;

    fn name(&self) -> &'static str {
        match self {
            Self::Perceptron(p) => p.name(),
            Self::Forest(f) => f.name(),
        }
    }

    fn forward(&self, ghr: &HistoryRegister) -> ModelOutput {
        match self {
            Self::Perceptron(p) => ModelOutput::Perceptron(p.output(ghr)),
            Self::Forest(f) => ModelOutput::Forest(f.output(ghr)),
        }
    }

    fn score(output: &ModelOutput) -> i64 {
        match output {
            ModelOutput::Perceptron(score) => *score,
            ModelOutput::Forest(out) => out.score,
        }
    }

    fn train(&mut self, ghr: &HistoryRegister, output: &ModelOutput,
        outcome: Outcome) -> bool
    {
        match (self, output) {
            (Self::Perceptron(p), ModelOutput::Perceptron(score)) => {
                p.train(ghr, *score, outcome)
            },
            (Self::Forest(f), ModelOutput::Forest(out)) => {
                f.train(ghr, &out.votes, outcome)
            },
            _ => unreachable!("output doesn't belong to this kind of model"),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::Perceptron(p) => p.reset(),
            Self::Forest(f) => f.reset(),
        }
    }
}
