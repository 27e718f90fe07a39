//! State carried between making a prediction and resolving it.

use crate::Outcome;
use crate::history::*;

/// Identifies a hardware context (a thread) with its own global history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextId(pub usize);

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for ContextId {
    fn from(x: usize) -> Self { Self(x) }
}

/// An in-flight prediction.
///
/// Returned by [`crate::SpeculativePredictor::predict`] and consumed by
/// exactly one of `commit`, `squash` or `discard`. Sessions can't be cloned,
/// so a prediction can't be resolved twice.
#[must_use = "every prediction must be committed, squashed or discarded"]
#[derive(Debug, PartialEq, Eq)]
pub struct PredictionSession<O> {
    /// Context that made the prediction
    pub(crate) ctx: ContextId,

    /// Program counter of the predicted branch
    pub(crate) pc: usize,

    /// Index of the table entry used to make the prediction
    pub(crate) idx: usize,

    /// The predicted direction
    pub(crate) outcome: Outcome,

    /// Generation of the predictor that made this session
    pub(crate) generation: u64,

    /// Global history just before the prediction was pushed
    pub(crate) ghr: HistoryRegister,

    /// Raw output from the model
    pub(crate) output: O,
}
impl<O> PredictionSession<O> {
    pub fn context(&self) -> ContextId { self.ctx }
    pub fn pc(&self) -> usize { self.pc }
    pub fn index(&self) -> usize { self.idx }
    pub fn outcome(&self) -> Outcome { self.outcome }
    pub fn history(&self) -> &HistoryRegister { &self.ghr }
    pub fn output(&self) -> &O { &self.output }
}
