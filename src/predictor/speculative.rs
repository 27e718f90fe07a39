//! A predictor which tolerates speculation: predictions are pushed onto
//! global history immediately, and history is repaired when a prediction
//! turns out to be on the wrong path.

use std::collections::BTreeMap;
use std::sync::atomic::{ AtomicU64, Ordering };

use crate::Outcome;
use crate::error::{ ConfigError, PredictorError };
use crate::history::*;
use crate::predictor::*;

/// Source of generation numbers. Every predictor (and every reset of a
/// predictor) gets a new one, so sessions can't outlive the state they were
/// made from.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(0);

fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// State owned by a single hardware context.
#[derive(Clone, Debug)]
pub struct Context<M> {
    /// Speculative global history
    pub ghr: HistoryRegister,

    /// Models indexed by program counter
    pub table: PerceptronTable<M>,
}

/// A direction predictor built from some [`HistoryModel`], with separate
/// global history and tables for each hardware context.
///
/// Every conditional branch goes through the following steps:
///
/// 1. [`SpeculativePredictor::predict`] computes a prediction from global
///    history, pushes the *predicted* outcome onto history, and returns a
///    [`PredictionSession`] containing the history it used.
/// 2. Eventually, the session is consumed by one of:
///    - [`SpeculativePredictor::commit`] when the branch retires, which
///      trains the model with the history saved in the session,
///    - [`SpeculativePredictor::squash`] when the branch was mispredicted,
///      which rewinds history and pushes the correct outcome instead,
///    - [`SpeculativePredictor::discard`] when the branch itself was on a
///      wrong path, which only rewinds history.
///
/// A mispredicted branch that still retires can have history corrected
/// early with [`SpeculativePredictor::repair`] and then be committed.
///
/// Any number of sessions may be in flight at once. Rewinding them in the
/// right order (youngest first) is up to the caller. Sessions made before a
/// [`SpeculativePredictor::reset`], or by a different predictor, are ignored.
pub struct SpeculativePredictor<M: HistoryModel> {
    /// The configuration used to create this object
    pub cfg: PredictorConfig,

    pub stat: PredictorStats,

    contexts: BTreeMap<ContextId, Context<M>>,

    /// Generation stamped onto every session
    generation: u64,
}

impl<M: HistoryModel> SpeculativePredictor<M> {
    /// Create a predictor for the contexts and tables described by 'cfg',
    /// where every table entry is created with 'f'.
    pub fn build_with<F>(cfg: &PredictorConfig, mut f: F)
        -> Result<Self, ConfigError>
        where F: FnMut() -> Result<M, ConfigError>
    {
        if cfg.history_size == 0 {
            return Err(ConfigError::HistorySize);
        }
        if cfg.num_threads == 0 {
            return Err(ConfigError::NumThreads);
        }

        let mut contexts = BTreeMap::new();
        for tid in 0..cfg.num_threads {
            let table = PerceptronTable::build_with(
                cfg.table_size, cfg.addr_shift, &mut f
            )?;
            let ghr = HistoryRegister::new(cfg.history_size);
            contexts.insert(ContextId(tid), Context { ghr, table });
        }
        log::debug!("created {} context(s) with {} entries each",
            cfg.num_threads, cfg.table_size);

        Ok(Self {
            cfg: cfg.clone(),
            stat: PredictorStats::new(),
            contexts,
            generation: next_generation(),
        })
    }

    /// Returns a reference to the state of some context.
    pub fn context(&self, ctx: ContextId) -> Option<&Context<M>> {
        self.contexts.get(&ctx)
    }

    fn context_mut(&mut self, ctx: ContextId)
        -> Result<&mut Context<M>, PredictorError>
    {
        self.contexts.get_mut(&ctx).ok_or(PredictorError::UnknownContext(ctx))
    }

    /// Returns the global history of some context.
    pub fn history(&self, ctx: ContextId) -> Option<&HistoryRegister> {
        self.context(ctx).map(|c| &c.ghr)
    }

    /// Returns the model used to predict the branch at 'pc'.
    pub fn model(&self, ctx: ContextId, pc: usize) -> Option<&M> {
        self.context(ctx).map(|c| c.table.get_entry(c.table.get_index(pc)))
    }

    /// Predict the direction of the conditional branch at 'pc'.
    ///
    /// The predicted outcome is pushed onto global history before returning.
    pub fn predict(&mut self, ctx: ContextId, pc: usize)
        -> Result<(Outcome, PredictionSession<M::Output>), PredictorError>
    {
        let generation = self.generation;
        let c = self.context_mut(ctx)?;
        let idx = c.table.get_index(pc);
        let output = c.table.get_entry(idx).forward(&c.ghr);
        let outcome = M::predict(&output);
        let session = PredictionSession {
            ctx, pc, idx, outcome,
            generation,
            ghr: c.ghr.snapshot(),
            output,
        };
        c.ghr.push(outcome);

        self.stat.predictions += 1;
        Ok((outcome, session))
    }

    /// Return the score that would be used to predict the branch at 'pc',
    /// without changing any state.
    pub fn confidence(&self, ctx: ContextId, pc: usize)
        -> Result<i64, PredictorError>
    {
        let c = self.context(ctx).ok_or(PredictorError::UnknownContext(ctx))?;
        let output = c.table.get_entry(c.table.get_index(pc)).forward(&c.ghr);
        Ok(M::score(&output))
    }

    /// Record an unconditional branch at 'pc'. The model isn't consulted or
    /// trained, but the outcome still goes into global history.
    pub fn unconditional(&mut self, ctx: ContextId, pc: usize, outcome: Outcome)
        -> Result<(), PredictorError>
    {
        let c = self.context_mut(ctx)?;
        c.ghr.push(outcome);
        log::trace!("ctx {} pc {:016x}: unconditional {:?}", ctx, pc, outcome);
        self.stat.unconditional += 1;
        Ok(())
    }

    /// Look up the context that produced some session.
    fn session_context(&mut self, session: &PredictionSession<M::Output>)
        -> Option<&mut Context<M>>
    {
        if session.generation != self.generation {
            log::warn!("ignoring stale session (ctx {} pc {:016x})",
                session.ctx, session.pc);
            return None;
        }
        let res = self.contexts.get_mut(&session.ctx);
        if res.is_none() {
            log::warn!("ignoring session from unknown context {}", session.ctx);
        }
        res
    }

    /// Resolve a prediction with the correct outcome, training the model
    /// with the history that the prediction was made from.
    /// Global history is not changed.
    pub fn commit(&mut self,
        session: Option<PredictionSession<M::Output>>,
        outcome: Outcome,
    )
    {
        let Some(session) = session else { return; };
        let Some(c) = self.session_context(&session) else { return; };

        let model = c.table.get_entry_mut(session.idx);
        let trained = model.train(&session.ghr, &session.output, outcome);

        self.stat.commits += 1;
        if trained { self.stat.trained += 1; }
        if session.outcome != outcome { self.stat.commit_miss += 1; }
    }

    /// Resolve a mispredicted branch: global history is rewound to the
    /// state before the prediction, and the correct outcome is pushed in
    /// place of the predicted one. The model is not trained.
    pub fn squash(&mut self,
        session: Option<PredictionSession<M::Output>>,
        outcome: Outcome,
    )
    {
        let Some(session) = session else { return; };
        let Some(c) = self.session_context(&session) else { return; };

        c.ghr.restore(&session.ghr);
        c.ghr.push(outcome);
        log::trace!("ctx {} pc {:016x}: squash {:?} -> {:?}",
            session.ctx, session.pc, session.outcome, outcome);
        self.stat.squashes += 1;
    }

    /// Correct global history for a mispredicted branch that will still
    /// retire: history is rewound to the state before the prediction and the
    /// correct outcome is pushed. The session stays alive, and the model is
    /// trained when it's committed.
    pub fn repair(&mut self,
        session: &PredictionSession<M::Output>,
        outcome: Outcome,
    )
    {
        let Some(c) = self.session_context(session) else { return; };

        c.ghr.restore(&session.ghr);
        c.ghr.push(outcome);
        log::trace!("ctx {} pc {:016x}: repair {:?} -> {:?}",
            session.ctx, session.pc, session.outcome, outcome);
        self.stat.repairs += 1;
    }

    /// Throw away a prediction made on a wrong path: global history is
    /// rewound to the state before the prediction. The model is not trained.
    pub fn discard(&mut self, session: Option<PredictionSession<M::Output>>) {
        let Some(session) = session else { return; };
        let Some(c) = self.session_context(&session) else { return; };

        c.ghr.restore(&session.ghr);
        log::trace!("ctx {} pc {:016x}: discard", session.ctx, session.pc);
        self.stat.discards += 1;
    }

    /// Reset all models, history, and statistics. Sessions that are still in
    /// flight become stale, and resolving them has no effect.
    pub fn reset(&mut self) {
        self.generation = next_generation();
        for c in self.contexts.values_mut() {
            c.ghr = HistoryRegister::new(self.cfg.history_size);
            c.table.iter_mut().for_each(|m| m.reset());
        }
        self.stat = PredictorStats::new();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use Outcome::*;

    const CTX: ContextId = ContextId(0);

    fn perceptron_bp(history_size: usize, table_size: usize)
        -> SpeculativePredictor<DirectionModel>
    {
        PredictorConfig::new(history_size, table_size).build().unwrap()
    }

    fn weights(bp: &SpeculativePredictor<DirectionModel>, pc: usize)
        -> (Vec<i32>, i32)
    {
        match bp.model(CTX, pc) {
            Some(DirectionModel::Perceptron(p)) => (p.weights().to_vec(), p.bias()),
            _ => panic!("expected a perceptron"),
        }
    }

    #[test]
    fn concrete_trace() {
        let mut bp = perceptron_bp(2, 2);
        let pc = 0x4000;
        assert_eq!(weights(&bp, pc), (vec![0, 0], 1));

        let mut predictions = Vec::new();
        for outcome in [T, T, N] {
            let (p, session) = bp.predict(CTX, pc).unwrap();
            predictions.push(p);
            bp.commit(Some(session), outcome);
        }
        assert_eq!(predictions, vec![T, T, N]);
        assert_eq!(weights(&bp, pc), (vec![-2, -1], 0));
        assert_eq!(bp.stat.commits, 3);
        assert_eq!(bp.stat.trained, 3);
        assert_eq!(bp.stat.commit_miss, 0);
    }

    #[test]
    fn predict_pushes_prediction() {
        let mut bp = perceptron_bp(4, 16);
        let (p, session) = bp.predict(CTX, 0x100).unwrap();
        assert_eq!(p, T);
        assert_eq!(session.history().to_string(), "0000");
        assert_eq!(bp.history(CTX).unwrap().to_string(), "0001");
        assert_eq!(bp.stat.outstanding(), 1);
        bp.commit(Some(session), T);
        assert_eq!(bp.stat.outstanding(), 0);
        // Committing doesn't touch history
        assert_eq!(bp.history(CTX).unwrap().to_string(), "0001");
    }

    #[test]
    fn squash_replaces_speculative_outcome() {
        let mut bp = perceptron_bp(4, 16);
        let (_, s0) = bp.predict(CTX, 0x100).unwrap();
        let (_, s1) = bp.predict(CTX, 0x104).unwrap();
        let (_, s2) = bp.predict(CTX, 0x108).unwrap();
        assert_eq!(bp.history(CTX).unwrap().to_string(), "0111");

        // The second branch was mispredicted: the third was on a wrong path
        bp.discard(Some(s2));
        bp.squash(Some(s1), N);
        assert_eq!(bp.history(CTX).unwrap().to_string(), "0010");
        let before = weights(&bp, 0x104);
        bp.commit(Some(s0), T);
        // Squashing doesn't train
        assert_eq!(weights(&bp, 0x104), before);
        assert_eq!(bp.stat.squashes, 1);
        assert_eq!(bp.stat.discards, 1);
    }

    #[test]
    fn repair_then_commit_trains() {
        let mut bp = perceptron_bp(4, 16);
        let (p, s) = bp.predict(CTX, 0x100).unwrap();
        assert_eq!(p, T);
        bp.repair(&s, N);
        assert_eq!(bp.history(CTX).unwrap().to_string(), "0000");
        bp.commit(Some(s), N);
        assert_eq!(weights(&bp, 0x100), (vec![1, 1, 1, 1], 0));
        assert_eq!(bp.stat.repairs, 1);
        assert_eq!(bp.stat.commit_miss, 1);
    }

    #[test]
    fn alternating_pattern_converges() {
        for first in [T, N] {
            let mut bp = perceptron_bp(4, 16);
            let mut outcome = first;
            let mut last_miss = None;
            for i in 0..100 {
                let (p, s) = bp.predict(CTX, 0x100).unwrap();
                if p != outcome {
                    last_miss = Some(i);
                    bp.repair(&s, outcome);
                }
                bp.commit(Some(s), outcome);
                outcome = !outcome;
            }
            assert!(last_miss.map_or(true, |i| i < 20), "{:?}", last_miss);
        }
    }

    #[test]
    fn missing_sessions_are_ignored() {
        let mut bp = perceptron_bp(4, 16);
        bp.unconditional(CTX, 0x200, T).unwrap();
        let ghr = bp.history(CTX).unwrap().clone();
        bp.commit(None, T);
        bp.squash(None, N);
        bp.discard(None);
        assert_eq!(bp.history(CTX).unwrap(), &ghr);
        assert_eq!(bp.stat.commits + bp.stat.squashes + bp.stat.discards, 0);
    }

    #[test]
    fn unconditional_only_pushes_history() {
        let mut bp = perceptron_bp(4, 16);
        let before = weights(&bp, 0x200);
        bp.unconditional(CTX, 0x200, T).unwrap();
        bp.unconditional(CTX, 0x200, T).unwrap();
        assert_eq!(bp.history(CTX).unwrap().to_string(), "0011");
        assert_eq!(weights(&bp, 0x200), before);
        assert_eq!(bp.stat.predictions, 0);
    }

    #[test]
    fn unknown_context() {
        let mut bp = perceptron_bp(4, 16);
        let ctx = ContextId(1);
        assert_eq!(bp.predict(ctx, 0).err(), Some(PredictorError::UnknownContext(ctx)));
        assert_eq!(bp.confidence(ctx, 0), Err(PredictorError::UnknownContext(ctx)));
        assert_eq!(bp.unconditional(ctx, 0, T), Err(PredictorError::UnknownContext(ctx)));
    }

    #[test]
    fn contexts_are_independent() {
        let cfg = PredictorConfig { num_threads: 2, ..PredictorConfig::new(4, 16) };
        let mut bp = cfg.build().unwrap();
        for _ in 0..8 {
            let (_, s) = bp.predict(ContextId(1), 0x100).unwrap();
            bp.squash(Some(s), N);
        }
        assert_eq!(bp.history(ContextId(0)).unwrap().to_string(), "0000");
        assert_eq!(bp.history(ContextId(1)).unwrap().to_string(), "0000");
        let (_, s) = bp.predict(ContextId(1), 0x100).unwrap();
        bp.commit(Some(s), N);
        assert_eq!(bp.confidence(ContextId(0), 0x100), Ok(1));
        assert_ne!(bp.confidence(ContextId(1), 0x100), Ok(1));
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut bp = perceptron_bp(4, 16);
        for outcome in [T, N, N, T] {
            let (_, s) = bp.predict(CTX, 0x100).unwrap();
            bp.commit(Some(s), outcome);
        }
        bp.reset();
        assert_eq!(weights(&bp, 0x100), (vec![0; 4], 1));
        assert_eq!(bp.history(CTX).unwrap().to_string(), "0000");
        assert_eq!(bp.stat, PredictorStats::new());
    }

    #[test]
    fn sessions_from_before_reset_are_ignored() {
        let mut bp = perceptron_bp(4, 16);
        let (_, s0) = bp.predict(CTX, 0x100).unwrap();
        let (_, s1) = bp.predict(CTX, 0x104).unwrap();
        let (_, s2) = bp.predict(CTX, 0x108).unwrap();
        bp.reset();
        bp.unconditional(CTX, 0x200, T).unwrap();

        bp.commit(Some(s0), N);
        bp.squash(Some(s2), N);
        bp.repair(&s1, N);
        bp.discard(Some(s1));
        assert_eq!(bp.stat.outstanding(), 0);
        assert_eq!(bp.stat.commits + bp.stat.squashes + bp.stat.discards, 0);
        assert_eq!(bp.stat.repairs, 0);
        assert_eq!(weights(&bp, 0x100), (vec![0; 4], 1));
        assert_eq!(bp.history(CTX).unwrap().to_string(), "0001");
    }

    #[test]
    fn sessions_from_another_predictor_are_ignored() {
        let mut a = perceptron_bp(4, 16);
        let mut b = perceptron_bp(8, 16);
        let (_, s) = a.predict(CTX, 0x100).unwrap();
        b.unconditional(CTX, 0x200, T).unwrap();
        b.repair(&s, N);
        b.squash(Some(s), N);
        assert_eq!(b.history(CTX).unwrap().to_string(), "00000001");
        assert_eq!(b.stat.squashes + b.stat.repairs, 0);

        let cfg = PredictorConfig {
            ensemble: Some(EnsembleConfig {
                member_count: 2, average_window_length: 2, seed: Some(1),
            }),
            ..PredictorConfig::new(4, 16)
        };
        let mut forest = cfg.build().unwrap();
        let (_, s) = forest.predict(CTX, 0x100).unwrap();
        a.commit(Some(s), N);
        assert_eq!(weights(&a, 0x100), (vec![0; 4], 1));
        assert_eq!(a.stat.commits, 0);
    }
}
