//! Implementation of a "perceptron forest": a committee of small perceptrons
//! which each observe a different window of global history.

use rand::Rng;
use rand_distr::{ Distribution, Geometric };
use std::ops::Range;

use crate::Outcome;
use crate::error::ConfigError;
use crate::history::*;
use crate::predictor::*;

/// Upper bound on the trust placed in a single member.
pub const MAX_TRUST: i32 = 10;

/// Success probability for the distribution of window offsets.
/// Most windows end at [or very near] the newest outcome.
const OFFSET_P: f64 = 0.3;

/// Parameters for building a [`PerceptronForest`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ForestParams {
    /// Length of the global history observed by the whole forest
    pub history_len: usize,
    /// Number of member perceptrons
    pub members: usize,
    /// Average length of the history window given to each member
    pub avg_window_len: usize,
    /// Smallest value of any member weight or bias
    pub min_weight: i32,
    /// Largest value of any member weight or bias
    pub max_weight: i32,
}
impl ForestParams {
    /// Use these parameters to create a new [`PerceptronForest`], drawing
    /// member windows from 'rng'.
    pub fn build<R: Rng + ?Sized>(self, rng: &mut R)
        -> Result<PerceptronForest, ConfigError>
    {
        if self.history_len == 0 {
            return Err(ConfigError::HistorySize);
        }
        if self.members == 0 {
            return Err(ConfigError::EnsembleMembers);
        }
        if self.avg_window_len == 0 {
            return Err(ConfigError::EnsembleWindowLength);
        }
        let len_p = 1.0 / (self.avg_window_len as f64 + 1.0);
        let offset_dist = Geometric::new(OFFSET_P)
            .map_err(|_| ConfigError::EnsembleWindowLength)?;
        let len_dist = Geometric::new(len_p)
            .map_err(|_| ConfigError::EnsembleWindowLength)?;

        let mut members = Vec::with_capacity(self.members);
        for _ in 0..self.members {
            let window = self.random_window(rng, &offset_dist, &len_dist);
            let len = window.len();
            let perceptron = PerceptronParams {
                len,
                min_weight: self.min_weight,
                max_weight: self.max_weight,
                threshold: PerceptronParams::default_threshold(len),
            }.build();
            log::trace!("forest member window {:?} (threshold {})",
                window, perceptron.threshold());
            members.push(ForestMember { window, perceptron, trust: 1 });
        }
        Ok(PerceptronForest { params: self, members })
    }

    /// Pick a window of history which ends near the newest outcome.
    /// Shorter windows are more likely than longer ones.
    fn random_window<R: Rng + ?Sized>(&self,
        rng: &mut R,
        offset_dist: &Geometric,
        len_dist: &Geometric,
    ) -> Range<usize>
    {
        let max_offset = (self.history_len / 2) as u64;
        let offset = offset_dist.sample(rng).min(max_offset) as usize;
        let end = self.history_len - offset;
        let len = len_dist.sample(rng).saturating_add(1).min(end as u64);
        (end - len as usize)..end
    }

    /// Get the [approximate] number of storage bits.
    pub fn storage_bits(&self) -> usize {
        let weight_bits = PerceptronParams {
            len: self.avg_window_len,
            min_weight: self.min_weight,
            max_weight: self.max_weight,
            threshold: 0,
        }.weight_bits();
        let trust_bits = (MAX_TRUST as u32).ilog2() as usize + 1;
        self.members * ((self.avg_window_len + 1) * weight_bits + trust_bits)
    }
}

/// A single perceptron in a [`PerceptronForest`].
#[derive(Clone, Debug)]
pub struct ForestMember {
    /// Logical positions in global history observed by this member
    pub window: Range<usize>,
    pub perceptron: Perceptron,
    /// How much this member's vote counts, in `0..=MAX_TRUST`
    pub trust: i32,
}
impl ForestMember {
    fn increase_trust(&mut self) {
        self.trust = (self.trust + 1).min(MAX_TRUST);
    }
    fn decrease_trust(&mut self) {
        self.trust = (self.trust - 1).max(0);
    }
}

/// Output from [`PerceptronForest::output`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForestOutput {
    /// Sum of all trust-weighted votes
    pub score: i64,
    /// Output of each member
    pub votes: Vec<i64>,
}
impl ForestOutput {
    pub fn outcome(&self) -> Outcome {
        Outcome::from_score(self.score)
    }
}

/// A set of perceptrons, each bound to a random window of global history.
/// Members vote on the outcome, and the trust placed in each vote follows
/// how often that member has been right.
#[derive(Clone, Debug)]
pub struct PerceptronForest {
    pub params: ForestParams,
    pub members: Vec<ForestMember>,
}
impl PerceptronForest {
    pub fn members(&self) -> &[ForestMember] { &self.members }

    /// Trust placed in each member.
    pub fn trust(&self) -> impl Iterator<Item = i32> + '_ {
        self.members.iter().map(|m| m.trust)
    }

    /// Compute the output of each member on its own window of 'ghr' and
    /// combine them into a single score.
    pub fn output(&self, ghr: &HistoryRegister) -> ForestOutput {
        assert_eq!(ghr.len(), self.params.history_len);
        let mut score = 0;
        let mut votes = Vec::with_capacity(self.members.len());
        for member in self.members.iter() {
            let out = member.perceptron.output(&ghr.window(member.window.clone()));
            let trust = member.trust as i64;
            score += if out >= 0 { trust } else { -trust };
            votes.push(out);
        }
        ForestOutput { score, votes }
    }

    /// Adjust trust and train every member, using the history that 'votes'
    /// were computed from.
    pub fn train(&mut self, ghr: &HistoryRegister, votes: &[i64], outcome: Outcome)
        -> bool
    {
        assert_eq!(votes.len(), self.members.len());
        let mut trained = false;
        for (member, vote) in self.members.iter_mut().zip(votes) {
            if Outcome::from_score(*vote) == outcome {
                member.increase_trust();
            } else {
                member.decrease_trust();
            }
            let window = ghr.window(member.window.clone());
            trained |= member.perceptron.train(&window, *vote, outcome);
        }
        trained
    }

    /// Reset all members [windows are kept].
    pub fn reset(&mut self) {
        for member in self.members.iter_mut() {
            member.perceptron.reset();
            member.trust = 1;
        }
    }
}

impl HistoryModel for PerceptronForest {
    type Output = ForestOutput;

    fn name(&self) -> &'static str { "PerceptronForest" }

    fn forward(&self, ghr: &HistoryRegister) -> ForestOutput {
        self.output(ghr)
    }

    fn score(output: &ForestOutput) -> i64 { output.score }

    fn train(&mut self, ghr: &HistoryRegister, output: &ForestOutput,
        outcome: Outcome) -> bool
    {
        PerceptronForest::train(self, ghr, &output.votes, outcome)
    }

    fn reset(&mut self) {
        PerceptronForest::reset(self)
    }
}
