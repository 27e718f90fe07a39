
/// Container for [`crate::SpeculativePredictor`] runtime stats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PredictorStats {
    /// Number of predictions made
    pub predictions: usize,

    /// Number of sessions resolved with the correct outcome
    pub commits: usize,

    /// Number of commits that actually adjusted a model
    pub trained: usize,

    /// Number of commits where the prediction was wrong
    pub commit_miss: usize,

    /// Number of sessions squashed with a corrected outcome
    pub squashes: usize,

    /// Number of times history was repaired for a live session
    pub repairs: usize,

    /// Number of wrong-path sessions thrown away
    pub discards: usize,

    /// Number of unconditional branches pushed onto history
    pub unconditional: usize,
}
impl PredictorStats {
    pub fn new() -> Self { Self::default() }

    /// Number of predictions that haven't been resolved.
    pub fn outstanding(&self) -> usize {
        let resolved = self.commits + self.squashes + self.discards;
        self.predictions.saturating_sub(resolved)
    }

    /// Fraction of committed predictions that were correct, or zero when
    /// nothing has been committed.
    pub fn hit_rate(&self) -> f64 {
        if self.commits == 0 {
            return 0.0;
        }
        (self.commits - self.commit_miss) as f64 / self.commits as f64
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_stats() {
        let stat = PredictorStats::new();
        assert_eq!(stat.outstanding(), 0);
        assert_eq!(stat.hit_rate(), 0.0);
    }

    #[test]
    fn rates() {
        let stat = PredictorStats {
            predictions: 10,
            commits: 4,
            commit_miss: 1,
            squashes: 2,
            discards: 1,
            ..PredictorStats::new()
        };
        assert_eq!(stat.outstanding(), 3);
        assert_eq!(stat.hit_rate(), 0.75);
        let stat = PredictorStats { predictions: 1, commits: 2, ..stat };
        assert_eq!(stat.outstanding(), 0);
    }
}
