//! Configuration for building a [`SpeculativePredictor`].

use rand::{ Rng, SeedableRng };
use rand::rngs::StdRng;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::predictor::*;

/// Configuration for the "forest" variant of a predictor.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnsembleConfig {
    /// Number of perceptrons in each forest
    pub member_count: usize,

    /// Average length of the history window given to each perceptron
    pub average_window_length: usize,

    /// Seed used to generate windows. When absent, windows are generated
    /// from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Configuration for a [`SpeculativePredictor`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PredictorConfig {
    /// Number of bits of global history
    pub history_size: usize,

    /// Number of entries in each table [must be a power of two]
    pub table_size: usize,

    /// Smallest weight (derived from the history size when absent)
    #[serde(default)]
    pub min_weight: Option<i32>,

    /// Largest weight (derived from the history size when absent)
    #[serde(default)]
    pub max_weight: Option<i32>,

    /// Training threshold (derived from the history size when absent)
    #[serde(default)]
    pub threshold: Option<i32>,

    /// When present, each table entry is a [`PerceptronForest`] instead of a
    /// single [`Perceptron`]
    #[serde(default)]
    pub ensemble: Option<EnsembleConfig>,

    /// Number of low program counter bits discarded when indexing a table
    #[serde(default = "PredictorConfig::default_addr_shift")]
    pub addr_shift: u32,

    /// Number of hardware contexts
    #[serde(default = "PredictorConfig::default_num_threads")]
    pub num_threads: usize,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            history_size: 32,
            table_size: 1 << 10,
            min_weight: None,
            max_weight: None,
            threshold: None,
            ensemble: None,
            addr_shift: Self::default_addr_shift(),
            num_threads: Self::default_num_threads(),
        }
    }
}

impl PredictorConfig {
    fn default_addr_shift() -> u32 { 2 }
    fn default_num_threads() -> usize { 1 }

    /// A configuration with a single perceptron per table entry.
    pub fn new(history_size: usize, table_size: usize) -> Self {
        Self { history_size, table_size, ..Self::default() }
    }

    /// Parse a configuration from TOML.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Resolve the parameters shared by every perceptron in a table,
    /// checking that they make sense.
    pub fn perceptron_params(&self) -> Result<PerceptronParams, ConfigError> {
        if self.history_size == 0 {
            return Err(ConfigError::HistorySize);
        }
        let derived = PerceptronParams::new(self.history_size);
        let max_weight = self.max_weight.unwrap_or(derived.max_weight);
        let min_weight = self.min_weight
            .unwrap_or(PerceptronParams::default_min_weight(max_weight));
        if min_weight > max_weight {
            return Err(ConfigError::WeightRange { min: min_weight, max: max_weight });
        }
        let threshold = self.threshold.unwrap_or(derived.threshold);
        if threshold < 0 {
            return Err(ConfigError::Threshold { threshold });
        }
        Ok(PerceptronParams {
            len: self.history_size,
            min_weight,
            max_weight,
            threshold,
        })
    }

    /// Resolve the parameters for each forest, if this configuration uses
    /// them.
    pub fn forest_params(&self) -> Result<Option<ForestParams>, ConfigError> {
        let Some(ensemble) = &self.ensemble else {
            return Ok(None);
        };
        let p = self.perceptron_params()?;
        Ok(Some(ForestParams {
            history_len: self.history_size,
            members: ensemble.member_count,
            avg_window_len: ensemble.average_window_length,
            min_weight: p.min_weight,
            max_weight: p.max_weight,
        }))
    }

    /// Get the [approximate] number of storage bits for all contexts.
    pub fn storage_bits(&self) -> Result<usize, ConfigError> {
        let entry_bits = match self.forest_params()? {
            Some(f) => f.storage_bits(),
            None => self.perceptron_params()?.storage_bits(),
        };
        Ok(entry_bits * self.table_size * self.num_threads)
    }

    /// Use this configuration to create a new [`SpeculativePredictor`].
    ///
    /// Forest windows are generated from the configured seed, or from
    /// entropy when no seed is given.
    pub fn build(self) -> Result<SpeculativePredictor<DirectionModel>, ConfigError> {
        let seed = self.ensemble.as_ref().and_then(|e| e.seed);
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.build_with_rng(&mut rng)
    }

    /// Use this configuration to create a new [`SpeculativePredictor`],
    /// drawing forest windows from 'rng'.
    pub fn build_with_rng<R: Rng + ?Sized>(self, rng: &mut R)
        -> Result<SpeculativePredictor<DirectionModel>, ConfigError>
    {
        let perceptron = self.perceptron_params()?;
        let forest = self.forest_params()?;
        log::debug!("building predictor: {:?}, forest: {:?}", perceptron, forest);

        SpeculativePredictor::build_with(&self, || match forest {
            Some(f) => Ok(DirectionModel::Forest(f.build(&mut *rng)?)),
            None => Ok(DirectionModel::Perceptron(perceptron.build())),
        })
    }
}
