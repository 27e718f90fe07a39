#![allow(unused_parens)]

//! Speculative perceptron and perceptron-forest branch direction predictors.

pub mod branch;
pub mod error;
pub mod history;
pub mod predictor;
pub mod stats;
pub mod trace;

pub use branch::*;
pub use error::*;
pub use history::*;
pub use predictor::*;
pub use trace::*;
