//! Interpretability figures for interval forest and dictionary time series
//! classifiers.
//!
//! Reads the text dumps a trained forest writes for one prediction (or for
//! its temporal importance curves), ranks attributes by how often the
//! agreeing trees used them, picks a representative interval per attribute
//! and renders the result with plotters. Dictionary classifier dumps are
//! drawn as per-class word histograms and the SFA transform of one window.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod data;
pub mod dictionary;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod plotting;
pub mod verify;

pub use analysis::{select, AttributeCounts, Selection, TargetWindow};
pub use config::{ImageFormat, VisConfig};
pub use data::{Comparison, DecisionNode, ImportanceCurves, PredictionDump};
pub use dictionary::DictionaryDump;
pub use error::{Result, VisError};
