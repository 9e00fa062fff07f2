//! Hyper-parameter search: a seeded TPE sampler and the study loop around it.
pub mod study;
pub mod tpe;
pub mod types;

pub use study::Study;
pub use tpe::TpeSampler;
pub use types::{ParameterDomain, ParameterSet, ParameterValue, SearchSpace, Trial, TrialStatus};
