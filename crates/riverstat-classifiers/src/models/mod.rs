pub mod classifier_trait;
pub mod factory;
pub mod forest;
pub mod gbdt;
pub mod logistic;

pub use classifier_trait::ClassifierModel;
pub use factory::{build_model, fit_members, Member};
