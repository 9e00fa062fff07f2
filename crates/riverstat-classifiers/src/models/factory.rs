use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::config::{MemberKind, MemberParams};
use crate::data_handling::derive_seed;
use crate::error::Result;
use crate::models::classifier_trait::ClassifierModel;
use crate::models::forest::RandomForestClassifier;
use crate::models::gbdt::GBDTClassifier;
use crate::models::logistic::LogisticClassifier;

/// A concrete ensemble member. An enum rather than a boxed trait object so
/// fitted members can be serialized into the model artifact.
#[derive(Debug, Serialize, Deserialize)]
pub enum Member {
    Gbdt(GBDTClassifier),
    RandomForest(RandomForestClassifier),
    Logistic(LogisticClassifier),
}

impl Member {
    pub fn kind(&self) -> MemberKind {
        match self {
            Member::Gbdt(_) => MemberKind::Gbdt,
            Member::RandomForest(_) => MemberKind::RandomForest,
            Member::Logistic(_) => MemberKind::Logistic,
        }
    }

    fn inner(&self) -> &dyn ClassifierModel {
        match self {
            Member::Gbdt(m) => m,
            Member::RandomForest(m) => m,
            Member::Logistic(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn ClassifierModel {
        match self {
            Member::Gbdt(m) => m,
            Member::RandomForest(m) => m,
            Member::Logistic(m) => m,
        }
    }
}

impl ClassifierModel for Member {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>, n_classes: usize) -> Result<()> {
        self.inner_mut().fit(x, y, n_classes)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.inner().predict_proba(x)
    }

    fn fitted_dims(&self) -> Result<(usize, usize)> {
        self.inner().fitted_dims()
    }

    fn name(&self) -> &str {
        self.inner().name()
    }
}

/// Build a fresh, unfitted member from its parameters.
/// `seed` feeds the member's own randomness (row sampling, bootstraps).
pub fn build_model(params: &MemberParams, seed: u64) -> Member {
    match params {
        MemberParams::GBDT(p) => Member::Gbdt(GBDTClassifier::new(p.clone(), seed)),
        MemberParams::RandomForest(p) => {
            Member::RandomForest(RandomForestClassifier::new(p.clone(), seed))
        }
        MemberParams::Logistic(p) => Member::Logistic(LogisticClassifier::new(p.clone())),
    }
}

/// Build and fit one member per parameter set, in the given order.
/// Member `i` is seeded with `derive_seed(seed, i)`.
pub fn fit_members(
    member_params: &[MemberParams],
    x: &Array2<f64>,
    y: &Array1<usize>,
    n_classes: usize,
    seed: u64,
) -> Result<Vec<Member>> {
    member_params
        .iter()
        .enumerate()
        .map(|(i, params)| {
            let mut member = build_model(params, derive_seed(seed, i as u64));
            member.fit(x, y, n_classes)?;
            Ok(member)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn factory_respects_member_kind() {
        for kind in MemberKind::ALL {
            let model = build_model(&MemberParams::from(kind), 0);
            assert_eq!(model.kind(), kind);
            assert_eq!(model.name(), kind.name());
        }
    }

    #[test]
    fn fit_members_keeps_order() {
        let x = array![[0.0, 0.0], [0.1, 0.1], [0.2, 0.0], [3.0, 3.0], [3.1, 2.9], [2.9, 3.2]];
        let y = Array1::from_vec(vec![0, 0, 0, 1, 1, 1]);
        let params: Vec<MemberParams> = MemberKind::ALL.iter().map(|&k| k.into()).collect();
        let members = fit_members(&params, &x, &y, 2, 42).unwrap();
        let kinds: Vec<_> = members.iter().map(Member::kind).collect();
        assert_eq!(kinds, MemberKind::ALL.to_vec());
        for member in &members {
            assert_eq!(member.predict_proba(&x).unwrap().dim(), (6, 2));
        }
    }
}
