use ndarray::{Array1, Array2};
use riverstat_classifiers::config::{MemberKind, MemberParams};
use riverstat_classifiers::ensemble::{argmax_rows, combine};
use riverstat_classifiers::models::{build_model, ClassifierModel};

#[test]
fn test_factory_builds_and_predicts() {
    // tiny dataset, two features, three classes
    let x = Array2::from_shape_vec(
        (9, 2),
        vec![
            1.0, 0.0, // class 0
            1.1, 0.1, // class 0
            0.9, 0.0, // class 0
            0.0, 1.0, // class 1
            0.1, 1.1, // class 1
            0.0, 0.9, // class 1
            1.0, 1.0, // class 2
            1.1, 0.9, // class 2
            0.9, 1.1, // class 2
        ],
    )
    .expect("failed to create feature matrix");
    let y = Array1::from_vec(vec![0, 0, 0, 1, 1, 1, 2, 2, 2]);

    let mut probs = Vec::new();
    for kind in MemberKind::ALL {
        let mut model = build_model(&MemberParams::from(kind), 7);
        model.fit(&x, &y, 3).expect("fit failed");
        let p = model.predict_proba(&x).expect("predict failed");
        assert_eq!(p.dim(), (9, 3));
        for row in p.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9, "{} rows must sum to one", kind);
        }
        probs.push(p);
    }

    let combined = combine(&probs, &[1.0, 1.0, 1.0]).unwrap();
    assert_eq!(argmax_rows(&combined).len(), x.nrows());
}
