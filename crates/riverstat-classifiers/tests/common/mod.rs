#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use riverstat_classifiers::config::{SearchConfig, SearchSpaceConfig, TrainingConfig};
use riverstat_classifiers::data_handling::{LabeledSamples, WaterSample};

/// Route library logs through the test harness; set `RUST_LOG` to see them.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub const CLASSES: [&str; 3] = ["Clean", "Polluted", "Slightly Polluted"];

/// Three well separated classes, `per_class` samples each.
pub fn river_samples(per_class: usize, seed: u64) -> LabeledSamples {
    // DO, DO_SAT, BOD, COD, SS, pH, NH3N, TEMP
    let centers = [
        [7.5, 95.0, 1.0, 8.0, 15.0, 7.2, 0.1, 27.0],
        [1.5, 20.0, 12.0, 70.0, 250.0, 6.4, 4.0, 31.0],
        [4.5, 55.0, 5.0, 30.0, 80.0, 6.9, 1.2, 29.0],
    ];
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = LabeledSamples::default();
    for (label, center) in CLASSES.iter().zip(centers.iter()) {
        for _ in 0..per_class {
            let values: Vec<f64> = center
                .iter()
                .map(|c| c * (1.0 + rng.gen_range(-0.08..0.08)))
                .collect();
            data.push(WaterSample::from_slice(&values).unwrap(), *label);
        }
    }
    data
}

/// A search small enough for tests.
pub fn quick_config(n_trials: usize) -> TrainingConfig {
    TrainingConfig {
        search: SearchConfig {
            n_trials,
            seed: 42,
            n_folds: 3,
            n_startup_trials: 3,
            ..SearchConfig::default()
        },
        space: SearchSpaceConfig {
            gbdt_num_boost_round: (5, 15),
            gbdt_max_depth: (2, 3),
            forest_n_trees: (5, 10),
            forest_max_depth: (2, 4),
            logistic_max_iterations: (20, 60),
            ..SearchSpaceConfig::default()
        },
        k_neighbors: 3,
        test_size: 0.2,
    }
}
