use std::collections::BTreeSet;

use strum::IntoEnumIterator;

use super::physical::{ShapeRule, RULES};
use super::*;
use crate::config::{ClusteringConfig, KMeansEffort};
use crate::scoring::Particle;
use crate::segmentation::Band;
use crate::testing::particle;

/// Six well separated groups in (size, intensity), five particles each.
fn grouped_particles() -> Vec<Particle> {
    let centers = [
        (30.0, 40.0),
        (30.0, 220.0),
        (300.0, 40.0),
        (300.0, 130.0),
        (1500.0, 130.0),
        (1500.0, 220.0),
    ];
    let mut particles = Vec::new();
    for (g, &(size, intensity)) in centers.iter().enumerate() {
        for j in 0..5 {
            let jitter = j as f64;
            particles.push(particle(
                Band::Mid,
                size + jitter * 2.0,
                0.7 + 0.01 * jitter,
                1.1,
                0.85,
                intensity + jitter,
                (10 * g as u32, 10 * j),
            ));
        }
    }
    particles
}

fn blobs() -> Samples {
    let centers = [
        [0.0, 0.0],
        [50.0, 0.0],
        [0.0, 50.0],
        [50.0, 50.0],
        [100.0, 0.0],
        [100.0, 100.0],
    ];
    let mut rows = Vec::new();
    for c in centers {
        for j in 0..5 {
            let d = j as f64 * 0.1;
            rows.push([c[0] + d, c[1] - d]);
        }
    }
    Samples::from_rows(&rows)
}

fn sorted_sizes(fit: &KMeansFit) -> Vec<usize> {
    let mut sizes = fit.cluster_sizes();
    sizes.sort_unstable();
    sizes
}

// ============================================================================
// k-means
// ============================================================================

#[test]
fn kmeans_recovers_separated_blobs() {
    let samples = blobs();
    let fit = KMeans::new(6, KMeansEffort::new(10, 300), 1e-4, 42)
        .fit(&samples)
        .unwrap();
    assert_eq!(sorted_sizes(&fit), vec![5; 6]);
    for chunk in fit.labels.chunks(5) {
        assert!(chunk.iter().all(|&l| l == chunk[0]));
    }
    // Five points per blob spread along a diagonal of length 0.4·√2.
    assert!((fit.inertia - 1.2).abs() < 1e-9);
}

#[test]
fn kmeans_is_reproducible_for_fixed_seed() {
    let samples = blobs();
    let kmeans = KMeans::new(4, KMeansEffort::new(8, 100), 1e-4, 7);
    let a = kmeans.fit(&samples).unwrap();
    let b = kmeans.fit(&samples).unwrap();
    assert_eq!(a, b);
}

#[test]
fn kmeans_rejects_too_few_distinct_vectors() {
    let rows: Vec<[f64; 2]> = (0..10).map(|i| [(i % 3) as f64, 0.0]).collect();
    let err = KMeans::new(6, KMeansEffort::new(2, 10), 1e-4, 42)
        .fit(&Samples::from_rows(&rows))
        .unwrap_err();
    assert_eq!(
        err,
        ClusterError::Degenerate {
            requested: 6,
            distinct: 3
        }
    );
}

#[test]
fn kmeans_rejects_more_clusters_than_samples() {
    let rows = [[0.0], [1.0]];
    let err = KMeans::new(3, KMeansEffort::new(1, 10), 1e-4, 42)
        .fit(&Samples::from_rows(&rows))
        .unwrap_err();
    assert!(matches!(err, ClusterError::TooFewSamples { samples: 2, clusters: 3 }));
}

#[test]
fn kmeans_labels_are_dense_with_duplicates() {
    // Many duplicates of one point and a handful of distinct ones.
    let mut rows: Vec<[f64; 1]> = vec![[0.0]; 20];
    rows.extend([[1.0], [2.0], [3.0], [4.0]]);
    let fit = KMeans::new(5, KMeansEffort::new(3, 50), 1e-4, 1)
        .fit(&Samples::from_rows(&rows))
        .unwrap();
    assert!(fit.cluster_sizes().iter().all(|&s| s > 0));
}

// ============================================================================
// Silhouette
// ============================================================================

#[test]
fn silhouette_of_separated_clusters_is_high() {
    let rows = [[0.0], [0.1], [0.2], [10.0], [10.1], [10.2]];
    let labels = [0, 0, 0, 1, 1, 1];
    let s = silhouette_score(&Samples::from_rows(&rows), &labels).unwrap();
    assert!(s > 0.95, "silhouette {s}");
}

#[test]
fn silhouette_known_value() {
    // a = 1, b = mean(|0-3|, |0-4|) = 3.5 for the first point, etc.
    let rows = [[0.0], [1.0], [3.0], [4.0]];
    let labels = [0, 0, 1, 1];
    let s = silhouette_score(&Samples::from_rows(&rows), &labels).unwrap();
    let s0 = (3.5 - 1.0) / 3.5;
    let s1 = (2.5 - 1.0) / 2.5;
    let expected = (s0 + s1 + s1 + s0) / 4.0;
    assert!((s - expected).abs() < 1e-12);
}

#[test]
fn silhouette_undefined_for_single_label_or_all_singletons() {
    let rows = [[0.0], [1.0], [2.0]];
    let samples = Samples::from_rows(&rows);
    assert_eq!(
        silhouette_score(&samples, &[0, 0, 0]),
        Err(ClusterError::UndefinedSilhouette { labels: 1 })
    );
    assert_eq!(
        silhouette_score(&samples, &[0, 1, 2]),
        Err(ClusterError::UndefinedSilhouette { labels: 3 })
    );
}

// ============================================================================
// Combined clustering
// ============================================================================

fn fast_config() -> ClusteringConfig {
    ClusteringConfig {
        search: KMeansEffort::new(8, 200),
        refine: KMeansEffort::new(12, 300),
        secondary: KMeansEffort::new(8, 200),
        ..Default::default()
    }
}

#[test]
fn combined_search_path_uses_every_label() {
    crate::testing::init_tracing();

    let particles = grouped_particles();
    let result = cluster_combined(&particles, &fast_config()).unwrap();

    assert!(result.searched());
    assert!((6..=10).contains(&result.k));
    assert_eq!(result.labels.len(), particles.len());
    let used: BTreeSet<usize> = result.labels.iter().copied().collect();
    assert_eq!(used, (0..result.k).collect());

    let ks: Vec<usize> = result.candidates.iter().map(|c| c.k).collect();
    assert_eq!(ks, (6..=10).collect::<Vec<_>>());
    for c in &result.candidates {
        assert!((0.0..=1.0).contains(&c.normalized_inertia));
        assert!((-1.0..=1.0).contains(&c.silhouette));
    }
    let best = result.best_candidate().unwrap();
    assert!(result.candidates.iter().all(|c| c.score <= best.score));
}

#[test]
fn combined_normalized_inertia_extremes() {
    let result = cluster_combined(&grouped_particles(), &fast_config()).unwrap();
    let max_inertia = result
        .candidates
        .iter()
        .map(|c| c.inertia)
        .fold(f64::MIN, f64::max);
    let worst = result
        .candidates
        .iter()
        .find(|c| c.inertia == max_inertia)
        .unwrap();
    assert_eq!(worst.normalized_inertia, 0.0);
    assert!(result
        .candidates
        .iter()
        .any(|c| c.normalized_inertia == 1.0));
}

#[test]
fn combined_search_is_deterministic() {
    let particles = grouped_particles();
    let a = cluster_combined(&particles, &fast_config()).unwrap();
    let b = cluster_combined(&particles, &fast_config()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn combined_small_count_uses_fixed_k() {
    let particles: Vec<Particle> = grouped_particles().into_iter().step_by(3).collect();
    assert_eq!(particles.len(), 10);
    let result = cluster_combined(&particles, &fast_config()).unwrap();
    assert!(!result.searched());
    assert_eq!(result.k, 6);
    let used: BTreeSet<usize> = result.labels.iter().copied().collect();
    assert_eq!(used.len(), 6);
}

#[test]
fn combined_identical_particles_are_degenerate() {
    let p = particle(Band::Dark, 40.0, 0.8, 1.0, 0.9, 50.0, (1, 1));
    let particles = vec![p; 8];
    let err = cluster_combined(&particles, &fast_config()).unwrap_err();
    assert_eq!(
        err,
        ClusterError::Degenerate {
            requested: 6,
            distinct: 1
        }
    );
}

#[test]
fn combined_features_are_standardized_and_weighted() {
    let particles: Vec<Particle> = (0..12)
        .map(|i| {
            let t = i as f64;
            particle(
                Band::Mid,
                40.0 + 15.0 * t,
                0.5 + 0.03 * t,
                1.1,
                0.6 + 0.03 * (i % 4) as f64,
                60.0 + 11.0 * t,
                (i, i),
            )
        })
        .collect();
    let weights = [1.3, 1.0, 0.9, 1.0, 1.4];
    let samples = combined_features(&particles, &weights);
    assert_eq!(samples.dim(), 5);
    for (d, w) in weights.iter().enumerate() {
        let column: Vec<f64> = samples.rows().map(|r| r[d]).collect();
        assert!(crate::math::mean(&column).abs() < 1e-9);
        let std = crate::math::std_dev(&column);
        // Aspect ratio is constant, so its column is all zeros.
        if d == 2 {
            assert_eq!(std, 0.0);
        } else {
            assert!((std - w).abs() < 1e-9, "column {d} std {std}");
        }
    }
}

#[test]
fn constant_feature_columns_become_zero() {
    let samples = combined_features(&grouped_particles(), &[1.0; 5]);
    for d in [2, 3] {
        assert!(samples.rows().all(|r| r[d] == 0.0), "column {d}");
    }
    let sizes: Vec<f64> = samples.rows().map(|r| r[0]).collect();
    assert!((crate::math::std_dev(&sizes) - 1.0).abs() < 1e-9);
}

// ============================================================================
// Interpretation
// ============================================================================

#[test]
fn interpretation_thresholds() {
    let i = ClusterInterpretation::from_means(0, 3, 120.0, 0.8, 100.0);
    assert_eq!(i.label(), "Gray_Small_Spherical");
    let i = ClusterInterpretation::from_means(1, 1, 49.9, 0.3, 89.0);
    assert_eq!(i.label(), "Dark_VerySmall_Irregular");
    let i = ClusterInterpretation::from_means(2, 1, 1000.0, 0.5, 160.0);
    assert_eq!(i.label(), "Bright_VeryLarge_Intermediate");
    assert_eq!(SizeClass::from_mean(150.0), SizeClass::Medium);
    assert_eq!(SizeClass::from_mean(400.0), SizeClass::Large);
    assert_eq!(ShapeClass::from_mean(0.75), ShapeClass::Compact);
    assert_eq!(ShapeClass::from_mean(0.6), ShapeClass::Intermediate);
    assert_eq!(ShapeClass::from_mean(0.4), ShapeClass::Intermediate);
}

#[test]
fn interpretation_uses_cluster_means_and_skips_empty_clusters() {
    let particles = vec![
        particle(Band::Mid, 100.0, 0.7, 1.0, 0.9, 100.0, (0, 0)),
        particle(Band::Mid, 200.0, 0.9, 1.0, 0.9, 120.0, (0, 0)),
        particle(Band::Bright, 2000.0, 0.2, 1.0, 0.9, 250.0, (0, 0)),
    ];
    let labels = [0, 0, 2];
    let map = interpret_clusters(&particles, &labels, 3);

    assert_eq!(map.len(), 2);
    assert!(!map.contains_key(&1));
    let first = &map[&0];
    assert_eq!(first.count, 2);
    assert_eq!(first.mean_size, 150.0);
    assert!((first.mean_circularity - 0.8).abs() < 1e-12);
    assert_eq!(first.label(), "Gray_Medium_Spherical");

    let names = particle_labels(&[0, 1, 2], &map);
    assert_eq!(names[0], "Gray_Medium_Spherical");
    assert_eq!(names[1], UNCLASSIFIED_LABEL);
    assert_eq!(names[2], "Bright_VeryLarge_Irregular");

    // Pure function of the table.
    assert_eq!(interpret_clusters(&particles, &labels, 3), map);
}

// ============================================================================
// Secondary clustering
// ============================================================================

#[test]
fn secondary_features_normalization() {
    let particles = vec![
        particle(Band::Mid, 10.0, 0.5, 1.0, 0.5, 255.0, (0, 0)),
        particle(Band::Mid, 30.0, 0.5, 1.0, 0.5, 0.0, (0, 0)),
        particle(Band::Mid, 20.0, 0.5, 1.0, 0.5, 127.5, (0, 0)),
    ];
    let features = secondary_features(&particles);
    assert_eq!(features[0][0], 0.0);
    assert_eq!(features[1][0], 1.0);
    assert_eq!(features[2][0], 0.5);
    assert_eq!(features[0][2], 1.0);
    assert_eq!(features[2][2], 0.5);
    assert_eq!(features[0][1], particles[0].scores.shape);

    let same = vec![particles[0]; 2];
    assert!(secondary_features(&same).iter().all(|f| f[0] == 0.0));
}

#[test]
fn secondary_k_follows_particle_count() {
    let particles = grouped_particles();
    let result = cluster_secondary(&particles, &fast_config()).unwrap();
    // 30 / 15 = 2, clamped up to 7.
    assert_eq!(result.k, 7);
    assert_eq!(result.labels.len(), 30);
    assert!(result.labels.iter().all(|&l| l < 7));
}

// ============================================================================
// Physical classification
// ============================================================================

fn typed(size: f64, circ: f64, aspect: f64, solidity: f64, intensity: f64) -> PhysicalType {
    classify_particle(&particle(Band::Mid, size, circ, aspect, solidity, intensity, (0, 0)))
}

#[test]
fn physical_rules_examples() {
    assert_eq!(typed(50.0, 0.8, 1.0, 0.9, 40.0), PhysicalType::AmorphousCarbonFine);
    assert_eq!(typed(50.0, 0.5, 1.0, 0.9, 40.0), PhysicalType::DispersedCarbon);
    assert_eq!(typed(200.0, 0.5, 1.0, 0.9, 40.0), PhysicalType::DenseCrystallineCarbon);
    assert_eq!(typed(200.0, 0.5, 1.0, 0.8, 40.0), PhysicalType::DispersedCarbon);
    assert_eq!(typed(500.0, 0.9, 1.0, 0.9, 84.9), PhysicalType::CarbonAgglomerate);

    assert_eq!(typed(50.0, 0.8, 1.0, 0.9, 85.0), PhysicalType::TransitionCompact);
    assert_eq!(typed(50.0, 0.6, 1.6, 0.7, 120.0), PhysicalType::TransitionAngular);
    assert_eq!(typed(50.0, 0.6, 1.0, 0.7, 120.0), PhysicalType::TransitionRound);
    assert_eq!(typed(50.0, 0.6, 1.0, 0.5, 120.0), PhysicalType::TransitionRound);
    assert_eq!(typed(200.0, 0.8, 1.0, 0.6, 120.0), PhysicalType::PorousDeposit);
    assert_eq!(typed(200.0, 0.8, 1.0, 0.9, 120.0), PhysicalType::TransitionCompact);
    assert_eq!(typed(200.0, 0.6, 1.0, 0.7, 120.0), PhysicalType::TransitionAngular);
    assert_eq!(typed(400.0, 0.6, 1.0, 0.6, 169.9), PhysicalType::PorousDeposit);
    assert_eq!(typed(400.0, 0.6, 1.0, 0.7, 169.9), PhysicalType::IntermediateMixture);

    assert_eq!(typed(49.0, 0.9, 1.0, 0.9, 170.0), PhysicalType::OpticalNoise);
    assert_eq!(typed(100.0, 0.9, 1.0, 0.9, 200.0), PhysicalType::BrightCompact);
    assert_eq!(typed(100.0, 0.6, 1.0, 0.9, 200.0), PhysicalType::BrightParticle);
    assert_eq!(typed(200.0, 0.4, 1.0, 0.9, 200.0), PhysicalType::ExposedSubstrate);
    assert_eq!(typed(200.0, 0.9, 1.0, 0.6, 200.0), PhysicalType::ExposedSubstrate);
    assert_eq!(typed(200.0, 0.6, 1.0, 0.8, 200.0), PhysicalType::BrightCompact);
}

#[test]
fn shape_traits_are_mutually_consistent() {
    for circ in [0.3, 0.5, 0.6, 0.7, 0.9] {
        for solidity in [0.5, 0.64, 0.65, 0.7, 0.76, 0.9] {
            for aspect in [0.5, 1.0, 1.5] {
                let t = ShapeTraits {
                    circularity: circ,
                    solidity,
                    aspect_ratio: aspect,
                };
                assert!(!(t.is_compact() && t.is_porous()));
                assert!(!(t.is_angular() && (t.is_compact() || t.is_porous())));
            }
        }
    }
}

#[test]
fn every_level_and_size_cell_ends_in_unconditional_rule() {
    for level in IntensityLevel::iter() {
        for size in SizeTier::iter() {
            let cell: Vec<_> = RULES
                .iter()
                .filter(|r| r.level == level && r.size == size)
                .collect();
            assert!(!cell.is_empty(), "no rule for {level:?}/{size:?}");
            assert_eq!(
                cell.last().map(|r| r.shape),
                Some(ShapeRule::Any),
                "{level:?}/{size:?} lacks a terminal rule"
            );
            assert!(cell[..cell.len() - 1]
                .iter()
                .all(|r| r.shape != ShapeRule::Any));
        }
    }
}

#[test]
fn classifier_never_falls_through() {
    let intensities = [0.0, 84.9, 85.0, 169.9, 170.0, 255.0];
    let sizes = [5.0, 49.9, 50.0, 99.9, 100.0, 199.9, 200.0, 399.9, 400.0, 5000.0];
    let values = [0.0, 0.39, 0.5, 0.55, 0.6, 0.65, 0.66, 0.7, 0.75, 0.76, 0.85, 0.86, 1.0, 1.2];
    let aspects = [0.2, 1.0, 1.4, 1.41, 3.0];
    let mut seen = BTreeSet::new();
    for &intensity in &intensities {
        for &size in &sizes {
            for &circ in &values {
                for &solidity in &values {
                    for &aspect in &aspects {
                        let kind = typed(size, circ, aspect, solidity, intensity);
                        assert_ne!(kind, PhysicalType::Unclassified);
                        seen.insert(kind);
                    }
                }
            }
        }
    }
    // Every named type is reachable.
    let all: BTreeSet<_> = PhysicalType::iter()
        .filter(|t| *t != PhysicalType::Unclassified)
        .collect();
    assert_eq!(seen, all);
}
