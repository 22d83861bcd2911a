use super::*;
use crate::config::KMeansEffort;
use crate::report::{PARTICLES_CSV, SUMMARY_JSON};
use crate::segmentation::Band;
use crate::testing::{init_tracing, particle_field};
use image::Luma;

fn fast_config() -> AnalysisConfig {
    let mut config = AnalysisConfig::default();
    config.clustering.search = KMeansEffort::new(6, 150);
    config.clustering.refine = KMeansEffort::new(8, 200);
    config.clustering.secondary = KMeansEffort::new(6, 150);
    config
}

fn band_rank(band: Band) -> usize {
    match band {
        Band::Bright => 0,
        Band::Mid => 1,
        Band::Dark => 2,
    }
}

#[test]
fn analyze_frame_finds_both_disk_levels() {
    init_tracing();

    let gray = particle_field();
    let frame = analyze_frame(&gray, &fast_config());

    assert!(frame.particles.len() >= 20, "got {}", frame.particles.len());
    assert!(frame.particles.iter().any(|p| p.features.band == Band::Bright));
    assert!(frame.particles.iter().any(|p| p.features.band == Band::Mid));
    assert!(frame
        .particles
        .windows(2)
        .all(|w| band_rank(w[0].features.band) <= band_rank(w[1].features.band)));
    for p in &frame.particles {
        assert!(p.features.center_x < gray.width());
        assert!(p.features.center_y < gray.height());
    }
    assert_eq!(frame.segmentation.width(), 440);
    assert_eq!(frame.segmentation.height(), 300);
}

#[test]
fn classify_labels_every_particle() {
    init_tracing();

    let frame = analyze_frame(&particle_field(), &fast_config());
    let config = fast_config().clustering;
    let classification = classify(&frame.particles, &config).unwrap();

    let n = frame.particles.len();
    assert_eq!(classification.combined.labels.len(), n);
    assert_eq!(classification.cluster_names.len(), n);
    assert_eq!(classification.types.len(), n);
    let k = classification.combined.k;
    assert!((config.k_min..=config.k_max).contains(&k) || !classification.combined.searched());
    assert!(classification.combined.labels.iter().all(|&l| l < k));

    let mut table = ParticleTable::from_particles(&frame.particles);
    classification.apply_to(&mut table);
    assert!(table.records.iter().all(|r| r.cluster_combined.is_some()));
    assert!(table.records.iter().all(|r| r.cluster_label.is_some()));
    assert!(table.records.iter().all(|r| r.particle_type.is_some()));
    assert_eq!(
        table.records.iter().all(|r| r.cluster_3d.is_some()),
        classification.secondary.is_some()
    );
}

#[test]
fn single_image_writes_report() {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let image_path = dir.path().join("field.png");
    particle_field().save(&image_path).unwrap();
    let results = dir.path().join("results");

    let analysis = analyze_single_image(&image_path, &results, &fast_config())
        .unwrap()
        .expect("field has enough particles");

    let out = results.join("field").join("single_analysis");
    assert_eq!(analysis.output_dir, out);
    assert_eq!(analysis.image_name, "field.png");
    assert_eq!(analysis.table.len(), analysis.frame.particles.len());
    assert!(analysis.pca.is_some());
    assert!(analysis.zone.best.size <= 300);

    for name in [
        PARTICLES_CSV,
        SUMMARY_JSON,
        "cluster_detailed_analysis.csv",
        "pca_3d_results.csv",
        "crosstab_clusters_vs_intensity.csv",
        "crosstab_clusters_vs_particle_types.csv",
        "preprocessing.png",
        "heatmap_density.png",
        "pivots_heatmaps.png",
        "overlay_contours.png",
        "pca_scatter.png",
        "balanced_zone.png",
    ] {
        assert!(out.join(name).is_file(), "missing {name}");
    }

    let table = ParticleTable::read_csv(&out.join(PARTICLES_CSV)).unwrap();
    assert_eq!(table.len(), analysis.table.len());
    assert!(table.records.iter().all(|r| r.pca_1.is_some()));

    let json = std::fs::read_to_string(out.join(SUMMARY_JSON)).unwrap();
    let summary: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(summary["image"]["image_name"], "field.png");
    assert_eq!(summary["image"]["dimensions"]["width"], 440);
    assert_eq!(
        summary["image"]["clustering"]["n_clusters"],
        analysis.classification.combined.k
    );
}

#[test]
fn plots_can_be_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let image_path = dir.path().join("field.png");
    particle_field().save(&image_path).unwrap();

    let mut config = fast_config();
    config.report.render_plots = false;
    let analysis = analyze_single_image(&image_path, dir.path(), &config)
        .unwrap()
        .unwrap();

    assert!(analysis.output_dir.join(PARTICLES_CSV).is_file());
    assert!(!analysis.output_dir.join("preprocessing.png").exists());
}

#[test]
fn uniform_image_has_too_few_particles() {
    let dir = tempfile::tempdir().unwrap();
    let image_path = dir.path().join("flat.png");
    GrayImage::from_pixel(64, 48, Luma([128])).save(&image_path).unwrap();

    let result = analyze_single_image(&image_path, dir.path(), &fast_config()).unwrap();

    assert!(result.is_none());
    assert!(!single_analysis_dir(dir.path(), &image_path).exists());
}

#[test]
fn missing_image_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = analyze_single_image(&dir.path().join("nope.png"), dir.path(), &fast_config());
    assert!(matches!(result, Err(PipelineError::Load(_))));
}

#[test]
fn single_analysis_dir_uses_stem() {
    assert_eq!(
        single_analysis_dir(Path::new("out"), Path::new("raw/img_01.jpg")),
        Path::new("out").join("img_01").join("single_analysis")
    );
}
