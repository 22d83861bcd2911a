//! Detailed single-image report: CSV tables, the JSON summary and PNG
//! renderings, written under `<results>/<stem>/single_analysis/`.
//!
//! Pure presentation: everything here reads a finished
//! [`DetailedAnalysis`](crate::pipeline::DetailedAnalysis).

mod render;
mod summary;
mod tables;


use std::path::{Path, PathBuf};

use image::RgbImage;
use thiserror::Error;

pub use render::{
    band_codes, colorize, contour_overlay, density_map, gaussian_blur, pca_scatter,
    pivot_heatmaps, side_by_side, splat_map, zone_overlay, Colormap,
};
pub use summary::{
    write_json, AnalysisSummary, ClusterStats, Dimensions, ImageStats, ParticleCounts,
    SegmentationStats, ZoneStats,
};
pub use tables::{
    cluster_summary, cross_table, crosstab_bands, crosstab_types, type_pivots, Aggregate,
    ClusterSummaryRow, CrossTable,
};

use crate::config::ReportConfig;
use crate::pipeline::DetailedAnalysis;
use crate::scoring::MetricColumns;
use crate::table::{ParticleTable, TableError};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write CSV '{path}': {source}")]
    Csv { path: PathBuf, source: csv::Error },
    #[error("Failed to serialize '{path}': {source}")]
    Json {
        path: PathBuf,
        source: common::SerdeFormatError,
    },
    #[error("Failed to save image '{path}': {source}")]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error(transparent)]
    Table(#[from] TableError),
}

pub const PARTICLES_CSV: &str = "particles_by_intensity_types.csv";
pub const CLUSTER_SUMMARY_CSV: &str = "cluster_detailed_analysis.csv";
pub const PCA_CSV: &str = "pca_3d_results.csv";
pub const CROSSTAB_BANDS_CSV: &str = "crosstab_clusters_vs_intensity.csv";
pub const CROSSTAB_TYPES_CSV: &str = "crosstab_clusters_vs_particle_types.csv";
pub const SUMMARY_JSON: &str = "analysis_summary.json";

/// Writes the tables, the summary and, when enabled, the renderings.
pub fn write_report(analysis: &DetailedAnalysis, config: &ReportConfig) -> Result<(), ReportError> {
    config.validate();
    let dir = analysis.output_dir.as_path();
    std::fs::create_dir_all(dir).map_err(|source| ReportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    write_tables(&analysis.table, dir)?;
    write_json(&AnalysisSummary::from(analysis), &dir.join(SUMMARY_JSON))?;

    if config.render_plots {
        write_images(analysis, config, dir)?;
    }

    tracing::info!(dir = %dir.display(), plots = config.render_plots, "report written");
    Ok(())
}

fn write_tables(table: &ParticleTable, dir: &Path) -> Result<(), ReportError> {
    table.write_csv(&dir.join(PARTICLES_CSV))?;

    let path = dir.join(CLUSTER_SUMMARY_CSV);
    write_rows(&cluster_summary(table), &path)?;

    let path = dir.join(PCA_CSV);
    let pca_rows: Vec<[Option<f64>; 3]> = table
        .records
        .iter()
        .map(|r| [r.pca_1, r.pca_2, r.pca_3])
        .collect();
    write_pca(&pca_rows, &path)?;

    crosstab_bands(table).write_csv(&dir.join(CROSSTAB_BANDS_CSV))?;
    crosstab_types(table).write_csv(&dir.join(CROSSTAB_TYPES_CSV))?;
    for (name, pivot) in type_pivots(table) {
        pivot.write_csv(&dir.join(format!("pivot_{name}_cluster_type.csv")))?;
    }
    Ok(())
}

fn write_rows<T: serde::Serialize>(rows: &[T], path: &Path) -> Result<(), ReportError> {
    let csv_error = |source| ReportError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    for row in rows {
        writer.serialize(row).map_err(csv_error)?;
    }
    writer.flush().map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_pca(rows: &[[Option<f64>; 3]], path: &Path) -> Result<(), ReportError> {
    let csv_error = |source| ReportError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    writer
        .write_record(["PCA_1", "PCA_2", "PCA_3"])
        .map_err(csv_error)?;
    for row in rows {
        let fields = row.map(|v| v.map(|v| v.to_string()).unwrap_or_default());
        writer.write_record(&fields).map_err(csv_error)?;
    }
    writer.flush().map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn save(image: &RgbImage, dir: &Path, name: &str) -> Result<(), ReportError> {
    let path = dir.join(name);
    image.save(&path).map_err(|source| ReportError::Image { path, source })
}

fn write_images(
    analysis: &DetailedAnalysis,
    config: &ReportConfig,
    dir: &Path,
) -> Result<(), ReportError> {
    let segmentation = &analysis.frame.segmentation;
    let (width, height) = (segmentation.width(), segmentation.height());
    let color = &analysis.image.color;

    let equalized = render::gray_to_rgb(&segmentation.equalized);
    let visualization = segmentation.visualization();
    save(
        &side_by_side(&[color.clone(), equalized, render::gray_to_rgb(&visualization)]),
        dir,
        "preprocessing.png",
    )?;

    let intensity = render::gray_values(&segmentation.equalized);
    save(
        &colorize(&intensity, width, height, Colormap::Hot, Some((0.0, 255.0))),
        dir,
        "heatmap_intensity.png",
    )?;
    save(
        &colorize(
            &render::gray_values(&visualization),
            width,
            height,
            Colormap::Viridis,
            Some((0.0, 255.0)),
        ),
        dir,
        "heatmap_segmentation.png",
    )?;

    let density = density_map(&analysis.frame.detection, width, height, config.density_sigma);
    save(
        &colorize(&density, width, height, Colormap::Jet, None),
        dir,
        "heatmap_density.png",
    )?;
    save(
        &colorize(
            &band_codes(segmentation),
            width,
            height,
            Colormap::RdYlBuReversed,
            Some((0.5, 3.5)),
        ),
        dir,
        "heatmap_types.png",
    )?;

    let columns = analysis.table.metric_columns();
    for (name, metric, colormap) in [
        ("heatmap_size.png", columns.size, Colormap::YlOrRd),
        ("heatmap_shape.png", columns.shape, Colormap::Viridis),
        ("heatmap_param_intensity.png", columns.intensity, Colormap::Plasma),
    ] {
        let values = MetricColumns::column(metric, &analysis.table.records);
        let points: Vec<(u32, u32, f64)> = analysis
            .table
            .records
            .iter()
            .zip(values)
            .map(|(r, v)| (r.center_x, r.center_y, v))
            .collect();
        let map = splat_map(
            &points,
            width,
            height,
            config.splat_radius,
            config.splat_sigma,
            config.splat_smoothing_sigma,
        );
        save(&colorize(&map, width, height, colormap, None), dir, name)?;
    }

    let pivots = type_pivots(&analysis.table);
    let panels: Vec<(&CrossTable, Colormap)> = pivots
        .iter()
        .zip([
            Colormap::YlOrRd,
            Colormap::Viridis,
            Colormap::Plasma,
            Colormap::Blues,
        ])
        .map(|((_, table), colormap)| (table, colormap))
        .collect();
    save(&pivot_heatmaps(&panels), dir, "pivots_heatmaps.png")?;

    save(
        &contour_overlay(color, &analysis.frame.detection),
        dir,
        "overlay_contours.png",
    )?;
    if let Some(pca) = &analysis.pca {
        save(
            &pca_scatter(&pca.coordinates, &analysis.classification.combined.labels),
            dir,
            "pca_scatter.png",
        )?;
    }
    save(
        &zone_overlay(color, &analysis.zone.best),
        dir,
        "balanced_zone.png",
    )?;

    Ok(())
}

/// Logs totals and the score ranges, then counts per band, cluster and
/// physical type.
pub fn log_final_report(table: &ParticleTable) {
    tracing::info!(particles = table.len(), "final report");

    let columns = table.metric_columns();
    for (role, metric) in [
        ("size", columns.size),
        ("shape", columns.shape),
        ("intensity", columns.intensity),
    ] {
        let values = MetricColumns::column(metric, &table.records);
        if let Some((min, max)) = crate::math::min_max(&values) {
            tracing::info!(
                role,
                metric = %metric,
                mean = crate::math::mean(&values),
                min,
                max,
                "score range"
            );
        }
    }
    for (band, count) in table.band_counts() {
        tracing::info!(band = %band, count, "particles per band");
    }
    for (cluster, count) in table.cluster_distribution() {
        tracing::info!(cluster, count, "particles per cluster");
    }
    for (kind, count) in table.type_counts() {
        tracing::info!(physical_type = %kind, count, "particles per physical type");
    }
}
