//! Raman - particle analysis for Raman microscopy images.
//!
//! Each image is contrast-equalized and split into bright, mid and dark
//! intensity bands. Particles are detected per band, scored, clustered on a
//! weighted feature space and assigned a physical type. The detailed report
//! adds quality metrics, PCA and the most cluster-balanced square zone.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use raman::config::AnalysisConfig;
//! use raman::pipeline::analyze_single_image;
//!
//! let config = AnalysisConfig::default();
//! let analysis = analyze_single_image("raw/img_01.jpg".as_ref(), "results".as_ref(), &config)?;
//! ```

pub mod batch;
pub mod clustering;
pub mod config;
pub mod detection;
pub mod image_io;
pub mod math;
pub mod pca;
pub mod pipeline;
pub mod quality;
pub mod report;
pub mod scoring;
pub mod segmentation;
pub mod table;
pub mod zone;

#[cfg(test)]
pub mod testing;

// ============================================================================
// Common entry points
// ============================================================================

pub use batch::{process_batch, BatchRecord, BatchStatus, BatchSummary};
pub use config::AnalysisConfig;
pub use pipeline::{analyze_frame, analyze_single_image, classify, DetailedAnalysis, PipelineError};
