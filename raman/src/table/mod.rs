//! Particle table: one row per particle, exported to and loaded from CSV.


use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clustering::PhysicalType;
use crate::scoring::{MetricColumns, Particle};
use crate::segmentation::Band;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("Failed to access table '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Malformed CSV table '{path}': {source}")]
    Csv { path: PathBuf, source: csv::Error },
}

/// One CSV row. Columns filled by later stages are optional and written empty
/// when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleRecord {
    #[serde(rename = "Type")]
    pub band: Band,
    #[serde(rename = "Area_px2")]
    pub area: f64,
    #[serde(rename = "Perimeter_px")]
    pub perimeter: f64,
    #[serde(rename = "Circularity")]
    pub circularity: f64,
    #[serde(rename = "AspectRatio")]
    pub aspect_ratio: f64,
    #[serde(rename = "Solidity")]
    pub solidity: f64,
    #[serde(rename = "MeanIntensity")]
    pub mean_intensity: f64,
    #[serde(rename = "Center_X")]
    pub center_x: u32,
    #[serde(rename = "Center_Y")]
    pub center_y: u32,
    #[serde(rename = "Size_Score")]
    pub size_score: Option<f64>,
    #[serde(rename = "Shape_Score")]
    pub shape_score: Option<f64>,
    #[serde(rename = "Intensity_Score")]
    pub intensity_score: Option<f64>,
    #[serde(rename = "Cluster_Combined")]
    pub cluster_combined: Option<usize>,
    #[serde(rename = "Cluster_Label")]
    pub cluster_label: Option<String>,
    #[serde(rename = "Cluster_3D")]
    pub cluster_3d: Option<usize>,
    #[serde(rename = "Particle_Type_Combined")]
    pub particle_type: Option<PhysicalType>,
    #[serde(rename = "PCA_1")]
    pub pca_1: Option<f64>,
    #[serde(rename = "PCA_2")]
    pub pca_2: Option<f64>,
    #[serde(rename = "PCA_3")]
    pub pca_3: Option<f64>,
}

impl From<&Particle> for ParticleRecord {
    fn from(particle: &Particle) -> Self {
        let f = &particle.features;
        Self {
            band: f.band,
            area: f.area,
            perimeter: f.perimeter,
            circularity: f.circularity,
            aspect_ratio: f.aspect_ratio,
            solidity: f.solidity,
            mean_intensity: f.mean_intensity,
            center_x: f.center_x,
            center_y: f.center_y,
            size_score: Some(particle.scores.size),
            shape_score: Some(particle.scores.shape),
            intensity_score: Some(particle.scores.intensity),
            cluster_combined: None,
            cluster_label: None,
            cluster_3d: None,
            particle_type: None,
            pca_1: None,
            pca_2: None,
            pca_3: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParticleTable {
    pub records: Vec<ParticleRecord>,
}

impl ParticleTable {
    pub fn from_particles(particles: &[Particle]) -> Self {
        Self {
            records: particles.iter().map(ParticleRecord::from).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn metric_columns(&self) -> MetricColumns {
        MetricColumns::resolve(&self.records)
    }

    // ========================================================================
    // Column assignment
    // ========================================================================

    /// # Panics
    /// Panics if the slices do not have one entry per record.
    pub fn assign_combined(&mut self, labels: &[usize], names: &[String]) {
        assert_eq!(labels.len(), self.len(), "one cluster label per particle");
        assert_eq!(names.len(), self.len(), "one cluster name per particle");
        for ((record, &label), name) in self.records.iter_mut().zip(labels).zip(names) {
            record.cluster_combined = Some(label);
            record.cluster_label = Some(name.clone());
        }
    }

    pub fn assign_secondary(&mut self, labels: &[usize]) {
        assert_eq!(labels.len(), self.len(), "one 3D cluster label per particle");
        for (record, &label) in self.records.iter_mut().zip(labels) {
            record.cluster_3d = Some(label);
        }
    }

    pub fn assign_types(&mut self, types: &[PhysicalType]) {
        assert_eq!(types.len(), self.len(), "one physical type per particle");
        for (record, &kind) in self.records.iter_mut().zip(types) {
            record.particle_type = Some(kind);
        }
    }

    pub fn assign_pca(&mut self, coordinates: &[[f64; 3]]) {
        assert_eq!(coordinates.len(), self.len(), "one PCA row per particle");
        for (record, c) in self.records.iter_mut().zip(coordinates) {
            record.pca_1 = Some(c[0]);
            record.pca_2 = Some(c[1]);
            record.pca_3 = Some(c[2]);
        }
    }

    // ========================================================================
    // Summaries
    // ========================================================================

    pub fn band_counts(&self) -> BTreeMap<Band, usize> {
        let mut counts: BTreeMap<Band, usize> = Band::ALL.iter().map(|&b| (b, 0)).collect();
        for record in &self.records {
            *counts.entry(record.band).or_default() += 1;
        }
        counts
    }

    /// Particle count per combined cluster id (labeled rows only).
    pub fn cluster_distribution(&self) -> BTreeMap<usize, usize> {
        let mut counts = BTreeMap::new();
        for cluster in self.records.iter().filter_map(|r| r.cluster_combined) {
            *counts.entry(cluster).or_default() += 1;
        }
        counts
    }

    pub fn type_counts(&self) -> BTreeMap<PhysicalType, usize> {
        let mut counts = BTreeMap::new();
        for kind in self.records.iter().filter_map(|r| r.particle_type) {
            *counts.entry(kind).or_default() += 1;
        }
        counts
    }

    // ========================================================================
    // CSV
    // ========================================================================

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for record in &self.records {
            csv_writer.serialize(record)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let records = csv_reader
            .deserialize()
            .collect::<Result<Vec<ParticleRecord>, _>>()?;
        Ok(Self { records })
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), TableError> {
        let file = std::fs::File::create(path).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.to_writer(std::io::BufWriter::new(file))
            .map_err(|source| TableError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::debug!(path = %path.display(), rows = self.len(), "wrote particle table");
        Ok(())
    }

    pub fn read_csv(path: &Path) -> Result<Self, TableError> {
        let file = std::fs::File::open(path).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(std::io::BufReader::new(file)).map_err(|source| TableError::Csv {
            path: path.to_path_buf(),
            source,
        })
    }
}
