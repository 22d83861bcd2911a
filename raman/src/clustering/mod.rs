//! Cluster engine: weighted k-means with k selection, cluster interpretation,
//! secondary 3D clustering and the rule-based physical classifier.

mod combined;
mod interpretation;
mod kmeans;
mod physical;
mod secondary;
mod silhouette;

#[cfg(test)]
mod tests;

use thiserror::Error;

pub use combined::{cluster_combined, combined_features, CombinedClustering, KCandidate};
pub(crate) use combined::standardize;
pub use interpretation::{
    interpret_clusters, particle_labels, ClusterInterpretation, IntensityClass, ShapeClass,
    SizeClass, UNCLASSIFIED_LABEL,
};
pub use kmeans::{KMeans, KMeansFit, Samples};
pub use physical::{
    classify_particle, classify_particles, IntensityLevel, PhysicalType, ShapeTraits, SizeTier,
};
pub use secondary::{cluster_secondary, secondary_features, SecondaryClustering};
pub use silhouette::silhouette_score;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClusterError {
    #[error("Cannot form {clusters} clusters from {samples} samples")]
    TooFewSamples { samples: usize, clusters: usize },

    #[error("Requested {requested} clusters but only {distinct} distinct feature vectors exist")]
    Degenerate { requested: usize, distinct: usize },

    #[error("Silhouette is undefined for {labels} distinct labels")]
    UndefinedSilhouette { labels: usize },
}
