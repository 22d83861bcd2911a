//! Rule-based physical type classification.
//!
//! Independent of clustering. A particle is placed by intensity level and
//! size tier, then the first rule of that cell whose shape condition holds
//! decides its type. Every cell ends with an unconditional rule.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::scoring::Particle;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumIter,
    Serialize,
    Deserialize,
)]
pub enum PhysicalType {
    AmorphousCarbonFine,
    DispersedCarbon,
    DenseCrystallineCarbon,
    CarbonAgglomerate,
    TransitionCompact,
    TransitionAngular,
    TransitionRound,
    PorousDeposit,
    IntermediateMixture,
    OpticalNoise,
    BrightCompact,
    BrightParticle,
    ExposedSubstrate,
    /// Catch-all; unreachable while every cell keeps its terminal rule.
    Unclassified,
}

/// Intensity score level: `< 85`, `< 170`, rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum IntensityLevel {
    Low,
    Medium,
    High,
}

impl IntensityLevel {
    pub fn from_score(intensity: f64) -> Self {
        if intensity < 85.0 {
            Self::Low
        } else if intensity < 170.0 {
            Self::Medium
        } else {
            Self::High
        }
    }

    /// Size tier limits: bright particles are judged on a finer scale.
    fn size_limits(self) -> (f64, f64) {
        match self {
            Self::Low | Self::Medium => (100.0, 400.0),
            Self::High => (50.0, 200.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum SizeTier {
    Fine,
    Medium,
    Coarse,
}

impl SizeTier {
    pub fn from_size(level: IntensityLevel, size: f64) -> Self {
        let (fine, medium) = level.size_limits();
        if size < fine {
            Self::Fine
        } else if size < medium {
            Self::Medium
        } else {
            Self::Coarse
        }
    }
}

/// Shape measurements the rules look at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeTraits {
    pub circularity: f64,
    pub solidity: f64,
    pub aspect_ratio: f64,
}

impl ShapeTraits {
    pub fn of(particle: &Particle) -> Self {
        Self {
            circularity: particle.features.circularity,
            solidity: particle.features.solidity,
            aspect_ratio: particle.features.aspect_ratio,
        }
    }

    pub fn is_compact(&self) -> bool {
        self.circularity > 0.65 && self.solidity > 0.75
    }

    pub fn is_porous(&self) -> bool {
        self.solidity < 0.65
    }

    pub fn is_angular(&self) -> bool {
        !self.is_compact()
            && !self.is_porous()
            && (self.aspect_ratio > 1.4 || self.circularity < 0.55)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum ShapeRule {
    Any,
    Compact,
    Angular,
    Porous,
    SolidityAbove(f64),
    /// `circularity < 0.5 || solidity < 0.7`
    IrregularOutline,
}

impl ShapeRule {
    fn matches(self, traits: &ShapeTraits) -> bool {
        match self {
            Self::Any => true,
            Self::Compact => traits.is_compact(),
            Self::Angular => traits.is_angular(),
            Self::Porous => traits.is_porous(),
            Self::SolidityAbove(limit) => traits.solidity > limit,
            Self::IrregularOutline => traits.circularity < 0.5 || traits.solidity < 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(super) struct Rule {
    pub level: IntensityLevel,
    pub size: SizeTier,
    pub shape: ShapeRule,
    pub kind: PhysicalType,
}

const fn rule(level: IntensityLevel, size: SizeTier, shape: ShapeRule, kind: PhysicalType) -> Rule {
    Rule {
        level,
        size,
        shape,
        kind,
    }
}

use IntensityLevel as L;
use PhysicalType as T;
use ShapeRule as S;
use SizeTier as Z;

/// Ordered decision table. Within a cell the first matching rule wins.
pub(super) const RULES: &[Rule] = &[
    rule(L::Low, Z::Fine, S::Compact, T::AmorphousCarbonFine),
    rule(L::Low, Z::Fine, S::Any, T::DispersedCarbon),
    rule(L::Low, Z::Medium, S::SolidityAbove(0.85), T::DenseCrystallineCarbon),
    rule(L::Low, Z::Medium, S::Any, T::DispersedCarbon),
    rule(L::Low, Z::Coarse, S::Any, T::CarbonAgglomerate),
    rule(L::Medium, Z::Fine, S::Compact, T::TransitionCompact),
    rule(L::Medium, Z::Fine, S::Angular, T::TransitionAngular),
    rule(L::Medium, Z::Fine, S::Any, T::TransitionRound),
    rule(L::Medium, Z::Medium, S::Porous, T::PorousDeposit),
    rule(L::Medium, Z::Medium, S::Compact, T::TransitionCompact),
    rule(L::Medium, Z::Medium, S::Any, T::TransitionAngular),
    rule(L::Medium, Z::Coarse, S::Porous, T::PorousDeposit),
    rule(L::Medium, Z::Coarse, S::Any, T::IntermediateMixture),
    rule(L::High, Z::Fine, S::Any, T::OpticalNoise),
    rule(L::High, Z::Medium, S::Compact, T::BrightCompact),
    rule(L::High, Z::Medium, S::Any, T::BrightParticle),
    rule(L::High, Z::Coarse, S::IrregularOutline, T::ExposedSubstrate),
    rule(L::High, Z::Coarse, S::Any, T::BrightCompact),
];

pub fn classify_particle(particle: &Particle) -> PhysicalType {
    let level = IntensityLevel::from_score(particle.scores.intensity);
    let size = SizeTier::from_size(level, particle.scores.size);
    let traits = ShapeTraits::of(particle);

    RULES
        .iter()
        .find(|r| r.level == level && r.size == size && r.shape.matches(&traits))
        .map_or(PhysicalType::Unclassified, |r| r.kind)
}

pub fn classify_particles(particles: &[Particle]) -> Vec<PhysicalType> {
    particles.iter().map(classify_particle).collect()
}
