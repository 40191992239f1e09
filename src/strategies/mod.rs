//! Breakpoint strategies.
//!
//! Every strategy shares the regression kernel and the segment builder and
//! differs only in how breakpoints are chosen:
//!
//! - [`SustainedChange`]: streaming cut on persisting slope changes and
//!   inflections, with an R² fallback
//! - [`DualCriterionRefiner`]: seeds, wiggles and validates breakpoints inside
//!   each macro segment
//! - [`GradientThreshold`]: single pass over gradient differences
//! - [`GradientDetectAndFuse`]: progressive raw detection followed by animated
//!   fusion of short segments

pub mod fusion;
pub mod gradient;
pub mod refiner;
pub mod sustained;

use log::info;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::builder::SegmentationSummary;
use crate::error::{OptionExt, Result, SegmentationError};
use crate::{ElevationPoint, SegmentationResult};

pub use fusion::{GradientDetectAndFuse, GradientFuseParams};
pub use gradient::{GradientThreshold, GradientThresholdParams};
pub use refiner::{DualCriterionRefiner, RefinerParams};
pub use sustained::{SustainedChange, SustainedChangeParams};

/// Outcome of one bounded refinement or fusion step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceState {
    Continuing,
    Converged,
}

/// Common interface of the segmentation strategies.
pub trait SegmentationStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Inputs shorter than this produce an empty segment list.
    fn min_points(&self) -> usize;

    fn segment(&self, points: &[ElevationPoint]) -> SegmentationResult;
}

/// Identifies a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    SustainedChange,
    DualCriterionRefiner,
    GradientThreshold,
    GradientDetectAndFuse,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::SustainedChange,
        StrategyKind::DualCriterionRefiner,
        StrategyKind::GradientThreshold,
        StrategyKind::GradientDetectAndFuse,
    ];

    /// Stable identifier, as used in the `strategy` tag of a config.
    pub fn id(&self) -> &'static str {
        match self {
            StrategyKind::SustainedChange => "sustained_change",
            StrategyKind::DualCriterionRefiner => "dual_criterion_refiner",
            StrategyKind::GradientThreshold => "gradient_threshold",
            StrategyKind::GradientDetectAndFuse => "gradient_detect_and_fuse",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::SustainedChange => "Sustained change (v1)",
            StrategyKind::DualCriterionRefiner => "Dual-criterion refiner (v2)",
            StrategyKind::GradientThreshold => "Gradient threshold (v1)",
            StrategyKind::GradientDetectAndFuse => "Gradient detect and fuse (v2)",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            StrategyKind::SustainedChange => {
                "Grows segments point by point and cuts on persisting slope changes, \
                 peaks and valleys, or a poor linear fit."
            }
            StrategyKind::DualCriterionRefiner => {
                "Splits at peaks and valleys, seeds breakpoints on fit and gradient, \
                 nudges them to the best local fit and drops weak ones."
            }
            StrategyKind::GradientThreshold => {
                "Splits at peaks and valleys and cuts where the gradient ahead \
                 differs from the current segment."
            }
            StrategyKind::GradientDetectAndFuse => {
                "Reports raw gradient segments as they are found, then fuses short \
                 segments one at a time for animated display."
            }
        }
    }
}

/// A strategy together with its parameters.
///
/// Serialized as `{"strategy": "<id>", "params": {...}}`; fields missing from
/// `params` take their defaults.
///
/// # Example
/// ```
/// use profile_segmenter::{StrategyConfig, StrategyKind};
///
/// let config = StrategyConfig::from_json(
///     r#"{"strategy": "gradient_threshold", "params": {"cambioGradiente": 4}}"#,
/// )
/// .unwrap();
/// assert_eq!(config.kind(), StrategyKind::GradientThreshold);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "params", rename_all = "snake_case")]
pub enum StrategyConfig {
    SustainedChange(SustainedChangeParams),
    DualCriterionRefiner(RefinerParams),
    GradientThreshold(GradientThresholdParams),
    GradientDetectAndFuse(GradientFuseParams),
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::DualCriterionRefiner(RefinerParams::default())
    }
}

impl StrategyConfig {
    /// Default configuration of a strategy.
    pub fn defaults_for(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::SustainedChange => StrategyConfig::SustainedChange(Default::default()),
            StrategyKind::DualCriterionRefiner => {
                StrategyConfig::DualCriterionRefiner(Default::default())
            }
            StrategyKind::GradientThreshold => {
                StrategyConfig::GradientThreshold(Default::default())
            }
            StrategyKind::GradientDetectAndFuse => {
                StrategyConfig::GradientDetectAndFuse(Default::default())
            }
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: StrategyConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            StrategyConfig::SustainedChange(_) => StrategyKind::SustainedChange,
            StrategyConfig::DualCriterionRefiner(_) => StrategyKind::DualCriterionRefiner,
            StrategyConfig::GradientThreshold(_) => StrategyKind::GradientThreshold,
            StrategyConfig::GradientDetectAndFuse(_) => StrategyKind::GradientDetectAndFuse,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            StrategyConfig::SustainedChange(p) => p.validate(),
            StrategyConfig::DualCriterionRefiner(p) => p.validate(),
            StrategyConfig::GradientThreshold(p) => p.validate(),
            StrategyConfig::GradientDetectAndFuse(p) => p.validate(),
        }
    }

    /// Build the configured strategy.
    pub fn strategy(&self) -> Box<dyn SegmentationStrategy> {
        match self {
            StrategyConfig::SustainedChange(p) => Box::new(SustainedChange::new(p.clone())),
            StrategyConfig::DualCriterionRefiner(p) => {
                Box::new(DualCriterionRefiner::new(p.clone()))
            }
            StrategyConfig::GradientThreshold(p) => Box::new(GradientThreshold::new(p.clone())),
            StrategyConfig::GradientDetectAndFuse(p) => {
                Box::new(GradientDetectAndFuse::new(p.clone()))
            }
        }
    }

    /// Segment a profile. Small inputs give an empty segment list.
    pub fn segment(&self, points: &[ElevationPoint]) -> SegmentationResult {
        self.strategy().segment(points)
    }

    /// Segment a profile, rejecting bad parameters, non-finite points and
    /// inputs below the strategy's minimum size.
    pub fn try_segment(&self, points: &[ElevationPoint]) -> Result<SegmentationResult> {
        self.validate()?;

        if let Some(index) = points.iter().position(|p| !p.is_valid()) {
            return Err(SegmentationError::InvalidPoints {
                index,
                message: format!(
                    "non-finite point (distance {}, elevation {})",
                    points[index].distance, points[index].elevation
                ),
            });
        }

        let strategy = self.strategy();
        let minimum = strategy.min_points();
        (points.len() >= minimum)
            .then_some(())
            .ok_or_insufficient_points(points.len(), minimum)?;

        Ok(strategy.segment(points))
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Description of a strategy for pickers and documentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct StrategyInfo {
    pub kind: StrategyKind,
    pub id: String,
    pub name: String,
    pub description: String,
    /// Default params serialized as JSON
    pub default_params_json: String,
}

static CATALOG: Lazy<Vec<StrategyInfo>> = Lazy::new(|| {
    StrategyKind::ALL
        .iter()
        .map(|&kind| {
            let default_params_json = match StrategyConfig::defaults_for(kind) {
                StrategyConfig::SustainedChange(p) => serde_json::to_string(&p),
                StrategyConfig::DualCriterionRefiner(p) => serde_json::to_string(&p),
                StrategyConfig::GradientThreshold(p) => serde_json::to_string(&p),
                StrategyConfig::GradientDetectAndFuse(p) => serde_json::to_string(&p),
            }
            .unwrap_or_default();

            StrategyInfo {
                kind,
                id: kind.id().to_string(),
                name: kind.name().to_string(),
                description: kind.description().to_string(),
                default_params_json,
            }
        })
        .collect()
});

/// All available strategies, in a stable order.
pub fn strategy_catalog() -> &'static [StrategyInfo] {
    &CATALOG
}

// ============================================================================
// Comparison
// ============================================================================

/// Result of one configuration in a comparison run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct StrategyOutcome {
    pub kind: StrategyKind,
    pub result: SegmentationResult,
    pub summary: SegmentationSummary,
}

fn run_one(points: &[ElevationPoint], config: &StrategyConfig) -> StrategyOutcome {
    let result = config.segment(points);
    StrategyOutcome {
        kind: config.kind(),
        summary: result.summary(),
        result,
    }
}

/// Run several configurations over one profile, in order.
pub fn compare_strategies(
    points: &[ElevationPoint],
    configs: &[StrategyConfig],
) -> Vec<StrategyOutcome> {
    let outcomes: Vec<StrategyOutcome> = configs.iter().map(|c| run_one(points, c)).collect();
    info!(
        "[Compare] {} points, {} configurations",
        points.len(),
        outcomes.len()
    );
    outcomes
}

/// Run several configurations over one profile in parallel.
///
/// Outcomes are returned in the order of `configs`.
#[cfg(feature = "parallel")]
pub fn compare_strategies_parallel(
    points: &[ElevationPoint],
    configs: &[StrategyConfig],
) -> Vec<StrategyOutcome> {
    use rayon::prelude::*;

    let outcomes: Vec<StrategyOutcome> = configs.par_iter().map(|c| run_one(points, c)).collect();
    info!(
        "[Compare] {} points, {} configurations (parallel)",
        points.len(),
        outcomes.len()
    );
    outcomes
}
