// Library root: count tree geometry, per-count pitch scoring and the
// aggregation that feeds it.

pub mod aggregate;
pub mod count;
pub mod demo;
pub mod metrics;
pub mod scoring;
pub mod tree;
pub mod weights;

pub use count::{Count, CountError};
pub use metrics::{PitchMetrics, RateMetric, ScoredPitch};
pub use scoring::{
    classify, classify_on, CountScoringEngine, Rating, ScoreBounds, ScoreScale, ScoringError,
};
pub use tree::{CountNode, CountTreeLayout, Edge, PitchOutcome, Point, Transitions};
pub use weights::{CountDifficultyModifier, CountWeights, MetricWeights, WeightsError};
