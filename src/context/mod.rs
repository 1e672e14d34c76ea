pub mod estimator;
pub mod window;

pub use estimator::{
    build_estimator, BpeEstimator, CharHeuristicEstimator, EstimatorKind, MessageCostEstimator,
    TokenizerEstimator,
};
pub use window::{
    ConversationLog, ConversationWindow, TrimReport, Turn, TurnRole, WindowPolicy,
    EVICTION_BATCH,
};
