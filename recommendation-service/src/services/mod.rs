pub mod diversity;
pub mod ranking;
pub mod recall;
pub mod recommendation;
pub mod tracking;

pub use diversity::DiversityLayer;
pub use ranking::RankingLayer;
pub use recall::RecallLayer;
pub use recommendation::RecommendationService;
pub use tracking::BehaviorTracker;
