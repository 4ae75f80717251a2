pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};
pub use services::recommendation::ALGORITHM_VERSION;
pub use services::{
    BehaviorTracker, DiversityLayer, RankingLayer, RecallLayer, RecommendationService,
};
