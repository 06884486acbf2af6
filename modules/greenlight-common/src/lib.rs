pub mod config;
pub mod error;
pub mod types;

pub use config::{
    DedupConfig, GreenlightConfig, ImageConfig, ProviderKeys, QualityConfig, RevenueConfig,
    RunConfig, ScorerConfig,
};
pub use error::GreenlightError;
pub use types::*;
