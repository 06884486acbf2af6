pub mod cache;
pub mod cascade;
pub mod generator;
pub mod ledger;
pub mod provider;

pub use cache::LocalImageCache;
pub use cascade::ImagePipeline;
pub use generator::CardGenerator;
pub use ledger::ImageUsageLedger;
pub use provider::{ImageCandidate, ImageProvider, OpenverseProvider, PexelsProvider};
