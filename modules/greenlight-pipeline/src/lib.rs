pub mod autofix;
pub mod dedup;
pub mod images;
pub mod notify;
pub mod quality;
pub mod repair;
pub mod run;
pub mod scorer;
pub mod stats;
pub mod util;
