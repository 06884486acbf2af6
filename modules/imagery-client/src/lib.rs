pub mod error;
pub mod openverse;
pub mod pexels;

pub use error::{ImageryError, Result};
pub use openverse::{OpenverseClient, OpenverseImage};
pub use pexels::{PexelsClient, PexelsPhoto};
