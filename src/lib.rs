pub mod config;
pub mod db;
pub mod error;
pub mod registry;
pub mod store;
pub mod utils;

pub use config::Config;
pub use error::TagVaultError;
pub use registry::{LoadState, Profile, ProfileEntry, ProfileRegistry};
pub use store::{ProfileStore, StoredProfile};
