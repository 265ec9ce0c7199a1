//! Domain-level record operations on top of the executor.

mod models;
mod profile_store;

pub use models::StoredProfile;
pub use profile_store::ProfileStore;
