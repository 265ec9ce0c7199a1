//! In-memory profile registry: the authoritative live view of every active session.

mod profile;
mod profile_registry;

pub use profile::{LoadState, Profile, ProfileEntry};
pub use profile_registry::ProfileRegistry;
