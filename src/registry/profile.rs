use uuid::Uuid;

/// Cache state of one entry. Tag fields are only meaningful once `Loaded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Allocated with defaults; no load is running (not scheduled, failed, or the backend was not ready).
    Unloaded,
    Loading,
    Loaded,
}

/// The live record for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub uuid: Uuid,
    pub name: String,
    pub tag: Option<String>,
    pub tag_prefix: Option<String>,
}

impl Profile {
    pub fn new(uuid: Uuid, name: impl Into<String>) -> Self {
        Self {
            uuid,
            name: name.into(),
            tag: None,
            tag_prefix: None,
        }
    }

    pub fn has_tag(&self) -> bool {
        self.tag.is_some()
    }
}

/// A snapshot of one registry slot.
#[derive(Debug, Clone)]
pub struct ProfileEntry {
    pub state: LoadState,
    pub profile: Profile,
    /// Set once the tag was changed locally; a later load keeps it instead of the stored one.
    pub tag_dirty: bool,
    // Distinguishes this session from an earlier one with the same uuid.
    pub(super) generation: u64,
}

impl ProfileEntry {
    pub(super) fn new(profile: Profile, generation: u64) -> Self {
        Self {
            state: LoadState::Unloaded,
            profile,
            tag_dirty: false,
            generation,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.state == LoadState::Loaded
    }

    /// Whether ending the session should write this entry back.
    pub fn needs_save(&self) -> bool {
        self.is_loaded() || self.tag_dirty
    }
}

/// Unicode-aware case-insensitive comparison without allocating.
pub(super) fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}
