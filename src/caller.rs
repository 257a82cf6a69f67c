use serde::{Deserialize, Serialize};

/// Identity of the user a request is scoped to.
///
/// Authentication happens outside this crate; callers hand over an already
/// trusted identifier. Every view, column and row carries the owner it was
/// created under, and operations only see records owned by their caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallerContext {
    pub caller_id: String,
}

impl CallerContext {
    pub fn new(caller_id: impl Into<String>) -> Self {
        Self {
            caller_id: caller_id.into(),
        }
    }

    pub fn owns(&self, owner_id: &str) -> bool {
        self.caller_id == owner_id
    }
}
