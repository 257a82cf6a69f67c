use crate::error::GridError;

/// Runtime configuration for a GridBase instance.
#[derive(Debug, Clone)]
pub struct GridConfig {
    /// Spawn a background refetch after a mutation resolves. When disabled the
    /// affected snapshot is only marked stale and the next read refreshes it.
    pub background_refetch: bool,
    pub max_column_name_len: usize,
    pub max_columns_per_view: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            background_refetch: true,
            max_column_name_len: 50,
            max_columns_per_view: 256,
        }
    }
}

impl GridConfig {
    /// Profile for interactive editing: eager refetch keeps the cache close to
    /// the store between keystrokes.
    pub fn interactive() -> Self {
        Self::default()
    }

    /// Profile for scripted imports. Refetches are deferred to the next read so
    /// a burst of writes does not fan out one fetch per mutation.
    pub fn bulk_load() -> Self {
        Self {
            background_refetch: false,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), GridError> {
        if self.max_column_name_len == 0 {
            return Err(GridError::InvalidConfig {
                message: "max_column_name_len must be > 0".into(),
            });
        }
        if self.max_columns_per_view == 0 {
            return Err(GridError::InvalidConfig {
                message: "max_columns_per_view must be > 0".into(),
            });
        }
        Ok(())
    }
}
