//! [`TagSubscriptionProvider`] implementations.

use std::collections::BTreeSet;
use std::sync::RwLock;

use crate::error::{FencepostError, Result};
use crate::ports::TagSubscriptionProvider;

/// A fixed tag set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticTags(pub BTreeSet<String>);

impl StaticTags {
    /// Build from any iterator of tag names.
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tags.into_iter().map(Into::into).collect())
    }
}

impl TagSubscriptionProvider for StaticTags {
    fn subscribed_tags(&self) -> Result<BTreeSet<String>> {
        Ok(self.0.clone())
    }
}

/// Tag subscriptions shared with the subsystem that changes them.
#[derive(Debug, Default)]
pub struct SharedTagSubscriptions {
    tags: RwLock<BTreeSet<String>>,
}

impl SharedTagSubscriptions {
    /// Create with an initial set.
    #[must_use]
    pub fn new(tags: BTreeSet<String>) -> Self {
        Self {
            tags: RwLock::new(tags),
        }
    }

    /// Replace the whole set.
    ///
    /// # Errors
    ///
    /// Fails only if the lock is poisoned.
    pub fn replace(&self, tags: BTreeSet<String>) -> Result<()> {
        *self.tags.write().map_err(|_| poisoned())? = tags;
        Ok(())
    }

    /// Add tags. Returns `true` if the set changed.
    ///
    /// # Errors
    ///
    /// Fails only if the lock is poisoned.
    pub fn subscribe<I, S>(&self, tags: I) -> Result<bool>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut current = self.tags.write().map_err(|_| poisoned())?;
        let mut changed = false;
        for tag in tags {
            changed |= current.insert(tag.into());
        }
        Ok(changed)
    }

    /// Remove tags. Returns `true` if the set changed.
    ///
    /// # Errors
    ///
    /// Fails only if the lock is poisoned.
    pub fn unsubscribe<I, S>(&self, tags: I) -> Result<bool>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut current = self.tags.write().map_err(|_| poisoned())?;
        let mut changed = false;
        for tag in tags {
            changed |= current.remove(tag.as_ref());
        }
        Ok(changed)
    }
}

impl TagSubscriptionProvider for SharedTagSubscriptions {
    fn subscribed_tags(&self) -> Result<BTreeSet<String>> {
        Ok(self.tags.read().map_err(|_| poisoned())?.clone())
    }
}

fn poisoned() -> FencepostError {
    FencepostError::TagSourceUnavailable("tag subscription lock poisoned".into())
}
