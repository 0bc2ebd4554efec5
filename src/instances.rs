//! Mirror instance directory.
//!
//! The directory document is a JSON array of 12 arrays of mirror base URLs,
//! one per calendar month. It is fetched lazily, cached for a configurable
//! TTL, and replaced wholesale on every successful refresh. Readers always
//! see either the previous or the new snapshot.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use chrono::Datelike;
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use crate::config::MirrorConfig;
use crate::providers::ProviderError;

pub const MONTHS: usize = 12;

/// Mirror base URLs grouped by calendar month (index 0 is January).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InstanceGroups(Vec<Vec<String>>);

impl InstanceGroups {
    /// Validates a directory document; anything but exactly 12 groups is rejected.
    pub fn new(groups: Vec<Vec<String>>) -> Result<Self, ProviderError> {
        if groups.len() != MONTHS {
            return Err(ProviderError::Parse(format!(
                "mirror directory has {} groups; expected {MONTHS}",
                groups.len()
            )));
        }
        Ok(Self(groups))
    }

    /// The same single instance for every month.
    pub fn single(instance: &str) -> Self {
        Self(vec![vec![instance.to_string()]; MONTHS])
    }

    /// Group for a 1-based calendar month.
    pub fn for_month(&self, month: u32) -> &[String] {
        let idx = (month as usize + MONTHS - 1) % MONTHS;
        &self.0[idx]
    }
}

struct InstanceCache {
    groups: Arc<InstanceGroups>,
    fetched_at: Instant,
}

/// Fetches, caches, and picks mirror instances for the secondary provider.
pub struct InstanceDirectory {
    http: reqwest::Client,
    directory_url: Option<String>,
    fallback_instance: String,
    ttl: Duration,
    timeout: Duration,
    cache: RwLock<Option<Arc<InstanceCache>>>,
}

impl InstanceDirectory {
    pub fn new(http: reqwest::Client, cfg: &MirrorConfig) -> Self {
        Self {
            http,
            directory_url: cfg.directory_url.clone(),
            fallback_instance: cfg.fallback_instance.clone(),
            ttl: cfg.cache_ttl,
            timeout: cfg.directory_timeout,
            cache: RwLock::new(None),
        }
    }

    /// Returns the cached groups while fresh, otherwise refreshes them.
    ///
    /// A failed refresh keeps serving the previous snapshot, or the
    /// single-instance fallback if nothing was ever fetched.
    pub async fn list_instances(&self) -> Arc<InstanceGroups> {
        let cached = self.cached();
        if let Some(cache) = &cached {
            if cache.fetched_at.elapsed() < self.ttl {
                return cache.groups.clone();
            }
        }

        let Some(directory_url) = self.directory_url.as_deref() else {
            return Arc::new(InstanceGroups::single(&self.fallback_instance));
        };

        match self.fetch(directory_url).await {
            Ok(groups) => {
                let groups = Arc::new(groups);
                self.store(groups.clone());
                info!(url = %directory_url, "refreshed mirror directory");
                groups
            }
            Err(err) => {
                warn!(url = %directory_url, error = %err, "mirror directory refresh failed");
                match cached {
                    Some(cache) => cache.groups.clone(),
                    None => Arc::new(InstanceGroups::single(&self.fallback_instance)),
                }
            }
        }
    }

    /// Picks a random instance from the current month's group.
    pub fn pick(&self, groups: &InstanceGroups) -> String {
        self.pick_for_month(groups, chrono::Local::now().month())
    }

    /// Picks a random instance from the group of a 1-based calendar month.
    pub fn pick_for_month(&self, groups: &InstanceGroups, month: u32) -> String {
        groups
            .for_month(month)
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| self.fallback_instance.clone())
    }

    /// Lists (possibly refreshing) and picks in one step.
    pub async fn pick_current(&self) -> String {
        let groups = self.list_instances().await;
        let mirror = self.pick(&groups);
        debug!(mirror = %mirror, "picked mirror instance");
        mirror
    }

    fn cached(&self) -> Option<Arc<InstanceCache>> {
        match self.cache.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn store(&self, groups: Arc<InstanceGroups>) {
        let fresh = Some(Arc::new(InstanceCache {
            groups,
            fetched_at: Instant::now(),
        }));
        match self.cache.write() {
            Ok(mut guard) => *guard = fresh,
            Err(poisoned) => *poisoned.into_inner() = fresh,
        }
    }

    async fn fetch(&self, directory_url: &str) -> Result<InstanceGroups, ProviderError> {
        let response = self
            .http
            .get(directory_url)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let groups = response
            .json::<Vec<Vec<String>>>()
            .await
            .map_err(|err| ProviderError::Parse(err.to_string()))?;
        InstanceGroups::new(groups)
    }
}
