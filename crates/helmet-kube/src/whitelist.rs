//! Shared release whitelist
//!
//! The whitelist is a single ConfigMap whose keys are release ids mapped to
//! `"yes"`. Every change is a full read-modify-write cycle: the write carries
//! the `resourceVersion` seen by the read and is rejected if anyone wrote in
//! between.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{KubeError, Result};
use crate::store::{ConfigMapStore, StoredConfigMap};

/// Name of the whitelist ConfigMap
pub const WHITELIST_NAME: &str = "run.helmet.whitelist.v1";

/// Value marking a key as a member
const MEMBER_VALUE: &str = "yes";

/// A snapshot of the whitelist
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Whitelist {
    /// Whitelisted release ids
    pub ids: BTreeSet<String>,

    /// Concurrency token from the read; `None` when the ConfigMap is absent
    pub token: Option<String>,
}

impl Whitelist {
    pub fn contains(&self, release_id: &str) -> bool {
        self.ids.contains(release_id)
    }

    /// Members as a list, for error reporting
    pub fn ids(&self) -> Vec<String> {
        self.ids.iter().cloned().collect()
    }

    /// Fail with `NotWhitelisted` unless the id is a member
    pub fn require(&self, release_id: &str) -> Result<()> {
        if self.contains(release_id) {
            Ok(())
        } else {
            Err(KubeError::NotWhitelisted {
                release_id: release_id.to_string(),
                whitelisted: self.ids(),
            })
        }
    }
}

/// Outcome of a whitelist mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhitelistChange {
    /// The whitelist was written
    Changed,
    /// Nothing to do; no write happened
    Unchanged,
}

/// Fetch/commit access to the whitelist ConfigMap
#[derive(Clone)]
pub struct WhitelistGate {
    store: Arc<dyn ConfigMapStore>,
    namespace: String,
    retries: u32,
}

impl WhitelistGate {
    /// Create a gate over the whitelist in `namespace`
    ///
    /// `retries` is the number of read-modify-write attempts made by
    /// [`add`](Self::add) and [`remove`](Self::remove) before a conflict is
    /// surfaced.
    pub fn new(store: Arc<dyn ConfigMapStore>, namespace: impl Into<String>, retries: u32) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            retries: retries.max(1),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Read the current whitelist
    pub async fn fetch(&self) -> Result<Whitelist> {
        let Some(cm) = self.store.get(&self.namespace, WHITELIST_NAME).await? else {
            debug!(namespace = %self.namespace, "whitelist does not exist yet");
            return Ok(Whitelist::default());
        };

        let ids = cm
            .data
            .into_iter()
            .filter(|(_, value)| value == MEMBER_VALUE)
            .map(|(key, _)| key)
            .collect();

        Ok(Whitelist {
            ids,
            token: cm.resource_version,
        })
    }

    /// Write a whitelist back, guarded by its token
    ///
    /// Fails with `WhitelistConflict` if the whitelist changed since the
    /// fetch that produced `whitelist`.
    pub async fn commit(&self, whitelist: &Whitelist) -> Result<Whitelist> {
        let mut cm = StoredConfigMap::new(&self.namespace, WHITELIST_NAME);
        cm.resource_version = whitelist.token.clone();
        cm.data = whitelist
            .ids
            .iter()
            .map(|id| (id.clone(), MEMBER_VALUE.to_string()))
            .collect();

        match self.store.put(&cm).await {
            Ok(stored) => Ok(Whitelist {
                ids: whitelist.ids.clone(),
                token: stored.resource_version,
            }),
            Err(KubeError::Conflict { namespace, name }) => {
                Err(KubeError::WhitelistConflict { namespace, name })
            }
            Err(e) => Err(e),
        }
    }

    /// Add a release id
    pub async fn add(&self, release_id: &str) -> Result<WhitelistChange> {
        self.modify(release_id, |whitelist| {
            Ok(whitelist.ids.insert(release_id.to_string()))
        })
        .await
    }

    /// Remove a release id; removing an absent id is `NotWhitelisted`
    pub async fn remove(&self, release_id: &str) -> Result<WhitelistChange> {
        self.modify(release_id, |whitelist| {
            whitelist.require(release_id)?;
            Ok(whitelist.ids.remove(release_id))
        })
        .await
    }

    /// Check membership without mutation
    pub async fn ensure(&self, release_id: &str) -> Result<()> {
        self.fetch().await?.require(release_id)
    }

    async fn modify<F>(&self, release_id: &str, mutate: F) -> Result<WhitelistChange>
    where
        F: Fn(&mut Whitelist) -> Result<bool>,
    {
        let mut attempt = 1;
        loop {
            let mut whitelist = self.fetch().await?;
            if !mutate(&mut whitelist)? {
                debug!(release = release_id, "whitelist already up to date");
                return Ok(WhitelistChange::Unchanged);
            }

            match self.commit(&whitelist).await {
                Ok(_) => {
                    info!(release = release_id, namespace = %self.namespace, "whitelist updated");
                    return Ok(WhitelistChange::Changed);
                }
                Err(e) if e.is_conflict() && attempt < self.retries => {
                    warn!(attempt, "whitelist changed concurrently, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
