//! # Namespace Actions
//!
//! The user-facing operations that share annotation state with the
//! reconciliation job: extending a deadline, (un)subscribing to
//! notifications, and the namespace read model.
//!
//! Every mutation reads the namespace first and then submits a single
//! patch, using `replace` for keys that exist and `add` for keys that do
//! not. Rejected requests never write anything.

use crate::config::{LifecycleConfig, ShutdownOffsetError};
use crate::constants::{NEXT_SHUTDOWN_AT, NEXT_SHUTDOWN_BY, PREV_SHUTDOWN_AT, SHUTDOWN_SUBSCRIBERS};
use crate::controller::filter::{Exclusion, NamespaceFilter};
use crate::controller::lifecycle::{format_date, schedule_patch};
use crate::controller::patch::{annotation_path, PatchSet};
use crate::controller::store::{ClusterStore, NamespaceRecord, StoreError};
use crate::controller::subscribers::{self, SubscriberLimits, SubscriptionError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("not authenticated")]
    Unauthenticated,
    #[error("namespace {namespace} is not managed ({reason})")]
    NotManaged {
        namespace: String,
        reason: Exclusion,
    },
    #[error("already subscribed")]
    AlreadySubscribed,
    #[error("not subscribed")]
    NotSubscribed,
    #[error("maximum {max} subscribers allowed (current: {current})")]
    SubscriberLimit { max: usize, current: usize },
    #[error("subscriber list would exceed annotation size limit ({size} > {max} bytes)")]
    AnnotationTooLarge { size: usize, max: usize },
    #[error(transparent)]
    Offset(#[from] ShutdownOffsetError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<SubscriptionError> for ActionError {
    fn from(e: SubscriptionError) -> Self {
        match e {
            SubscriptionError::AlreadySubscribed => ActionError::AlreadySubscribed,
            SubscriptionError::NotSubscribed => ActionError::NotSubscribed,
            SubscriptionError::LimitReached { max, current } => {
                ActionError::SubscriberLimit { max, current }
            }
            SubscriptionError::TooLarge { size, max } => {
                ActionError::AnnotationTooLarge { size, max }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendResult {
    pub namespace: String,
    pub shutdown_at: String,
    pub shutdown_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResult {
    pub namespace: String,
    pub subscribers: Vec<String>,
    pub count: usize,
    pub max_allowed: usize,
}

/// Lifecycle state of one namespace as the dashboard shows it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceView {
    pub name: String,
    /// Empty when unscheduled
    pub shutdown_by: String,
    /// Empty when unscheduled
    pub shutdown_at: String,
    /// Empty when never deactivated
    pub shutdown_done: String,
    pub annotations: BTreeMap<String, String>,
    /// `None` when no target label is configured
    pub label_value: Option<String>,
    pub subscribers: Vec<String>,
    pub subscriber_count: usize,
    pub max_subscribers: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceListing {
    pub namespaces: Vec<NamespaceView>,
    pub target_label_name: Option<String>,
    pub shutdown_days: i64,
}

pub struct NamespaceActions {
    store: Arc<dyn ClusterStore>,
    config: Arc<LifecycleConfig>,
    filter: NamespaceFilter,
}

impl std::fmt::Debug for NamespaceActions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespaceActions")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl NamespaceActions {
    /// # Errors
    ///
    /// Returns an error if the reserved namespace pattern is not a valid regex.
    pub fn new(
        store: Arc<dyn ClusterStore>,
        config: Arc<LifecycleConfig>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            filter: NamespaceFilter::from_config(&config)?,
            store,
            config,
        })
    }

    /// Push the deadline to `now` + offset and record `actor` as its owner
    ///
    /// # Errors
    ///
    /// Rejects blank actors and unmanaged namespaces. An unusable offset fails
    /// before anything is written; store failures are propagated.
    pub async fn extend(
        &self,
        namespace: &str,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<ExtendResult, ActionError> {
        let actor = authenticated(actor)?;
        let record = self.managed_namespace(namespace).await?;

        let offset = self.config.shutdown_offset()?;
        let deadline = now
            .checked_add_signed(offset)
            .ok_or(ShutdownOffsetError::Overflow {
                days: self.config.shutdown_days,
            })?
            .date_naive();
        let patch = schedule_patch(&record, deadline, actor);
        self.store.patch_namespace(namespace, &patch).await?;

        let shutdown_at = format_date(deadline);
        info!(
            namespace,
            actor,
            previous = record.annotation(NEXT_SHUTDOWN_AT).unwrap_or_default(),
            shutdown_at = %shutdown_at,
            "Namespace shutdown extended"
        );
        Ok(ExtendResult {
            namespace: namespace.to_string(),
            shutdown_at,
            shutdown_by: actor.to_string(),
        })
    }

    /// Add `actor` to the namespace's subscriber list
    ///
    /// # Errors
    ///
    /// Rejects duplicates, a full list and an oversized annotation without writing anything.
    pub async fn subscribe(
        &self,
        namespace: &str,
        actor: &str,
    ) -> Result<SubscriptionResult, ActionError> {
        let actor = authenticated(actor)?;
        let record = self.managed_namespace(namespace).await?;
        let current = self.subscribers_of(&record);

        let (updated, encoded) = subscribers::with_subscriber(&current, actor, self.limits())?;
        self.write_subscribers(&record, encoded).await?;

        info!(
            namespace,
            actor,
            previous_subscribers = ?current,
            subscriber_count = updated.len(),
            "Namespace subscription completed"
        );
        Ok(self.subscription_result(namespace, updated))
    }

    /// Remove `actor` from the namespace's subscriber list
    ///
    /// # Errors
    ///
    /// Rejects actors that are not subscribed without writing anything.
    pub async fn unsubscribe(
        &self,
        namespace: &str,
        actor: &str,
    ) -> Result<SubscriptionResult, ActionError> {
        let actor = authenticated(actor)?;
        let record = self.managed_namespace(namespace).await?;
        let current = self.subscribers_of(&record);

        let (updated, encoded) = subscribers::without_subscriber(&current, actor)?;
        self.write_subscribers(&record, encoded).await?;

        info!(
            namespace,
            actor,
            previous_subscribers = ?current,
            subscriber_count = updated.len(),
            "Namespace unsubscription completed"
        );
        Ok(self.subscription_result(namespace, updated))
    }

    /// Read model for one managed namespace
    ///
    /// # Errors
    ///
    /// Rejects unmanaged namespaces; propagates store failures.
    pub async fn view(&self, namespace: &str) -> Result<NamespaceView, ActionError> {
        let record = self.managed_namespace(namespace).await?;
        Ok(self.view_of(&record))
    }

    /// Read model for every managed namespace, sorted by name
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn list(&self) -> Result<NamespaceListing, ActionError> {
        let mut namespaces: Vec<NamespaceView> = self
            .store
            .list_namespaces()
            .await?
            .iter()
            .filter(|ns| self.filter.includes(ns))
            .map(|ns| self.view_of(ns))
            .collect();
        namespaces.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(NamespaceListing {
            namespaces,
            target_label_name: self.filter.required_label().map(str::to_string),
            shutdown_days: self.config.shutdown_days,
        })
    }

    async fn managed_namespace(&self, namespace: &str) -> Result<NamespaceRecord, ActionError> {
        let record = self.store.get_namespace(namespace).await?;
        match self.filter.exclusion(&record) {
            Some(reason) => Err(ActionError::NotManaged {
                namespace: namespace.to_string(),
                reason,
            }),
            None => Ok(record),
        }
    }

    fn subscribers_of(&self, record: &NamespaceRecord) -> Vec<String> {
        subscribers::parse_or_empty(&record.name, record.annotation(SHUTDOWN_SUBSCRIBERS))
    }

    async fn write_subscribers(
        &self,
        record: &NamespaceRecord,
        encoded: String,
    ) -> Result<(), StoreError> {
        let mut patch = PatchSet::for_annotations(record.annotations.is_some());
        patch.upsert(
            annotation_path(SHUTDOWN_SUBSCRIBERS),
            encoded,
            record.has_annotation(SHUTDOWN_SUBSCRIBERS),
        );
        self.store.patch_namespace(&record.name, &patch).await
    }

    fn limits(&self) -> SubscriberLimits {
        SubscriberLimits {
            max_subscribers: self.config.max_subscribers,
            max_bytes: self.config.subscriber_annotation_max_bytes,
        }
    }

    fn subscription_result(&self, namespace: &str, subscribers: Vec<String>) -> SubscriptionResult {
        SubscriptionResult {
            namespace: namespace.to_string(),
            count: subscribers.len(),
            subscribers,
            max_allowed: self.config.max_subscribers,
        }
    }

    fn view_of(&self, record: &NamespaceRecord) -> NamespaceView {
        let subscribers = self.subscribers_of(record);
        let annotation = |key: &str| record.annotation(key).unwrap_or_default().to_string();

        NamespaceView {
            name: record.name.clone(),
            shutdown_by: annotation(NEXT_SHUTDOWN_BY),
            shutdown_at: annotation(NEXT_SHUTDOWN_AT),
            shutdown_done: annotation(PREV_SHUTDOWN_AT),
            annotations: record.annotations.clone().unwrap_or_default(),
            label_value: self
                .filter
                .required_label()
                .map(|label| record.label(label).unwrap_or_default().to_string()),
            subscriber_count: subscribers.len(),
            subscribers,
            max_subscribers: self.config.max_subscribers,
        }
    }
}

fn authenticated(actor: &str) -> Result<&str, ActionError> {
    let actor = actor.trim();
    if actor.is_empty() {
        Err(ActionError::Unauthenticated)
    } else {
        Ok(actor)
    }
}
