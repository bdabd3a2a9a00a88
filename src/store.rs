use tracing::error;

use crate::{adapters, model, util};

/// Objects returned by a single listing page; no cursor following happens
/// anywhere, so callers see at most this many entries per bucket.
const LIST_PAGE_SIZE: i32 = 1000;

/// Process-lifetime handle over the storage client plus the operator
/// configuration loaded once at construction.
pub struct TosStore {
    pub client: Box<dyn adapters::ObjectClient + Send + Sync>,
    pub configured_buckets: Vec<String>,
    /// Advisory hint from `TOS_MAX_BUCKETS`; read but not enforced.
    pub max_buckets: usize,
}

impl TosStore {
    pub fn new(
        client: Box<dyn adapters::ObjectClient + Send + Sync>,
        configured_buckets: Vec<String>,
        max_buckets: usize,
    ) -> Self {
        Self {
            client,
            configured_buckets,
            max_buckets,
        }
    }

    /// Load the bucket allow-list from `TOS_BUCKETS` (comma-separated) and
    /// the bucket cap hint from `TOS_MAX_BUCKETS` (default 5).
    pub fn from_env(client: Box<dyn adapters::ObjectClient + Send + Sync>) -> Self {
        let configured_buckets = match std::env::var("TOS_BUCKETS") {
            Ok(list) if !list.is_empty() => {
                list.split(',').map(|b| b.trim().to_string()).collect()
            }
            _ => Vec::new(),
        };

        let max_buckets = std::env::var("TOS_MAX_BUCKETS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        Self::new(client, configured_buckets, max_buckets)
    }

    /// List buckets, restricted to the allow-list when one is configured.
    /// Backend order is preserved.
    pub async fn list_buckets(&self) -> Result<Vec<model::object::TosBucket>, model::error::TosError> {
        let buckets = match self.client.tos_list_buckets().await {
            Ok(buckets) => buckets,
            Err(err) => {
                error!("list buckets error: {}", err);
                return Err(err);
            }
        };

        if self.configured_buckets.is_empty() {
            return Ok(buckets);
        }

        Ok(buckets
            .into_iter()
            .filter(|b| self.configured_buckets.contains(&b.name))
            .collect())
    }

    /// Single page of up to 1000 objects; larger buckets are truncated.
    pub async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        start_after: Option<String>,
    ) -> Result<Vec<model::object::TosObject>, model::error::TosError> {
        match self
            .client
            .tos_list_objects(bucket, prefix, start_after, Some(LIST_PAGE_SIZE))
            .await
        {
            Ok(objects) => Ok(objects),
            Err(err) => {
                error!("list objects error in {}: {}", bucket, err);
                Err(err)
            }
        }
    }

    /// Fetch full object content; re-fetches on every call, nothing is cached.
    pub async fn get_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<model::object::FetchedObject, model::error::TosError> {
        match self.client.tos_get_object(bucket, key, None, None).await {
            Ok(object) => Ok(object),
            Err(err @ model::error::TosError::NotFound { .. }) => Err(err),
            Err(err) => {
                error!("get object error: {}", err);
                Err(err)
            }
        }
    }

    pub fn is_text_file(&self, key: &str) -> bool {
        util::object::is_text_file(key)
    }
}
