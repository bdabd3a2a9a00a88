use std::{
    collections::{HashMap, HashSet},
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use crate::{adapters, model};

/// In-memory stand-in for the TOS backend. Listing calls bump the in-flight
/// counters so tests can observe the fan-out width.
#[derive(Default)]
pub struct MockClient {
    pub buckets: Vec<model::object::TosBucket>,
    /// bucket name -> objects returned by a listing
    pub objects: HashMap<String, Vec<model::object::TosObject>>,
    /// "bucket/key" -> fetched content
    pub content: HashMap<String, model::object::FetchedObject>,
    /// buckets whose object listing fails
    pub failing_buckets: HashSet<String>,
    /// when set, listings stay in flight this long
    pub listing_delay: Option<Duration>,
    pub listings_in_flight: Arc<AtomicUsize>,
    pub peak_listings_in_flight: Arc<AtomicUsize>,
    pub get_object_calls: Arc<AtomicUsize>,
}

impl adapters::ObjectClient for MockClient {
    fn tos_list_buckets(
        &self,
    ) -> Pin<
        Box<
            dyn Future<Output = Result<Vec<model::object::TosBucket>, model::error::TosError>>
                + Send,
        >,
    > {
        let buckets = self.buckets.clone();
        Box::pin(async move { Ok(buckets) })
    }

    fn tos_list_objects(
        &self,
        bucket: &str,
        _prefix: &str,
        _start_after: Option<String>,
        _max_keys: Option<i32>,
    ) -> Pin<
        Box<
            dyn Future<Output = Result<Vec<model::object::TosObject>, model::error::TosError>>
                + Send,
        >,
    > {
        let objects = self.objects.get(bucket).cloned().unwrap_or_default();
        let fails = self.failing_buckets.contains(bucket);
        let delay = self.listing_delay;
        let in_flight = self.listings_in_flight.clone();
        let peak = self.peak_listings_in_flight.clone();
        let bucket = bucket.to_string();

        Box::pin(async move {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);

            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            in_flight.fetch_sub(1, Ordering::SeqCst);

            if fails {
                return Err(model::error::TosError::Service(format!(
                    "listing failed in {}",
                    bucket
                )));
            }

            Ok(objects)
        })
    }

    fn tos_get_object(
        &self,
        bucket: &str,
        key: &str,
        _range: Option<String>,
        _version_id: Option<String>,
    ) -> Pin<
        Box<
            dyn Future<Output = Result<model::object::FetchedObject, model::error::TosError>>
                + Send,
        >,
    > {
        self.get_object_calls.fetch_add(1, Ordering::SeqCst);

        let found = self.content.get(&format!("{}/{}", bucket, key)).cloned();
        let bucket = bucket.to_string();
        let key = key.to_string();

        Box::pin(async move {
            match found {
                Some(object) => Ok(object),
                None => Err(model::error::TosError::NotFound { bucket, key }),
            }
        })
    }
}
