use std::{
    future::Future,
    pin::Pin,
    time::{Duration, SystemTime},
};

use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::Credentials;

use crate::{adapters, model};

const DEFAULT_REGION: &str = "cn-beijing";

/// Build an SDK client against the TOS S3-compatible gateway. Credentials
/// and endpoint come from `TOS_ACCESS_KEY`, `TOS_SECRET_KEY` and
/// `TOS_ENDPOINT`; missing values fall back to the SDK's default chain.
pub async fn client_from_env(region: Option<String>) -> aws_sdk_s3::Client {
    let region = region
        .or_else(|| std::env::var("TOS_REGION").ok())
        .unwrap_or_else(|| DEFAULT_REGION.to_string());

    let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region));

    if let (Ok(ak), Ok(sk)) = (
        std::env::var("TOS_ACCESS_KEY"),
        std::env::var("TOS_SECRET_KEY"),
    ) {
        loader = loader.credentials_provider(Credentials::new(ak, sk, None, None, "tos-env"));
    }

    if let Ok(endpoint) = std::env::var("TOS_ENDPOINT") {
        loader = loader.endpoint_url(endpoint);
    }

    let config = loader.load().await;
    let s3_config = aws_sdk_s3::config::Builder::from(&config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}

impl adapters::ObjectClient for aws_sdk_s3::Client {
    fn tos_list_buckets(
        &self,
    ) -> Pin<
        Box<
            dyn Future<Output = Result<Vec<model::object::TosBucket>, model::error::TosError>>
                + Send,
        >,
    > {
        let req = self.list_buckets();

        Box::pin(async move {
            let lb = req.send().await.map_err(|err| {
                model::error::TosError::Service(format!(
                    "failed to list_buckets: {}",
                    err.to_string()
                ))
            })?;

            let buckets = lb
                .buckets()
                .iter()
                .map(|b| model::object::TosBucket {
                    name: b.name().unwrap_or("").to_string(),
                })
                .collect();

            Ok(buckets)
        })
    }

    fn tos_list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        start_after: Option<String>,
        max_keys: Option<i32>,
    ) -> Pin<
        Box<
            dyn Future<Output = Result<Vec<model::object::TosObject>, model::error::TosError>>
                + Send,
        >,
    > {
        let mut req = self.list_objects_v2().bucket(bucket).prefix(prefix);

        if let Some(start_after) = start_after {
            req = req.start_after(start_after);
        }
        if let Some(max_keys) = max_keys {
            req = req.max_keys(max_keys);
        }

        let bucket = bucket.to_string();

        Box::pin(async move {
            let lo = req.send().await.map_err(|err| {
                model::error::TosError::Service(format!(
                    "failed to list_objects in {}: {}",
                    bucket,
                    err.to_string()
                ))
            })?;

            let mut objects = Vec::new();
            for o in lo.contents() {
                let key = o.key().unwrap_or("").to_string();
                let size = o.size().unwrap_or(0);
                let secs = if o.last_modified().is_some() {
                    o.last_modified().unwrap().secs()
                } else {
                    0
                };
                let nanos = if o.last_modified().is_some() {
                    o.last_modified().unwrap().subsec_nanos()
                } else {
                    0
                };
                let modified_time = SystemTime::UNIX_EPOCH + Duration::new(secs as u64, nanos);

                objects.push(model::object::TosObject {
                    key,
                    size,
                    modified_time,
                });
            }

            Ok(objects)
        })
    }

    fn tos_get_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<String>,
        version_id: Option<String>,
    ) -> Pin<
        Box<
            dyn Future<Output = Result<model::object::FetchedObject, model::error::TosError>>
                + Send,
        >,
    > {
        let mut req = self.get_object().bucket(bucket).key(key);

        if let Some(range) = range {
            req = req.range(range);
        }
        if let Some(version_id) = version_id {
            req = req.version_id(version_id);
        }

        let bucket = bucket.to_string();
        let key = key.to_string();

        Box::pin(async move {
            let o = match req.send().await {
                Err(err) => {
                    if let Some(svc_err) = err.as_service_error() {
                        if svc_err.is_no_such_key() {
                            return Err(model::error::TosError::NotFound { bucket, key });
                        }
                    }

                    return Err(model::error::TosError::Service(format!(
                        "failed to get_object: {}, {}",
                        key,
                        err.to_string()
                    )));
                }
                Ok(o) => o,
            };

            let content_type = o.content_type().map(|ct| ct.to_string());
            let metadata = o
                .metadata()
                .map(|m| {
                    m.iter()
                        .map(|(k, v)| (k.to_lowercase(), v.clone()))
                        .collect()
                })
                .unwrap_or_default();

            let bytes = o.body.collect().await.map_err(|err| {
                model::error::TosError::Service(format!(
                    "failed to collect body: {}, {}",
                    key,
                    err.to_string()
                ))
            })?;

            Ok(model::object::FetchedObject {
                content_type,
                content: bytes.into_bytes().to_vec(),
                metadata,
            })
        })
    }
}
