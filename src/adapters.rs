use std::{future::Future, pin::Pin};

use crate::model;

pub mod mock;
pub mod tos;

/// Async seam over the object-storage SDK. Methods are prefixed `tos_` so
/// the impl for `aws_sdk_s3::Client` does not shadow the SDK's own fluent
/// builders.
pub trait ObjectClient {
    fn tos_list_buckets(
        &self,
    ) -> Pin<
        Box<
            dyn Future<Output = Result<Vec<model::object::TosBucket>, model::error::TosError>>
                + Send,
        >,
    >;

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
    >;

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
    >;
}
