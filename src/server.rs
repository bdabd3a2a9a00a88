use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use futures::{stream, StreamExt, TryStreamExt};
use rmcp::{model::*, service::RequestContext, ErrorData as McpError, RoleServer, ServerHandler};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};
use tracing_subscriber::{filter::LevelFilter, reload, Registry};

use crate::{model, store, util};

/// Upper bound on buckets whose listings are in flight at the same time
/// during a resource enumeration.
pub const MAX_CONCURRENT_BUCKET_LISTS: usize = 3;

/// Supported tool operations. Unknown names never reach a handler.
enum ToolKind {
    ListBuckets,
    ListObjectsV2,
    GetObject,
}

impl ToolKind {
    fn parse(name: &str) -> Result<Self, model::error::TosError> {
        match name {
            "ListBuckets" => Ok(Self::ListBuckets),
            "ListObjectsV2" => Ok(Self::ListObjectsV2),
            "GetObject" => Ok(Self::GetObject),
            _ => Err(model::error::TosError::UnsupportedOperation),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListObjectsArgs {
    #[serde(rename = "Bucket")]
    bucket: String,
    #[serde(rename = "MaxKeys")]
    max_keys: Option<i32>,
    #[serde(rename = "Prefix")]
    prefix: Option<String>,
    #[serde(rename = "StartAfter")]
    start_after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GetObjectArgs {
    #[serde(rename = "Bucket")]
    bucket: String,
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "Range")]
    range: Option<String>,
    #[serde(rename = "VersionId")]
    version_id: Option<String>,
}

pub struct TosServer {
    store: store::TosStore,
    log_handle: reload::Handle<LevelFilter, Registry>,
}

fn object_schema(value: serde_json::Value) -> Arc<JsonObject> {
    match value {
        serde_json::Value::Object(map) => Arc::new(map),
        _ => Arc::new(JsonObject::new()),
    }
}

fn level_filter(level: LoggingLevel) -> LevelFilter {
    match level {
        LoggingLevel::Debug => LevelFilter::DEBUG,
        LoggingLevel::Info | LoggingLevel::Notice => LevelFilter::INFO,
        LoggingLevel::Warning => LevelFilter::WARN,
        LoggingLevel::Error
        | LoggingLevel::Critical
        | LoggingLevel::Alert
        | LoggingLevel::Emergency => LevelFilter::ERROR,
    }
}

impl TosServer {
    pub fn new(store: store::TosStore, log_handle: reload::Handle<LevelFilter, Registry>) -> Self {
        Self { store, log_handle }
    }

    fn tool_catalog() -> Vec<Tool> {
        vec![
            Tool::new(
                "ListBuckets",
                "Returns a list of all buckets owned by the authenticated sender of the request.",
                object_schema(json!({
                    "type": "object",
                    "properties": {},
                    "required": [],
                })),
            ),
            Tool::new(
                "ListObjectsV2",
                "Returns some or all (up to 1,000) of the objects in a bucket with each request.",
                object_schema(json!({
                    "type": "object",
                    "properties": {
                        "Bucket": {"type": "string", "description": "bucket name"},
                        "MaxKeys": {
                            "type": "integer",
                            "description": "Sets the maximum number of keys returned in the response."
                        },
                        "Prefix": {
                            "type": "string",
                            "description": "Limits the response to keys that begin with the specified prefix."
                        },
                        "StartAfter": {
                            "type": "string",
                            "description": "StartAfter is where you want the service to start listing from."
                        }
                    },
                    "required": ["Bucket"],
                })),
            ),
            Tool::new(
                "GetObject",
                "Retrieves an object from TOS",
                object_schema(json!({
                    "type": "object",
                    "properties": {
                        "Bucket": {"type": "string", "description": "bucket name"},
                        "Key": {
                            "type": "string",
                            "description": "Key of the object to get. Length Constraints: Minimum length of 1."
                        },
                        "Range": {
                            "type": "string",
                            "description": "Downloads the specified byte range of an object."
                        },
                        "VersionId": {
                            "type": "string",
                            "description": "Version ID used to reference a specific version of the object."
                        }
                    },
                    "required": ["Bucket", "Key"],
                })),
            ),
        ]
    }

    async fn bucket_resources(
        &self,
        bucket: model::object::TosBucket,
    ) -> Result<Vec<Resource>, model::error::TosError> {
        let objects = self.store.list_objects(&bucket.name, "", None).await?;

        Ok(objects
            .into_iter()
            .map(|object| {
                let mime_type = if self.store.is_text_file(&object.key) {
                    "text/plain"
                } else {
                    "application/octet-stream"
                };

                let mut raw = RawResource::new(
                    format!("tos://{}/{}", bucket.name, object.key),
                    object.key.clone(),
                );
                raw.mime_type = Some(mime_type.to_string());

                raw.no_annotation()
            })
            .collect())
    }

    /// Enumerate every object of every configured bucket as a resource.
    /// Bucket listings fan out, at most `MAX_CONCURRENT_BUCKET_LISTS` in
    /// flight; the first failure aborts the whole enumeration.
    pub(crate) async fn collect_resources(
        &self,
    ) -> Result<Vec<Resource>, model::error::TosError> {
        let buckets = self.store.list_buckets().await?;

        let per_bucket: Vec<Vec<Resource>> = stream::iter(buckets)
            .map(|bucket| self.bucket_resources(bucket))
            .buffer_unordered(MAX_CONCURRENT_BUCKET_LISTS)
            .try_collect()
            .await?;

        Ok(per_bucket.into_iter().flatten().collect())
    }

    /// Fetch an object by `tos://` URI and return its content base64-encoded.
    /// Both the text and binary branches return the bare base64 string; the
    /// binary branch builds a structured blob result that is only logged.
    pub(crate) async fn read_resource_payload(
        &self,
        uri: &str,
    ) -> Result<String, model::error::TosError> {
        let (bucket, key) = util::object::parse_resource_uri(uri)?;

        let object = self.store.get_object(bucket, key).await?;
        let encoded = BASE64.encode(&object.content);

        if !self.store.is_text_file(key) {
            let structured = ReadResourceResult {
                contents: vec![ResourceContents::BlobResourceContents {
                    uri: uri.to_string(),
                    mime_type: object.content_type.clone(),
                    blob: encoded.clone(),
                }],
            };
            debug!(result = ?structured, "binary resource read");
        }

        Ok(encoded)
    }

    /// Tool dispatch. Goes through the raw client, so the bucket allow-list
    /// does not apply here.
    async fn dispatch_tool(
        &self,
        name: &str,
        args: JsonObject,
    ) -> Result<String, model::error::TosError> {
        match ToolKind::parse(name)? {
            ToolKind::ListBuckets => {
                let buckets = self.store.client.tos_list_buckets().await?;
                let names: Vec<String> = buckets.into_iter().map(|b| b.name).collect();

                Ok(format!("{:?}", names))
            }
            ToolKind::ListObjectsV2 => {
                let args: ListObjectsArgs =
                    serde_json::from_value(serde_json::Value::Object(args))
                        .map_err(|err| model::error::TosError::Service(err.to_string()))?;

                let objects = self
                    .store
                    .client
                    .tos_list_objects(
                        &args.bucket,
                        args.prefix.as_deref().unwrap_or(""),
                        args.start_after,
                        args.max_keys,
                    )
                    .await?;

                Ok(format!("{:?}", objects))
            }
            ToolKind::GetObject => {
                let args: GetObjectArgs = serde_json::from_value(serde_json::Value::Object(args))
                    .map_err(|err| model::error::TosError::Service(err.to_string()))?;

                let object = self
                    .store
                    .client
                    .tos_get_object(&args.bucket, &args.key, args.range, args.version_id)
                    .await?;

                String::from_utf8(object.content)
                    .map_err(|err| model::error::TosError::Service(err.to_string()))
            }
        }
    }

    /// Tool failures surface as an `Error: …` text payload, never as a
    /// protocol-level error.
    pub(crate) async fn tool_text(&self, name: &str, args: JsonObject) -> String {
        match self.dispatch_tool(name, args).await {
            Ok(text) => text,
            Err(err) => format!("Error: {}", err),
        }
    }
}

impl ServerHandler for TosServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            capabilities: ServerCapabilities::builder()
                .enable_resources()
                .enable_tools()
                .enable_logging()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Exposes Volcengine TOS buckets and objects as read-only resources, \
                 plus ListBuckets/ListObjectsV2/GetObject tools."
                    .to_string(),
            ),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        match self.collect_resources().await {
            Ok(resources) => Ok(ListResourcesResult {
                resources,
                next_cursor: None,
            }),
            Err(err) => {
                error!("resource listing failed: {}", err);
                Err(McpError::internal_error(err.to_string(), None))
            }
        }
    }

    async fn read_resource(
        &self,
        ReadResourceRequestParam { uri }: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        match self.read_resource_payload(&uri).await {
            Ok(payload) => Ok(ReadResourceResult {
                contents: vec![ResourceContents::text(payload, uri)],
            }),
            Err(err @ model::error::TosError::InvalidUri) => {
                error!("uri parsing error: {}", err);
                Err(McpError::invalid_params(
                    err.to_string(),
                    Some(json!({ "uri": uri })),
                ))
            }
            Err(err @ model::error::TosError::NotFound { .. }) => {
                error!("read resource failed: {}", err);
                Err(McpError::resource_not_found(
                    err.to_string(),
                    Some(json!({ "uri": uri })),
                ))
            }
            Err(err) => {
                error!("read resource failed: {}", err);
                Err(McpError::internal_error(err.to_string(), None))
            }
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: Self::tool_catalog(),
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let args = request.arguments.unwrap_or_default();
        let text = self.tool_text(request.name.as_ref(), args).await;

        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    async fn set_level(
        &self,
        SetLevelRequestParam { level }: SetLevelRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<(), McpError> {
        let filter = level_filter(level);

        self.log_handle
            .modify(|f| *f = filter)
            .map_err(|err| McpError::internal_error(err.to_string(), None))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::Ordering;
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::adapters::mock::MockClient;

    fn object(key: &str) -> model::object::TosObject {
        model::object::TosObject {
            key: key.to_string(),
            size: 0,
            modified_time: SystemTime::UNIX_EPOCH,
        }
    }

    fn fetched(content: &[u8]) -> model::object::FetchedObject {
        model::object::FetchedObject {
            content_type: Some("application/octet-stream".to_string()),
            content: content.to_vec(),
            metadata: HashMap::new(),
        }
    }

    fn args(value: serde_json::Value) -> JsonObject {
        match value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn test_server(client: MockClient) -> TosServer {
        let store = store::TosStore::new(Box::new(client), Vec::new(), 5);
        let (_, handle) = reload::Layer::<LevelFilter, Registry>::new(LevelFilter::INFO);

        TosServer::new(store, handle)
    }

    #[tokio::test]
    async fn test_collect_resources_projection() {
        let client = MockClient {
            buckets: vec![model::object::TosBucket {
                name: "data".to_string(),
            }],
            objects: [(
                "data".to_string(),
                vec![object("readme.md"), object("blob.bin")],
            )]
            .into_iter()
            .collect(),
            ..Default::default()
        };
        let server = test_server(client);

        let resources = server.collect_resources().await.unwrap();
        assert_eq!(resources.len(), 2);

        let text = resources.iter().find(|r| r.raw.name == "readme.md").unwrap();
        assert_eq!(text.raw.uri, "tos://data/readme.md");
        assert_eq!(text.raw.mime_type.as_deref(), Some("text/plain"));

        let binary = resources.iter().find(|r| r.raw.name == "blob.bin").unwrap();
        assert_eq!(binary.raw.uri, "tos://data/blob.bin");
        assert_eq!(
            binary.raw.mime_type.as_deref(),
            Some("application/octet-stream")
        );
    }

    #[tokio::test]
    async fn test_collect_resources_bounded_fan_out() {
        let mut buckets = Vec::new();
        let mut objects = HashMap::new();
        for i in 0..5 {
            let name = format!("bucket-{}", i);
            objects.insert(name.clone(), vec![object("file.txt")]);
            buckets.push(model::object::TosBucket { name });
        }

        let client = MockClient {
            buckets,
            objects,
            listing_delay: Some(Duration::from_millis(20)),
            ..Default::default()
        };
        let peak = client.peak_listings_in_flight.clone();
        let server = test_server(client);

        let resources = server.collect_resources().await.unwrap();
        assert_eq!(resources.len(), 5);
        assert_eq!(peak.load(Ordering::SeqCst), MAX_CONCURRENT_BUCKET_LISTS);
    }

    #[tokio::test]
    async fn test_collect_resources_aborts_on_failure() {
        let mut buckets = Vec::new();
        let mut objects = HashMap::new();
        for name in ["good-1", "broken", "good-2"] {
            objects.insert(name.to_string(), vec![object("file.txt")]);
            buckets.push(model::object::TosBucket {
                name: name.to_string(),
            });
        }

        let client = MockClient {
            buckets,
            objects,
            failing_buckets: HashSet::from(["broken".to_string()]),
            ..Default::default()
        };
        let server = test_server(client);

        let result = server.collect_resources().await;
        assert!(matches!(result, Err(model::error::TosError::Service(_))));
    }

    #[tokio::test]
    async fn test_read_resource_payload_is_base64_for_both_kinds() {
        let client = MockClient {
            content: [
                ("b/k.txt".to_string(), fetched(b"hi")),
                ("b/k.bin".to_string(), fetched(b"hi")),
            ]
            .into_iter()
            .collect(),
            ..Default::default()
        };
        let server = test_server(client);

        let cases = vec!["tos://b/k.txt", "tos://b/k.bin"];
        for uri in cases {
            let payload = server.read_resource_payload(uri).await.unwrap();
            assert_eq!(payload, "aGk=", "failed for case: {}", uri);
        }
    }

    #[tokio::test]
    async fn test_read_resource_payload_rejects_foreign_scheme() {
        let client = MockClient::default();
        let calls = client.get_object_calls.clone();
        let server = test_server(client);

        let result = server.read_resource_payload("http://b/k").await;
        assert!(matches!(result, Err(model::error::TosError::InvalidUri)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_read_resource_payload_not_found() {
        let server = test_server(MockClient::default());

        let result = server.read_resource_payload("tos://b/missing.txt").await;
        assert!(matches!(
            result,
            Err(model::error::TosError::NotFound { .. })
        ));
    }

    #[test]
    fn test_tool_catalog() {
        let tools = TosServer::tool_catalog();

        let names: Vec<&str> = tools.iter().map(|t| t.name.as_ref()).collect();
        assert_eq!(names, vec!["ListBuckets", "ListObjectsV2", "GetObject"]);

        let get_object = &tools[2];
        let required = get_object.input_schema.get("required").unwrap();
        assert_eq!(required, &json!(["Bucket", "Key"]));
    }

    #[tokio::test]
    async fn test_tool_text_list_buckets() {
        let client = MockClient {
            buckets: vec![
                model::object::TosBucket {
                    name: "alpha".to_string(),
                },
                model::object::TosBucket {
                    name: "beta".to_string(),
                },
            ],
            ..Default::default()
        };
        let server = test_server(client);

        let text = server.tool_text("ListBuckets", JsonObject::new()).await;
        assert_eq!(text, "[\"alpha\", \"beta\"]");
    }

    #[tokio::test]
    async fn test_tool_text_get_object() {
        let client = MockClient {
            content: [("data/greeting.txt".to_string(), fetched(b"hello"))]
                .into_iter()
                .collect(),
            ..Default::default()
        };
        let server = test_server(client);

        let text = server
            .tool_text(
                "GetObject",
                args(json!({"Bucket": "data", "Key": "greeting.txt"})),
            )
            .await;
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn test_tool_text_list_objects() {
        let client = MockClient {
            objects: [(
                "data".to_string(),
                vec![object("reports/q1.csv"), object("reports/q2.csv")],
            )]
            .into_iter()
            .collect(),
            ..Default::default()
        };
        let server = test_server(client);

        let text = server
            .tool_text("ListObjectsV2", args(json!({"Bucket": "data"})))
            .await;
        assert!(
            text.contains("reports/q1.csv") && text.contains("reports/q2.csv"),
            "unexpected listing payload: {}",
            text
        );

        // a listing without the required bucket argument is swallowed too
        let text = server.tool_text("ListObjectsV2", args(json!({}))).await;
        assert!(
            text.starts_with("Error: "),
            "expected error payload, got: {}",
            text
        );
    }

    #[tokio::test]
    async fn test_tool_text_failures_become_error_payloads() {
        let client = MockClient {
            content: [("data/raw".to_string(), fetched(&[0xff, 0xfe]))]
                .into_iter()
                .collect(),
            ..Default::default()
        };
        let server = test_server(client);

        let cases = vec![
            (
                "Nonexistent",
                args(json!({})),
                "Error: Unsupported operation",
            ),
            (
                "GetObject",
                args(json!({"Bucket": "data", "Key": "missing"})),
                "Error: Object missing not found in data",
            ),
        ];

        for (name, tool_args, expected) in cases {
            let text = server.tool_text(name, tool_args).await;
            assert_eq!(text, expected, "failed for case: {}", name);
        }

        // invalid utf-8 body is swallowed the same way
        let text = server
            .tool_text("GetObject", args(json!({"Bucket": "data", "Key": "raw"})))
            .await;
        assert!(
            text.starts_with("Error: "),
            "expected error payload, got: {}",
            text
        );

        // malformed arguments as well
        let text = server.tool_text("GetObject", args(json!({}))).await;
        assert!(
            text.starts_with("Error: "),
            "expected error payload, got: {}",
            text
        );
    }
}
