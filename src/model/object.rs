use std::collections::HashMap;
use std::time::SystemTime;

#[derive(Clone, Debug)]
pub struct TosBucket {
    pub name: String,
}

#[derive(Clone, Debug)]
pub struct TosObject {
    pub key: String,
    pub size: i64,
    pub modified_time: SystemTime,
}

/// Fully buffered object content. Metadata keys are lowercased.
#[derive(Clone, Debug)]
pub struct FetchedObject {
    pub content_type: Option<String>,
    pub content: Vec<u8>,
    pub metadata: HashMap<String, String>,
}
