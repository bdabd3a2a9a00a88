use crate::model::error::TosError;

const TEXT_EXTENSIONS: [&str; 6] = [".txt", ".log", ".csv", ".json", ".xml", ".md"];

/// True iff the lowercased key carries one of the text-like extensions.
/// Advisory classification only; it never changes how content is encoded.
pub fn is_text_file(key: &str) -> bool {
    let key = key.to_lowercase();
    TEXT_EXTENSIONS.iter().any(|ext| key.ends_with(ext))
}

/// Split a `tos://<bucket>/<key>` URI into bucket and key. The key may
/// itself contain `/`; only the first separator is consumed.
pub fn parse_resource_uri(uri: &str) -> Result<(&str, &str), TosError> {
    let path = uri.strip_prefix("tos://").ok_or(TosError::InvalidUri)?;
    path.split_once('/').ok_or(TosError::InvalidUri)
}
