/// Extensions (lowercase, without the dot) accepted as input images.
const SUPPORTED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Lowercased extension of the last path segment of an object key.
///
/// Directory markers (`photos/`) have none.
pub fn extension(key: &str) -> Option<String> {
    let name = key.rsplit('/').next().unwrap_or(key);
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Whether an object key denotes a supported input image.
pub fn is_candidate(key: &str) -> bool {
    extension(key).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}
