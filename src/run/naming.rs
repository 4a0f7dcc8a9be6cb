//! Container naming.
//!
//! Names are always `dojo-` + a cleaned model identifier + a timestamp, so
//! every run gets a unique, engine-legal name. The prefix is applied
//! unconditionally.

/// `%Y%m%d%H%M%S` stamp for the current local time.
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d%H%M%S").to_string()
}

/// Derive the container name for one run. The model name is lower-cased with
/// punctuation and whitespace stripped; when only a version id is known, its
/// last 12 characters stand in for the name.
pub fn container_name(model_name: Option<&str>, version: Option<&str>, stamp: &str) -> String {
    let base: String = match model_name {
        Some(name) => name
            .to_lowercase()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect(),
        None => {
            let version = version.unwrap_or_default();
            let chars: Vec<char> = version.chars().collect();
            let tail = chars.len().saturating_sub(12);
            chars[tail..].iter().collect()
        }
    };
    format!("dojo-{base}{stamp}")
}
