//! `rclone lsjson` output.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LsJsonEntry {
    pub path: String,
    #[serde(default)]
    pub name: String,
    /// `-1` when the backend cannot report a size.
    pub size: i64,
    #[serde(default)]
    pub is_dir: bool,
}
