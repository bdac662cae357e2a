//! Local file naming and remote grouping.
//!
//! ```
//! use core_archive::naming::sanitize_filename;
//!
//! assert_eq!(sanitize_filename("Test / Video?"), "Test _ Video_");
//! ```

use bridge_traits::media::CatalogItem;
use bridge_traits::remote::join_remote;

/// Longest sanitized title, in characters, before the id suffix.
pub const MAX_TITLE_CHARS: usize = 150;

const UNSAFE_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Folder used when an item has no usable publish date.
pub const UNDATED_FOLDER: &str = "undated";

fn replace_unsafe(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            if UNSAFE_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Makes `title` safe to use as a file name on every common filesystem.
///
/// Unsafe and control characters become `_`, whitespace runs collapse to one
/// space, and titles over [`MAX_TITLE_CHARS`] are cut at the last space that
/// fits (or hard-cut when there is none). Never returns an empty string.
pub fn sanitize_filename(title: &str) -> String {
    let replaced = replace_unsafe(title);
    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");

    let truncated = if collapsed.chars().count() > MAX_TITLE_CHARS {
        let head: String = collapsed.chars().take(MAX_TITLE_CHARS).collect();
        match head.rfind(' ') {
            Some(idx) if idx > 0 => head[..idx].to_string(),
            _ => head,
        }
    } else {
        collapsed
    };

    let trimmed = truncated.trim();
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// File stem for an item: `"{safe title} [{id}]"`.
pub fn output_stem(item: &CatalogItem) -> String {
    format!("{} [{}]", sanitize_filename(&item.title), replace_unsafe(&item.id))
}

/// Remote directory for an item: `[channel_folder/]YYYY`, or `undated`.
pub fn remote_subpath(channel_folder: Option<&str>, item: &CatalogItem) -> String {
    let year = item
        .publish_year()
        .map(|y| format!("{:04}", y))
        .unwrap_or_else(|| UNDATED_FOLDER.to_string());
    join_remote(&[channel_folder.unwrap_or_default(), &year])
}
