//! Directory listing with canonical absolute paths.
//!
//! The listing endpoint reports entry paths either fully qualified or
//! relative to the listed directory, depending on the backend. Every node
//! handed out here carries a `/`-rooted path with no duplicate slashes and
//! no `.`/`..` segments, whichever convention the backend used.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::sync::Arc;

use crate::error::NetworkError;
use crate::gateway::HttpGateway;
use crate::models::{ApiFileEntry, ApiFileListResponse, DirectoryNode, ListRequest};

pub struct DirectoryService {
    gateway: Arc<HttpGateway>,
}

impl DirectoryService {
    pub fn new(gateway: Arc<HttpGateway>) -> Self {
        Self { gateway }
    }

    pub async fn list(&self, path: &str) -> Result<Vec<DirectoryNode>, NetworkError> {
        let path = normalize_path(path);
        tracing::debug!("Listing directory {}", path);

        let response: ApiFileListResponse = self
            .gateway
            .post("/files/list", &ListRequest { path: path.clone() })
            .await?;

        let parent = if response.path.trim().is_empty() {
            path
        } else {
            response.path.clone()
        };
        let nodes: Vec<DirectoryNode> = response
            .entries
            .iter()
            .map(|entry| to_node(entry, &parent))
            .collect();

        tracing::debug!(
            "Found {} entries in {} ({} files, {} directories)",
            nodes.len(),
            parent,
            response.total_files,
            response.total_directories
        );
        Ok(nodes)
    }
}

pub(crate) fn to_node(entry: &ApiFileEntry, parent: &str) -> DirectoryNode {
    let raw = if entry.path.trim().is_empty() {
        entry.name.as_str()
    } else {
        entry.path.as_str()
    };

    DirectoryNode {
        name: entry.name.clone(),
        path: normalize_path(&build_full_path(raw, parent)),
        is_directory: entry.directory,
        size: entry.size,
        modified_at: entry.modified_at.as_deref().and_then(parse_timestamp),
        mime_type: entry.mime_type.clone(),
    }
}

/// Absolute path for an entry listed under `parent_path`.
///
/// Absolute entry paths pass through unchanged. Relative ones are joined to
/// the parent unless they already start with it.
pub fn build_full_path(entry_path: &str, parent_path: &str) -> String {
    if entry_path.starts_with('/') {
        return entry_path.to_string();
    }

    let parent = parent_path.trim_matches('/');
    let already_prefixed = !parent.is_empty()
        && (entry_path == parent || entry_path.starts_with(&format!("{}/", parent)));

    let joined = if already_prefixed || parent.is_empty() {
        format!("/{}", entry_path)
    } else {
        format!("/{}/{}", parent, entry_path)
    };
    collapse_slashes(&joined)
}

/// `/`-rooted, no duplicate or trailing slashes, `.` and `..` resolved
pub fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

/// parent directory of a normalized path; the root is its own parent
pub fn parent_path(path: &str) -> String {
    let normalized = normalize_path(path);
    match normalized.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(pos) => normalized[..pos].to_string(),
    }
}

fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    out
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
