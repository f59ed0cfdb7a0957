// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wire types for the GitHub REST endpoints Sentinel calls.

use serde::{Deserialize, Serialize};

/// Response of `POST /app/installations/{id}/access_tokens`.
#[derive(Debug, Deserialize)]
pub(crate) struct AccessTokenResponse {
	pub token: String,
	/// RFC 3339 timestamp.
	pub expires_at: String,
}

/// The `type` of a contents entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
	File,
	Dir,
	Symlink,
	Submodule,
	#[serde(other)]
	Other,
}

/// One entry from the contents API.
///
/// Every field is optional: GitHub occasionally returns sparse entries and a
/// walk must skip them rather than abort.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentEntry {
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub path: Option<String>,
	#[serde(default)]
	pub sha: Option<String>,
	#[serde(default)]
	pub size: Option<u64>,
	#[serde(default, rename = "type")]
	pub kind: Option<EntryKind>,
	/// Base64 with embedded newlines; only present on single-file responses.
	#[serde(default)]
	pub content: Option<String>,
	#[serde(default)]
	pub encoding: Option<String>,
}

impl ContentEntry {
	pub fn file(path: impl Into<String>) -> Self {
		let path = path.into();
		Self {
			name: path.rsplit('/').next().map(str::to_string),
			path: Some(path),
			kind: Some(EntryKind::File),
			..Self::default()
		}
	}

	pub fn dir(path: impl Into<String>) -> Self {
		Self {
			kind: Some(EntryKind::Dir),
			..Self::file(path)
		}
	}

	pub fn with_content(mut self, base64: impl Into<String>) -> Self {
		self.content = Some(base64.into());
		self.encoding = Some("base64".to_string());
		self
	}
}

/// `GET /repos/{owner}/{repo}/contents/{path}` answers with an object for a
/// file and an array for a directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RepoContents {
	Dir(Vec<Option<ContentEntry>>),
	File(ContentEntry),
}

/// One changed file in a pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestFile {
	pub filename: String,
	/// `added`, `removed`, `modified`, `renamed`, ...
	pub status: String,
	#[serde(default)]
	pub sha: Option<String>,
	#[serde(default)]
	pub additions: u64,
	#[serde(default)]
	pub deletions: u64,
	#[serde(default)]
	pub changes: u64,
}

impl PullRequestFile {
	pub fn is_removed(&self) -> bool {
		self.status == "removed"
	}
}

/// A file yielded by the content walker, already decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoFile {
	pub path: String,
	pub content: Vec<u8>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn directory_listing_parses_as_dir_and_tolerates_nulls() {
		let json = r#"[
			{"name": "main.tf", "path": "main.tf", "type": "file", "size": 12},
			null,
			{"name": "modules", "path": "modules", "type": "dir"},
			{"name": "weird", "path": "weird", "type": "something-new"},
			{}
		]"#;
		let RepoContents::Dir(entries) = serde_json::from_str(json).unwrap() else {
			panic!("expected a directory listing");
		};
		assert_eq!(entries.len(), 5);
		assert!(entries[1].is_none());
		assert_eq!(entries[2].as_ref().unwrap().kind, Some(EntryKind::Dir));
		assert_eq!(entries[3].as_ref().unwrap().kind, Some(EntryKind::Other));
		assert!(entries[4].as_ref().unwrap().path.is_none());
	}

	#[test]
	fn single_file_parses_as_file() {
		let json = r#"{"name": "vpc.tf", "path": "b/vpc.tf", "type": "file",
			"encoding": "base64", "content": "cmVzb3VyY2U=\n"}"#;
		let RepoContents::File(entry) = serde_json::from_str(json).unwrap() else {
			panic!("expected a file");
		};
		assert_eq!(entry.path.as_deref(), Some("b/vpc.tf"));
		assert_eq!(entry.content.as_deref(), Some("cmVzb3VyY2U=\n"));
	}

	#[test]
	fn entry_builders_set_name_and_kind() {
		let dir = ContentEntry::dir("a/b");
		assert_eq!(dir.name.as_deref(), Some("b"));
		assert_eq!(dir.kind, Some(EntryKind::Dir));
		assert_eq!(ContentEntry::file("x.tf").kind, Some(EntryKind::File));
	}
}
