// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Depth-first walk over a repository's contents, yielding decoded files
//! whose path ends in one of the requested extensions.
//!
//! The walk is a lazy [`Stream`]: nothing is fetched until it is polled, and
//! dropping it stops further requests. It is not resumable; callers that need
//! a second pass start again from the root.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures::Stream;
use tracing::{debug, warn};

use crate::client::GithubApi;
use crate::error::GithubAppError;
use crate::types::{ContentEntry, EntryKind, RepoContents, RepoFile};

/// True if `path` ends with any non-empty extension.
pub fn matches_extension(path: &str, extensions: &[String]) -> bool {
	extensions
		.iter()
		.any(|ext| !ext.is_empty() && path.ends_with(ext.as_str()))
}

/// Walk `owner/repo` from `path` (`""` for the root).
///
/// Sparse entries (no path or type) are skipped. A directory or file that
/// cannot be fetched is yielded as an `Err` and the walk carries on, except
/// when the starting path itself cannot be listed, which ends the stream.
pub fn collect<'a, A>(
	api: &'a A,
	owner: &'a str,
	repo: &'a str,
	path: &str,
	extensions: &'a [String],
) -> impl Stream<Item = Result<RepoFile, GithubAppError>> + 'a
where
	A: GithubApi + ?Sized,
{
	let root = path.trim_matches('/').to_string();

	async_stream::stream! {
		let mut pending = vec![root.clone()];

		while let Some(dir) = pending.pop() {
			let listing = match api.get_contents(owner, repo, &dir).await {
				Ok(listing) => listing,
				Err(e) if dir == root => {
					warn!(owner, repo, path = %dir, error = %e, "Cannot list walk root");
					yield Err(e);
					return;
				}
				Err(e) => {
					warn!(owner, repo, path = %dir, error = %e, "Skipping unreadable directory");
					yield Err(e);
					continue;
				}
			};

			let entries = match listing {
				RepoContents::Dir(entries) => entries,
				RepoContents::File(entry) => vec![Some(entry)],
			};

			let mut subdirs = Vec::new();
			for entry in entries.into_iter().flatten() {
				let (Some(entry_path), Some(kind)) = (entry.path.clone(), entry.kind) else {
					debug!(owner, repo, dir = %dir, "Skipping entry without path or type");
					continue;
				};

				match kind {
					EntryKind::Dir => subdirs.push(entry_path),
					EntryKind::File if matches_extension(&entry_path, extensions) => {
						yield fetch_file(api, owner, repo, &entry_path, entry).await;
					}
					_ => {}
				}
			}

			// Reverse so the first listed subdirectory is explored first.
			pending.extend(subdirs.into_iter().rev());
		}
	}
}

async fn fetch_file<A>(
	api: &A,
	owner: &str,
	repo: &str,
	path: &str,
	listed: ContentEntry,
) -> Result<RepoFile, GithubAppError>
where
	A: GithubApi + ?Sized,
{
	// Directory listings omit content; single-file responses carry it.
	let entry = if listed.content.is_some() {
		listed
	} else {
		match api.get_contents(owner, repo, path).await? {
			RepoContents::File(entry) => entry,
			RepoContents::Dir(_) => {
				return Err(GithubAppError::InvalidResponse(format!(
					"{path} was listed as a file but returned a directory"
				)))
			}
		}
	};

	let content = decode_content(path, &entry)?;
	debug!(path, bytes = content.len(), "Fetched repository file");
	Ok(RepoFile {
		path: path.to_string(),
		content,
	})
}

fn decode_content(path: &str, entry: &ContentEntry) -> Result<Vec<u8>, GithubAppError> {
	match entry.encoding.as_deref() {
		None | Some("base64") => {}
		Some(other) => {
			return Err(GithubAppError::InvalidResponse(format!(
				"{path} has unsupported encoding '{other}'"
			)))
		}
	}

	let raw = entry.content.as_deref().unwrap_or_default();
	let compact: String = raw.chars().filter(|c| !c.is_ascii_whitespace()).collect();
	STANDARD
		.decode(compact)
		.map_err(|e| GithubAppError::InvalidResponse(format!("{path} is not valid base64: {e}")))
}
