// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Follow-up repository scanning.
//!
//! Webhook handlers must answer quickly, so anything that talks to the GitHub
//! API after an event is pushed onto a bounded queue and run in the
//! background. At most `max_concurrent` jobs run at once; the rest wait in
//! the queue, and a full queue drops the job instead of blocking the caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use sentinel_server_github_app::walker::{self, matches_extension};
use sentinel_server_github_app::{ClientProvider, GithubAppError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanJob {
	/// Walk a whole repository from its root.
	Repository {
		installation_id: i64,
		owner: String,
		repo: String,
	},
	/// Inspect the files touched by one pull request.
	PullRequest {
		installation_id: i64,
		owner: String,
		repo: String,
		number: u64,
	},
}

impl ScanJob {
	pub fn installation_id(&self) -> i64 {
		match self {
			ScanJob::Repository {
				installation_id, ..
			}
			| ScanJob::PullRequest {
				installation_id, ..
			} => *installation_id,
		}
	}

	pub fn kind(&self) -> &'static str {
		match self {
			ScanJob::Repository { .. } => "repository",
			ScanJob::PullRequest { .. } => "pull_request",
		}
	}

	fn full_name(&self) -> String {
		match self {
			ScanJob::Repository { owner, repo, .. } | ScanJob::PullRequest { owner, repo, .. } => {
				format!("{owner}/{repo}")
			}
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScannedFile {
	pub path: String,
	/// Decoded size; `None` when the file was not downloaded.
	pub size: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
	pub files: Vec<ScannedFile>,
	/// Directories or files that could not be read.
	pub errors: usize,
}

impl ScanReport {
	pub fn total_bytes(&self) -> usize {
		self.files.iter().filter_map(|f| f.size).sum()
	}
}

#[async_trait]
pub trait ScanRunner: Send + Sync {
	async fn run(&self, job: &ScanJob) -> Result<ScanReport, GithubAppError>;
}

/// Runs scans against GitHub with installation-scoped clients.
pub struct GithubScanner {
	clients: Arc<dyn ClientProvider>,
	extensions: Vec<String>,
}

impl GithubScanner {
	pub fn new(clients: Arc<dyn ClientProvider>, extensions: Vec<String>) -> Self {
		Self {
			clients,
			extensions,
		}
	}
}

#[async_trait]
impl ScanRunner for GithubScanner {
	async fn run(&self, job: &ScanJob) -> Result<ScanReport, GithubAppError> {
		let api = self.clients.client_for(job.installation_id()).await?;
		let mut report = ScanReport::default();

		match job {
			ScanJob::Repository { owner, repo, .. } => {
				let stream = walker::collect(api.as_ref(), owner, repo, "", &self.extensions);
				futures::pin_mut!(stream);
				while let Some(item) = stream.next().await {
					match item {
						Ok(file) => report.files.push(ScannedFile {
							size: Some(file.content.len()),
							path: file.path,
						}),
						Err(e) => {
							debug!(error = %e, "scan item failed");
							report.errors += 1;
						}
					}
				}
			}
			ScanJob::PullRequest {
				owner,
				repo,
				number,
				..
			} => {
				let files = api.list_pull_request_files(owner, repo, *number).await?;
				report.files = files
					.into_iter()
					.filter(|f| !f.is_removed() && matches_extension(&f.filename, &self.extensions))
					.map(|f| ScannedFile {
						path: f.filename,
						size: None,
					})
					.collect();
			}
		}

		Ok(report)
	}
}

/// Bounded background queue for [`ScanJob`]s.
#[derive(Clone)]
pub struct ScanService {
	tx: mpsc::Sender<ScanJob>,
}

impl ScanService {
	/// Start the background task. Must be called inside a tokio runtime.
	pub fn spawn(
		runner: Arc<dyn ScanRunner>,
		queue_capacity: usize,
		max_concurrent: usize,
		job_timeout: Duration,
	) -> Self {
		let (tx, rx) = mpsc::channel(queue_capacity.max(1));
		let permits = Arc::new(Semaphore::new(max_concurrent.max(1)));
		tokio::spawn(Self::background_task(rx, runner, permits, job_timeout));
		Self { tx }
	}

	/// A job leaves the queue only once a run slot is free, so a backlog
	/// fills the channel and `submit` starts dropping.
	async fn background_task(
		mut rx: mpsc::Receiver<ScanJob>,
		runner: Arc<dyn ScanRunner>,
		permits: Arc<Semaphore>,
		job_timeout: Duration,
	) {
		loop {
			let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
				break;
			};
			let Some(job) = rx.recv().await else {
				break;
			};
			let runner = Arc::clone(&runner);
			tokio::spawn(async move {
				run_job(runner.as_ref(), &job, job_timeout).await;
				drop(permit);
			});
		}
		debug!("scan queue closed");
	}

	/// Queue a job without waiting. Returns `false` if it was dropped.
	#[instrument(skip(self, job), fields(kind = job.kind(), installation_id = job.installation_id()))]
	pub fn submit(&self, job: ScanJob) -> bool {
		match self.tx.try_send(job) {
			Ok(()) => true,
			Err(TrySendError::Full(job)) => {
				warn!(repository = %job.full_name(), "scan queue full, dropping job");
				false
			}
			Err(TrySendError::Closed(job)) => {
				warn!(repository = %job.full_name(), "scan queue closed, dropping job");
				false
			}
		}
	}
}

async fn run_job(runner: &dyn ScanRunner, job: &ScanJob, job_timeout: Duration) {
	let repository = job.full_name();
	match tokio::time::timeout(job_timeout, runner.run(job)).await {
		Ok(Ok(report)) => info!(
			kind = job.kind(),
			installation_id = job.installation_id(),
			repository = %repository,
			matched = report.files.len(),
			bytes = report.total_bytes(),
			errors = report.errors,
			"scan finished"
		),
		Ok(Err(e)) => warn!(
			kind = job.kind(),
			installation_id = job.installation_id(),
			repository = %repository,
			error = %e,
			"scan failed"
		),
		Err(_) => warn!(
			kind = job.kind(),
			installation_id = job.installation_id(),
			repository = %repository,
			timeout_secs = job_timeout.as_secs(),
			"scan timed out"
		),
	}
}
