// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Jobs and their documents.
//
// State changes that move a job between the active and completed queues are
// made by the owning printer while it holds its write lock; the job's own
// lock only protects the job's fields.  Cancellation and suspension are
// atomic flags so any thread can raise them without locking.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

use druckwerk_core::types::{DocumentFormat, JobId, JobState};
use druckwerk_raster::{JobInfo, JobProgress, PrintRequest};

use crate::spool::{SpooledFile, remove_spool_file};

/// One spooled document of a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub format: DocumentFormat,
    pub path: PathBuf,
    pub bytes: u64,
    pub sha256: String,
    pub state: JobState,
    /// Per-document attribute overrides.
    #[serde(skip)]
    pub request: PrintRequest,
}

impl Document {
    pub fn new(format: DocumentFormat, spooled: SpooledFile, request: PrintRequest) -> Self {
        Self {
            format,
            path: spooled.path,
            bytes: spooled.bytes,
            sha256: spooled.sha256,
            state: JobState::Pending,
            request,
        }
    }
}

#[derive(Debug)]
pub(crate) struct JobInner {
    pub(crate) state: JobState,
    pub(crate) documents: Vec<Document>,
    /// False until the last document has been received.
    pub(crate) complete: bool,
    pub(crate) created: DateTime<Utc>,
    pub(crate) processing: Option<DateTime<Utc>>,
    pub(crate) completed: Option<DateTime<Utc>>,
    pub(crate) impressions: u32,
    pub(crate) impressions_completed: u32,
    pub(crate) copies_completed: u32,
    pub(crate) message: Option<String>,
}

/// A print job owned by one printer.
#[derive(Debug)]
pub struct Job {
    id: JobId,
    printer: String,
    name: String,
    username: String,
    request: PrintRequest,
    canceled: AtomicBool,
    suspended: AtomicBool,
    inner: RwLock<JobInner>,
}

/// Point-in-time view of a job, as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobAttributes {
    pub id: JobId,
    pub printer: String,
    pub name: String,
    pub username: String,
    pub state: JobState,
    pub state_keyword: &'static str,
    pub state_message: Option<String>,
    pub documents: Vec<Document>,
    pub created: DateTime<Utc>,
    pub processing: Option<DateTime<Utc>>,
    pub completed: Option<DateTime<Utc>>,
    pub impressions: u32,
    pub impressions_completed: u32,
    pub copies_completed: u32,
    pub cancel_requested: bool,
}

impl Job {
    pub(crate) fn new(
        id: JobId,
        printer: &str,
        name: &str,
        username: &str,
        request: PrintRequest,
    ) -> Self {
        Self {
            id,
            printer: printer.to_string(),
            name: if name.is_empty() { "untitled".into() } else { name.to_string() },
            username: username.to_string(),
            request,
            canceled: AtomicBool::new(false),
            suspended: AtomicBool::new(false),
            inner: RwLock::new(JobInner {
                state: JobState::Held,
                documents: Vec::new(),
                complete: false,
                created: Utc::now(),
                processing: None,
                completed: None,
                impressions: 0,
                impressions_completed: 0,
                copies_completed: 0,
                message: None,
            }),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn printer(&self) -> &str {
        &self.printer
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn request(&self) -> &PrintRequest {
        &self.request
    }

    pub fn state(&self) -> JobState {
        self.read().state
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn documents(&self) -> Vec<Document> {
        self.read().documents.clone()
    }

    pub fn info(&self) -> JobInfo {
        JobInfo {
            id: self.id,
            name: self.name.clone(),
            username: self.username.clone(),
            printer: self.printer.clone(),
        }
    }

    pub fn attributes(&self) -> JobAttributes {
        let inner = self.read();
        JobAttributes {
            id: self.id,
            printer: self.printer.clone(),
            name: self.name.clone(),
            username: self.username.clone(),
            state: inner.state,
            state_keyword: inner.state.keyword(),
            state_message: inner.message.clone(),
            documents: inner.documents.clone(),
            created: inner.created,
            processing: inner.processing,
            completed: inner.completed,
            impressions: inner.impressions,
            impressions_completed: inner.impressions_completed,
            copies_completed: inner.copies_completed,
            cancel_requested: self.canceled.load(Ordering::SeqCst),
        }
    }

    pub(crate) fn request_cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    pub(crate) fn set_suspend(&self, suspend: bool) {
        self.suspended.store(suspend, Ordering::SeqCst);
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, JobInner> {
        self.inner.read().expect("job lock poisoned")
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, JobInner> {
        self.inner.write().expect("job lock poisoned")
    }

    /// Record a state change with its timestamps.
    pub(crate) fn set_state(&self, state: JobState, message: Option<String>) {
        let mut inner = self.write();
        inner.state = state;
        match state {
            JobState::Processing => inner.processing = Some(Utc::now()),
            s if s.is_terminal() => {
                inner.completed = Some(Utc::now());
                for doc in &mut inner.documents {
                    if !doc.state.is_terminal() {
                        doc.state = s;
                    }
                }
            }
            _ => {}
        }
        if message.is_some() {
            inner.message = message;
        }
    }

    /// Impressions the whole job will print, once the documents are known.
    pub(crate) fn set_impressions(&self, total: u32) {
        let mut inner = self.write();
        inner.impressions = total.max(inner.impressions_completed);
    }

    /// Delete this job's spool files.
    pub(crate) fn remove_files(&self) {
        for doc in &self.read().documents {
            remove_spool_file(&doc.path);
        }
    }
}

impl JobProgress for Job {
    fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    fn page_completed(&self, pages: u32) {
        let mut inner = self.write();
        inner.impressions_completed = pages;
        inner.impressions = inner.impressions.max(pages);
    }

    fn copy_completed(&self, copies: u32) {
        self.write().copies_completed = copies;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_jobs_are_held() {
        let job = Job::new(JobId(1), "lp", "", "alice", PrintRequest::default());
        assert_eq!(job.state(), JobState::Held);
        assert_eq!(job.name(), "untitled");
        assert!(job.read().processing.is_none());
    }

    #[test]
    fn terminal_state_stamps_completion() {
        let job = Job::new(JobId(2), "lp", "report", "alice", PrintRequest::default());
        job.set_state(JobState::Processing, None);
        assert!(job.attributes().processing.is_some());

        job.set_state(JobState::Aborted, Some("paper jam".into()));
        let attrs = job.attributes();
        assert_eq!(attrs.state_keyword, "aborted");
        assert_eq!(attrs.state_message.as_deref(), Some("paper jam"));
        assert!(attrs.completed.is_some());
    }

    #[test]
    fn flags_are_visible_through_progress() {
        let job = Job::new(JobId(3), "lp", "x", "bob", PrintRequest::default());
        assert!(!job.is_canceled());
        job.request_cancel();
        assert!(job.is_canceled());
        assert!(job.attributes().cancel_requested);

        job.set_suspend(true);
        assert!(job.is_suspended());

        job.page_completed(2);
        job.copy_completed(1);
        let attrs = job.attributes();
        assert_eq!((attrs.impressions_completed, attrs.copies_completed), (2, 1));
    }

    #[test]
    fn known_total_leads_completed_impressions() {
        let job = Job::new(JobId(4), "lp", "x", "bob", PrintRequest::default());
        job.set_impressions(6);
        job.page_completed(2);
        let attrs = job.attributes();
        assert_eq!((attrs.impressions, attrs.impressions_completed), (6, 2));

        // An unknown total never falls behind what was printed.
        let unknown = Job::new(JobId(5), "lp", "x", "bob", PrintRequest::default());
        unknown.page_completed(3);
        assert_eq!(unknown.attributes().impressions, 3);
    }
}
