//! Dispatch loop: publishes due jobs on a fixed interval.
//!
//! Each cycle queries the store for due jobs, acquires one publisher (only if
//! something is due), and publishes jobs one at a time in schedule order.
//! A publish failure is recorded on its job and never stops the cycle.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{Error, PublishError};
use crate::jobs::Job;
use crate::publisher::{ExternalRef, PublishResponse, Publisher, PublisherSource};
use crate::store::JobStore;

/// Outcome of one dispatch cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Jobs that were due when the cycle started.
    pub due: usize,
    pub published: usize,
    pub failed: usize,
    /// Published, but the store could not record it. These jobs stay pending
    /// and may be posted again next cycle.
    pub unrecorded: usize,
}

enum Recorded {
    Stored,
    NotPending,
    StoreFailed,
}

/// Polls the store and publishes due jobs.
pub struct Dispatcher {
    store: Arc<dyn JobStore>,
    source: Arc<dyn PublisherSource>,
    interval: Duration,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn JobStore>,
        source: Arc<dyn PublisherSource>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            source,
            interval,
        }
    }

    /// Run a single cycle.
    ///
    /// Errors only when the due query fails or no publisher can be obtained;
    /// in both cases no job has been touched.
    pub async fn run_cycle(&self) -> Result<CycleReport, Error> {
        let due = self.store.get_due(Utc::now()).await?;
        if due.is_empty() {
            debug!("No jobs due");
            return Ok(CycleReport::default());
        }

        info!(count = due.len(), "Dispatching due jobs");
        let publisher = self.source.publisher().await?;

        let mut report = CycleReport {
            due: due.len(),
            ..Default::default()
        };
        for job in &due {
            match publish_job(publisher.as_ref(), job).await {
                Ok(response) => match self.record_published(job, &response).await {
                    Recorded::Stored => report.published += 1,
                    Recorded::StoreFailed => report.unrecorded += 1,
                    Recorded::NotPending => {}
                },
                Err(e) => {
                    if self.record_failed(job, &e).await {
                        report.failed += 1;
                    }
                }
            }
        }

        info!(
            due = report.due,
            published = report.published,
            failed = report.failed,
            unrecorded = report.unrecorded,
            "Dispatch cycle complete"
        );
        Ok(report)
    }

    async fn record_published(&self, job: &Job, response: &PublishResponse) -> Recorded {
        let external_ref = ExternalRef::resolve(response);
        match self
            .store
            .mark_published(job.id, external_ref.as_stored())
            .await
        {
            Ok(Some(_)) => {
                info!(job_id = %job.id, external_ref = external_ref.as_stored(), "Published");
                Recorded::Stored
            }
            Ok(None) => {
                warn!(job_id = %job.id, "Published, but job was no longer pending");
                Recorded::NotPending
            }
            Err(e) => {
                error!(
                    job_id = %job.id,
                    external_ref = external_ref.as_stored(),
                    error = %e,
                    "Published, but could not record it; job stays pending and may be posted twice"
                );
                Recorded::StoreFailed
            }
        }
    }

    async fn record_failed(&self, job: &Job, failure: &PublishError) -> bool {
        let message = failure.to_string();
        warn!(job_id = %job.id, error = %message, "Publish failed");
        match self.store.mark_failed(job.id, &message).await {
            Ok(Some(_)) => true,
            Ok(None) => {
                warn!(job_id = %job.id, "Publish failed, but job was no longer pending");
                false
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Could not record publish failure");
                false
            }
        }
    }

    /// Run cycles until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// A cycle in progress always finishes; the wait between cycles is
    /// interrupted as soon as shutdown is signalled.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "Dispatcher started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            if let Err(e) = self.run_cycle().await {
                error!(error = %e, "Dispatch cycle failed");
            }

            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("Dispatcher stopped");
    }
}

async fn publish_job(
    publisher: &dyn Publisher,
    job: &Job,
) -> Result<PublishResponse, PublishError> {
    match job.link_url() {
        Some(url) => {
            publisher
                .create_post_with_link(&job.content, url, job.visibility)
                .await
        }
        None => publisher.create_post(&job.content, job.visibility).await,
    }
}

/// Spawn the dispatch loop. Send `true` on the returned sender to stop it.
pub fn spawn_dispatcher(dispatcher: Dispatcher) -> (JoinHandle<()>, watch::Sender<bool>) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        dispatcher.run(shutdown_rx).await;
    });
    (handle, shutdown_tx)
}
