//! Background snap dispatcher.
//!
//! Accepts unbounded bursts of capture jobs without blocking the caller
//! while keeping at most `max_in_flight` snap calls running at once (the
//! backend fans each snap out into several sequential upstream calls, so
//! the cap respects provider rate limits).
//!
//! Admission is strict FIFO: the job that has waited longest always claims
//! the next free slot. Completion order is whatever the network delivers.
//! Each resolution immediately pumps the pending queue again, so the
//! pipeline drains itself without an external poller.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::adapters::SnapService;
use crate::domain::GpsFix;
use crate::queue::QueueHandle;

/// Default cap on concurrent snap calls.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 2;

/// A job waiting for a concurrency slot.
struct PendingJob {
    id: Uuid,
    image: Arc<Vec<u8>>,
    locale: String,
    gps: Option<GpsFix>,
}

#[derive(Default)]
struct DispatchState {
    pending: VecDeque<PendingJob>,
    in_flight: usize,
}

/// Cheaply cloneable dispatcher over the shared queue.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    queue: QueueHandle,
    service: Arc<dyn SnapService>,
    max_in_flight: usize,
    state: Mutex<DispatchState>,
}

impl Dispatcher {
    pub fn new(queue: QueueHandle, service: Arc<dyn SnapService>, max_in_flight: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue,
                service,
                max_in_flight: max_in_flight.max(1),
                state: Mutex::new(DispatchState::default()),
            }),
        }
    }

    /// Enqueue a capture and schedule it for background processing.
    ///
    /// Returns the queue item id immediately; this never waits on network
    /// I/O. The item is visible in the queue as `pending` before this
    /// returns.
    pub fn dispatch(
        &self,
        image: Arc<Vec<u8>>,
        locale: impl Into<String>,
        gps: Option<GpsFix>,
    ) -> Uuid {
        let locale = locale.into();
        let id = self.inner.queue.enqueue(image.clone(), locale.clone(), gps);

        {
            let mut state = self.inner.state.lock().expect("dispatch lock poisoned");
            state.pending.push_back(PendingJob {
                id,
                image,
                locale,
                gps,
            });
        }

        self.pump();
        id
    }

    /// Admit pending jobs while slots are free.
    fn pump(&self) {
        loop {
            let job = {
                let mut state = self.inner.state.lock().expect("dispatch lock poisoned");
                if state.in_flight >= self.inner.max_in_flight {
                    return;
                }
                let Some(job) = state.pending.pop_front() else {
                    return;
                };
                state.in_flight += 1;
                job
            };

            debug!(id = %job.id, "admitting snap job");
            self.inner.queue.mark_processing(job.id);

            let dispatcher = self.clone();
            tokio::spawn(async move {
                dispatcher.run_job(job).await;
            });
        }
    }

    async fn run_job(&self, job: PendingJob) {
        let outcome = self
            .inner
            .service
            .snap(&job.image, job.gps, &job.locale)
            .await;

        match outcome {
            Ok(result) => {
                self.inner.queue.mark_ready(job.id, Arc::new(result));
            }
            Err(e) => {
                // Isolated to this job; siblings keep flowing.
                warn!(id = %job.id, error = %e, "snap failed");
                self.inner.queue.mark_failed(job.id, e.to_string());
            }
        }

        {
            let mut state = self.inner.state.lock().expect("dispatch lock poisoned");
            state.in_flight -= 1;
        }

        // Freed a slot: admit the next pending job, if any.
        self.pump();
    }

    /// Number of snap calls currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inner.state.lock().expect("dispatch lock poisoned").in_flight
    }

    /// Number of jobs waiting for a slot.
    pub fn pending_len(&self) -> usize {
        self.inner.state.lock().expect("dispatch lock poisoned").pending.len()
    }

    /// The queue this dispatcher feeds.
    pub fn queue(&self) -> &QueueHandle {
        &self.inner.queue
    }
}
