//! Default `Runtime` backing: a fixed pool of blocking worker threads plus
//! a posted-job queue representing the single-threaded event-loop context.
//!
//! The event loop itself is external to this crate (per the spec, "the
//! thread pool and event-loop runtime" is an out-of-scope collaborator); a
//! host embedding this adapter is expected to call [`ThreadPoolRuntime::drain_posted`]
//! from its own loop tick. `submit_blocking` jobs run truly in the
//! background on worker threads, mirroring the pack's `work_stealing`
//! executor but trimmed to plain job dispatch (no futures) since the
//! adapter only ever offloads "drain delegated tasks, then repost").

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use super::{DomainTag, Job, Runtime};

struct Shared {
    queue: Mutex<VecDeque<Job>>,
    cond: Condvar,
    shutdown: Mutex<bool>,
}

/// Thread-pool-backed `Runtime`.
pub struct ThreadPoolRuntime {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    posted: Mutex<VecDeque<(Job, Option<DomainTag>)>>,
    current_domain: Mutex<Option<DomainTag>>,
}

impl ThreadPoolRuntime {
    /// Spawn `num_workers` blocking threads (0 picks a default based on
    /// available parallelism, same fallback the pack's executor uses).
    pub fn new(num_workers: usize) -> Self {
        let num_workers = if num_workers == 0 {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
        } else {
            num_workers
        };

        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            cond: Condvar::new(),
            shutdown: Mutex::new(false),
        });

        let mut workers = Vec::with_capacity(num_workers);
        for index in 0..num_workers {
            let shared = shared.clone();
            let handle = thread::Builder::new()
                .name(format!("tls-adapter-blocking-{index}"))
                .spawn(move || Self::worker_loop(shared))
                .expect("failed to spawn blocking worker thread");
            workers.push(handle);
        }

        Self {
            shared,
            workers,
            posted: Mutex::new(VecDeque::new()),
            current_domain: Mutex::new(None),
        }
    }

    fn worker_loop(shared: Arc<Shared>) {
        loop {
            let mut queue = shared.queue.lock().unwrap();
            loop {
                if let Some(job) = queue.pop_front() {
                    drop(queue);
                    job();
                    break;
                }
                if *shared.shutdown.lock().unwrap() {
                    return;
                }
                queue = shared.cond.wait(queue).unwrap();
            }
        }
    }

    /// Run every job posted back to the event loop since the last drain.
    /// A host's own event-loop tick calls this to deliver resumed
    /// encode-loop invocations after a delegated task finishes.
    pub fn drain_posted(&self) {
        loop {
            let next = self.posted.lock().unwrap().pop_front();
            match next {
                Some((job, tag)) => {
                    *self.current_domain.lock().unwrap() = tag;
                    job();
                }
                None => break,
            }
        }
        *self.current_domain.lock().unwrap() = None;
    }
}

impl Runtime for ThreadPoolRuntime {
    fn submit_blocking(&self, job: Job) {
        self.shared.queue.lock().unwrap().push_back(job);
        self.shared.cond.notify_one();
    }

    fn post_to_event_loop(&self, job: Job, domain_tag: Option<DomainTag>) {
        self.posted.lock().unwrap().push_back((job, domain_tag));
    }

    fn current_domain_tag(&self) -> Option<DomainTag> {
        self.current_domain.lock().unwrap().clone()
    }
}

impl Drop for ThreadPoolRuntime {
    fn drop(&mut self) {
        *self.shared.shutdown.lock().unwrap() = true;
        self.shared.cond.notify_all();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}
