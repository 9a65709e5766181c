//! A synchronous `Runtime` that runs blocking-pool jobs immediately on the
//! calling thread. Used by unit tests and the scenario tests in `tests/`,
//! and suitable for hosts that already run single-threaded.
//!
//! `post_to_event_loop` jobs are queued rather than run immediately, same as
//! `ThreadPoolRuntime`: a `submit_blocking` job dispatched from inside
//! `Connection::dispatch_delegated_tasks` ends by posting a resume closure
//! that re-locks the very `Mutex<Connection>` the original call is still
//! holding on this thread's stack, so running it synchronously here would
//! deadlock against `std::sync::Mutex`'s non-reentrancy. Call `drain_posted`
//! once the outer call has returned (and so the lock released) to run it.

use std::collections::VecDeque;
use std::sync::Mutex;

use super::{DomainTag, Job, Runtime};

#[derive(Default)]
pub struct InlineRuntime {
    posted: Mutex<VecDeque<(Job, Option<DomainTag>)>>,
    current_domain: Mutex<Option<DomainTag>>,
}

impl InlineRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every job posted back to the event loop since the last drain.
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

impl Runtime for InlineRuntime {
    fn submit_blocking(&self, job: Job) {
        job();
    }

    fn post_to_event_loop(&self, job: Job, domain_tag: Option<DomainTag>) {
        self.posted.lock().unwrap().push_back((job, domain_tag));
    }

    fn current_domain_tag(&self) -> Option<DomainTag> {
        self.current_domain.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn jobs_run_synchronously() {
        let rt = InlineRuntime::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c2 = count.clone();
        rt.submit_blocking(Box::new(move || { c2.fetch_add(1, Ordering::SeqCst); }));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn posted_jobs_wait_for_drain() {
        let rt = InlineRuntime::new();
        let done = Arc::new(AtomicUsize::new(0));
        let d2 = done.clone();
        rt.post_to_event_loop(Box::new(move || { d2.fetch_add(1, Ordering::SeqCst); }), None);
        assert_eq!(done.load(Ordering::SeqCst), 0);
        rt.drain_posted();
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
