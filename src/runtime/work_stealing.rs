//! Optional work-stealing `Runtime` backing, enabled by the `work-stealing`
//! feature. Trimmed from the pack's `WorkStealingExecutor`/`Worker` pair
//! (which scheduled futures): this adapter only ever offloads "run these
//! delegated tasks, then repost to the event loop", so the job type here is
//! a plain closure rather than a polled future, and there is no injector
//! batch-stealing beyond what `submit_blocking` needs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_deque::{Injector, Steal, Stealer, Worker as CbWorker};
use parking::{Parker, Unparker};

use super::{DomainTag, Job, Runtime};
use std::collections::VecDeque;
use std::sync::Mutex;

struct WorkerHandle {
    thread: Option<JoinHandle<()>>,
    unparker: Unparker,
}

struct WorkerState {
    local: CbWorker<Job>,
    stealers: Vec<Stealer<Job>>,
    injector: Arc<Injector<Job>>,
    shutdown: Arc<AtomicBool>,
    parker: Parker,
}

impl WorkerState {
    fn run(self) {
        while !self.shutdown.load(Ordering::Relaxed) {
            match self.find_job() {
                Some(job) => job(),
                None => {
                    self.parker.park_timeout(Duration::from_millis(1));
                }
            }
        }
        self.drain();
    }

    fn find_job(&self) -> Option<Job> {
        if let Some(job) = self.local.pop() {
            return Some(job);
        }
        loop {
            match self.injector.steal_batch_and_pop(&self.local) {
                Steal::Success(job) => return Some(job),
                Steal::Empty => break,
                Steal::Retry => continue,
            }
        }
        if self.stealers.is_empty() {
            return None;
        }
        let start = fastrand::usize(..self.stealers.len());
        for i in 0..self.stealers.len() {
            let idx = (start + i) % self.stealers.len();
            loop {
                match self.stealers[idx].steal() {
                    Steal::Success(job) => return Some(job),
                    Steal::Empty => break,
                    Steal::Retry => continue,
                }
            }
        }
        None
    }

    fn drain(&self) {
        while let Some(job) = self.local.pop() {
            job();
        }
        loop {
            match self.injector.steal() {
                Steal::Success(job) => job(),
                Steal::Empty => break,
                Steal::Retry => continue,
            }
        }
    }
}

/// Work-stealing `Runtime`: a global injector for newly submitted jobs, plus
/// a per-worker local LIFO queue with stealing between siblings.
pub struct WorkStealingRuntime {
    injector: Arc<Injector<Job>>,
    workers: Vec<WorkerHandle>,
    shutdown: Arc<AtomicBool>,
    posted: Mutex<VecDeque<(Job, Option<DomainTag>)>>,
    current_domain: Mutex<Option<DomainTag>>,
}

impl WorkStealingRuntime {
    pub fn new(num_workers: usize) -> Self {
        let num_workers = if num_workers == 0 {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
        } else {
            num_workers
        };

        let injector = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let locals: Vec<CbWorker<Job>> = (0..num_workers).map(|_| CbWorker::new_lifo()).collect();
        let stealers: Vec<_> = locals.iter().map(|w| w.stealer()).collect();
        let parker_pairs: Vec<_> = (0..num_workers).map(|_| parking::pair()).collect();

        let mut workers = Vec::with_capacity(num_workers);
        for (index, (local, (parker, unparker))) in
            locals.into_iter().zip(parker_pairs.into_iter()).enumerate()
        {
            let state = WorkerState {
                local,
                stealers: stealers
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != index)
                    .map(|(_, s)| s.clone())
                    .collect(),
                injector: injector.clone(),
                shutdown: shutdown.clone(),
                parker,
            };
            let handle = thread::Builder::new()
                .name(format!("tls-adapter-steal-{index}"))
                .spawn(move || state.run())
                .expect("failed to spawn work-stealing worker thread");
            workers.push(WorkerHandle { thread: Some(handle), unparker });
        }

        Self {
            injector,
            workers,
            shutdown,
            posted: Mutex::new(VecDeque::new()),
            current_domain: Mutex::new(None),
        }
    }

    fn wake_one(&self) {
        if self.workers.is_empty() {
            return;
        }
        let idx = fastrand::usize(..self.workers.len());
        self.workers[idx].unparker.unpark();
    }

    /// Run every job posted back to the event loop since the last drain, same
    /// contract as [`super::ThreadPoolRuntime::drain_posted`].
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

impl Runtime for WorkStealingRuntime {
    fn submit_blocking(&self, job: Job) {
        self.injector.push(job);
        self.wake_one();
    }

    fn post_to_event_loop(&self, job: Job, domain_tag: Option<DomainTag>) {
        self.posted.lock().unwrap().push_back((job, domain_tag));
    }

    fn current_domain_tag(&self) -> Option<DomainTag> {
        self.current_domain.lock().unwrap().clone()
    }
}

impl Drop for WorkStealingRuntime {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        for worker in &self.workers {
            worker.unparker.unpark();
        }
        for handle in &mut self.workers {
            if let Some(thread) = handle.thread.take() {
                let _ = thread.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration as StdDuration;

    #[test]
    fn submit_blocking_runs_across_workers() {
        let rt = WorkStealingRuntime::new(2);
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let c = count.clone();
            rt.submit_blocking(Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }));
        }
        for _ in 0..200 {
            if count.load(Ordering::SeqCst) == 10 {
                break;
            }
            thread::sleep(StdDuration::from_millis(5));
        }
        assert_eq!(count.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn post_to_event_loop_queues_until_drained() {
        let rt = WorkStealingRuntime::new(1);
        let done = Arc::new(AtomicUsize::new(0));
        let d2 = done.clone();
        rt.post_to_event_loop(Box::new(move || { d2.fetch_add(1, Ordering::SeqCst); }), None);
        assert_eq!(done.load(Ordering::SeqCst), 0);
        rt.drain_posted();
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
