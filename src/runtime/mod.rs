//! The `Runtime` capability: the host's thread pool and event-loop context.
//! Out of scope per the spec, but modeled as a trait with two backings: a
//! plain `std::thread`-based pool for the default build, and an `InlineRuntime`
//! used by tests and by hosts that already run fully synchronously.

mod inline;
mod thread_pool;
#[cfg(feature = "work-stealing")]
mod work_stealing;

pub use inline::InlineRuntime;
pub use thread_pool::ThreadPoolRuntime;
#[cfg(feature = "work-stealing")]
pub use work_stealing::WorkStealingRuntime;

/// Opaque tag threading the host's notion of "current execution context"
/// (e.g. a logging/tracing scope) across the blocking-pool round trip.
/// Modeled on Node's domain concept referenced in the spec; this adapter
/// never interprets the tag, only carries it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomainTag(pub Arc<str>);

use std::sync::Arc;

/// A job dispatched to the blocking pool or back onto the event loop.
pub type Job = Box<dyn FnOnce() + Send>;

/// The host's thread pool and single-threaded event-loop context.
pub trait Runtime: Send + Sync {
    /// Submit `job` to run on a blocking worker thread, off the event loop.
    fn submit_blocking(&self, job: Job);

    /// Post `job` back onto the event-loop context, preserving `domain_tag`
    /// if the host tracks one.
    fn post_to_event_loop(&self, job: Job, domain_tag: Option<DomainTag>);

    /// The domain tag currently in scope, if any.
    fn current_domain_tag(&self) -> Option<DomainTag>;
}
