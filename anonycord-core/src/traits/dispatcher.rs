/// A unit of caller-facing work: a completion or a delegate call.
pub type DispatchJob = Box<dyn FnOnce() + Send + 'static>;

/// Delivers completions and notifications onto the caller's context.
///
/// A UI host forwards jobs to its main loop; jobs must run in the order
/// they are dispatched.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, job: DispatchJob);
}

/// Runs every job immediately on the thread that produced it.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineDispatcher;

impl Dispatcher for InlineDispatcher {
    fn dispatch(&self, job: DispatchJob) {
        job();
    }
}
