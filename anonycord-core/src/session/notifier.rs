use std::sync::Arc;

use parking_lot::RwLock;

use crate::traits::dispatcher::{DispatchJob, Dispatcher, InlineDispatcher};
use crate::traits::recorder_delegate::RecorderDelegate;

struct Route {
    delegate: Option<Arc<dyn RecorderDelegate>>,
    dispatcher: Arc<dyn Dispatcher>,
}

/// Routes completions and delegate calls through the host's dispatcher.
#[derive(Clone)]
pub(crate) struct Notifier {
    route: Arc<RwLock<Route>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self {
            route: Arc::new(RwLock::new(Route {
                delegate: None,
                dispatcher: Arc::new(InlineDispatcher),
            })),
        }
    }

    pub fn set_delegate(&self, delegate: Option<Arc<dyn RecorderDelegate>>) {
        self.route.write().delegate = delegate;
    }

    pub fn set_dispatcher(&self, dispatcher: Arc<dyn Dispatcher>) {
        self.route.write().dispatcher = dispatcher;
    }

    /// Hand `job` to the dispatcher. The route lock is not held while the
    /// job runs, so jobs may call back into the recorder.
    pub fn dispatch(&self, job: DispatchJob) {
        let dispatcher = Arc::clone(&self.route.read().dispatcher);
        dispatcher.dispatch(job);
    }

    /// Dispatch a delegate call, if a delegate is installed.
    pub fn notify(&self, call: impl FnOnce(&dyn RecorderDelegate) + Send + 'static) {
        let (delegate, dispatcher) = {
            let route = self.route.read();
            (route.delegate.clone(), Arc::clone(&route.dispatcher))
        };
        if let Some(delegate) = delegate {
            dispatcher.dispatch(Box::new(move || call(delegate.as_ref())));
        }
    }
}
