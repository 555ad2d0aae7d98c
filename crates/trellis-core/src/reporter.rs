use std::any::Any;
use std::fmt;

use crate::component::ComponentId;

/// A template failure, attributed to the component that rendered it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderErrorEvent {
    pub component: ComponentId,
    pub tag: String,
    pub message: String,
}

impl fmt::Display for RenderErrorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}> ({}) failed to render: {}", self.tag, self.component, self.message)
    }
}

/// Sink for render failures. The host forwards every event to its reporter
/// and then to render-error subscribers.
pub trait ErrorReporter {
    fn report(&self, event: &RenderErrorEvent);
}

/// Default reporter: one `error!` line per failure.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, event: &RenderErrorEvent) {
        log::error!("{event}");
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "template panicked".to_owned()
    }
}
