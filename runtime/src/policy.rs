//! Failure-mode policy enumerations (`SPEC_FULL.md` §4.6.3).

/// What the spine does when `Backend::enqueue` fails for an event it is trying to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnqueueFailureMode {
    /// Wrap the underlying error in an `EnqueueError` and terminate `run`.
    #[default]
    Fail,
    /// Retry with exponential backoff (`retry_base_delay * 2^k`) up to `retry_attempts` times;
    /// terminate `run` with `EnqueueError` if every attempt fails.
    Retry,
    /// Record the event (with the failure reason) in the `FailedEventStore` and continue.
    Store,
}

/// What the spine does after one or more organs raised while handling a dispatched event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandlerFailureMode {
    /// Log the error and ack the event (it is consumed either way).
    #[default]
    Log,
    /// Record the event (with the failure reason) in the `FailedEventStore`, then ack.
    Store,
    /// Do not ack; the backend is responsible for redelivering the event.
    Nack,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_failure_mode_defaults_to_fail() {
        assert_eq!(EnqueueFailureMode::default(), EnqueueFailureMode::Fail);
    }

    #[test]
    fn handler_failure_mode_defaults_to_log() {
        assert_eq!(HandlerFailureMode::default(), HandlerFailureMode::Log);
    }
}
