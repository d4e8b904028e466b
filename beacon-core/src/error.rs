use std::any::Any;
use std::panic;

use thiserror::Error;

/// The internal error taxonomy of the capture path.
///
/// Serialization and transport failures stay with their collaborators
/// ([`SerializeError`](crate::serializer::SerializeError),
/// [`TransportError`](crate::transport::TransportError)); the pipeline logs
/// and absorbs them where they occur. None of these ever unwind past a
/// public entry point.
#[derive(Debug, Error)]
pub enum SdkError {
    /// A session was started without the release identity it requires.
    #[error("cannot start a session without a configured release")]
    SessionWithoutRelease,
    /// User-supplied code (callback, processor, observer) panicked.
    #[error("callback panicked: {0}")]
    Callback(String),
}

/// Runs user-supplied code, converting a panic into an [`SdkError`].
///
/// This is the boundary guard used around before-send callbacks, event
/// processors and scope observers: the pipeline always proceeds with *some*
/// value, so the error type never shows up in its control flow.
pub(crate) fn run_guarded<T>(f: impl FnOnce() -> T) -> Result<T, SdkError> {
    match panic::catch_unwind(panic::AssertUnwindSafe(f)) {
        Ok(value) => Ok(value),
        Err(payload) => Err(SdkError::Callback(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guarded_call_passes_value_through() {
        let result = run_guarded(|| 42);
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn guarded_call_captures_panic_message() {
        let result: Result<(), _> = run_guarded(|| panic!("boom"));
        match result {
            Err(SdkError::Callback(message)) => assert_eq!(message, "boom"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn guarded_call_captures_formatted_panic() {
        let result: Result<(), _> = run_guarded(|| panic!("bad value: {}", 7));
        match result {
            Err(SdkError::Callback(message)) => assert_eq!(message, "bad value: 7"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
