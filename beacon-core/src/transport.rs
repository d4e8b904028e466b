use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use beacon_types::protocol::Envelope;
use thiserror::Error;

use crate::clientoptions::ClientOptions;
use crate::hint::Hint;

/// An error reported by a transport when an envelope could not be handed off.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(String);

impl TransportError {
    /// Creates a transport error with the given description.
    pub fn new(message: impl Into<String>) -> TransportError {
        TransportError(message.into())
    }
}

/// The abstraction that moves assembled envelopes off the client.
///
/// A transport owns delivery entirely: queueing, retries and rate limiting
/// are its business. The pipeline only distinguishes success from failure,
/// and a failure downgrades the capture result to the empty id.
pub trait Transport: Send + Sync + 'static {
    /// Hands one envelope to the transport.
    fn send(&self, envelope: Envelope, hint: &Hint) -> Result<(), TransportError>;

    /// Blocks until queued envelopes are delivered or the timeout elapses.
    ///
    /// Returns `true` if the queue drained in time.
    fn flush(&self, timeout: Option<Duration>) -> bool {
        let _ = timeout;
        true
    }

    /// Instructs the transport to flush and shut down.
    fn shutdown(&self, timeout: Option<Duration>) -> bool {
        self.flush(timeout)
    }
}

/// A factory creating the transport a client will use.
pub trait TransportFactory: Send + Sync {
    /// Creates a transport for the given options.
    fn create_transport(&self, options: &ClientOptions) -> Arc<dyn Transport>;
}

impl<F> TransportFactory for F
where
    F: Fn(&ClientOptions) -> Arc<dyn Transport> + Send + Sync,
{
    fn create_transport(&self, options: &ClientOptions) -> Arc<dyn Transport> {
        self(options)
    }
}

impl<T: Transport> TransportFactory for Arc<T> {
    fn create_transport(&self, _options: &ClientOptions) -> Arc<dyn Transport> {
        self.clone()
    }
}

/// A transport that records every envelope it receives.
///
/// This is the transport the test helpers install; it is part of the public
/// surface so downstream crates can assert on emitted envelopes as well.
#[derive(Debug, Default)]
pub struct TestTransport {
    collected: Mutex<Vec<Envelope>>,
}

impl TestTransport {
    /// Creates a new test transport.
    pub fn new() -> Arc<TestTransport> {
        Arc::new(Default::default())
    }

    /// Returns all envelopes captured so far and clears the store.
    pub fn fetch_and_clear_envelopes(&self) -> Vec<Envelope> {
        let mut guard = self
            .collected
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *guard)
    }
}

impl Transport for TestTransport {
    fn send(&self, envelope: Envelope, _hint: &Hint) -> Result<(), TransportError> {
        self.collected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(envelope);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_collects_and_clears() {
        let transport = TestTransport::new();
        let hint = Hint::new();
        transport.send(Envelope::new(), &hint).unwrap();
        transport.send(Envelope::new(), &hint).unwrap();
        assert_eq!(transport.fetch_and_clear_envelopes().len(), 2);
        assert!(transport.fetch_and_clear_envelopes().is_empty());
    }

    #[test]
    fn arc_transport_is_its_own_factory() {
        let transport = TestTransport::new();
        let factory: Arc<dyn TransportFactory> = Arc::new(transport.clone());
        let created = factory.create_transport(&ClientOptions::default());
        let hint = Hint::new();
        created.send(Envelope::new(), &hint).unwrap();
        assert_eq!(transport.fetch_and_clear_envelopes().len(), 1);
    }
}
