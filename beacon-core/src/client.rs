use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use beacon_types::protocol::{
    Attachment, Breadcrumb, Envelope, EnvelopeItem, EnvelopePart, Event, ItemKind, Level, Session,
    Transaction, Uuid,
};
use beacon_types::random_uuid;

use crate::clientoptions::ClientOptions;
use crate::error::run_guarded;
use crate::hint::Hint;
use crate::scope::ScopeLike;
use crate::session::SessionChange;
use crate::transport::Transport;

/// The client drives the capture pipeline.
///
/// It is stateless apart from its options and transport; scope data is
/// passed into every capture call. A client without a transport is
/// permanently disabled and turns every capture into a logged no-op.
pub struct Client {
    options: Arc<ClientOptions>,
    transport: RwLock<Option<Arc<dyn Transport>>>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("options", &self.options)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl Clone for Client {
    fn clone(&self) -> Client {
        let transport = self
            .transport
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Client {
            options: self.options.clone(),
            transport: RwLock::new(transport),
        }
    }
}

impl From<ClientOptions> for Client {
    fn from(options: ClientOptions) -> Client {
        Client::with_options(options)
    }
}

impl Client {
    /// Creates a client from the given options.
    pub fn with_options(options: ClientOptions) -> Client {
        Client::with_shared_options(Arc::new(options))
    }

    /// Creates a client from already shared options.
    pub fn with_shared_options(options: Arc<ClientOptions>) -> Client {
        let transport = options
            .transport
            .as_ref()
            .map(|factory| factory.create_transport(&options));
        Client {
            options,
            transport: RwLock::new(transport),
        }
    }

    /// Creates a permanently disabled client.
    ///
    /// Binding this to a scope layer deactivates capturing for everything
    /// that resolves its client through that layer.
    pub fn disabled() -> Client {
        Client {
            options: Arc::new(ClientOptions::default()),
            transport: RwLock::new(None),
        }
    }

    /// The options this client was created from.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub(crate) fn shared_options(&self) -> Arc<ClientOptions> {
        self.options.clone()
    }

    /// Whether the client can send anything at all.
    pub fn is_enabled(&self) -> bool {
        self.transport
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn transport(&self) -> Option<Arc<dyn Transport>> {
        self.transport
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Captures an error event, running the full pipeline.
    ///
    /// Returns the event id on success and the empty id whenever the event
    /// was dropped along the way.
    pub fn capture_event(
        &self,
        event: Event,
        scope: Option<&dyn ScopeLike>,
        hint: &Hint,
    ) -> Uuid {
        let Some(transport) = self.transport() else {
            sdk_debug!("client is disabled, dropping event");
            return Uuid::nil();
        };

        let Some(mut event) = self.prepare_event(event, scope, hint) else {
            return Uuid::nil();
        };
        let event_id = event.event_id;

        // Session bookkeeping happens before sampling so release health
        // stays accurate even for events that never go out.
        let mut pending_session = None;
        if let Some(scope) = scope {
            if event_counts_as_error(&event) {
                pending_session = scope
                    .session_tracker()
                    .update(SessionChange::errored(event_is_crash(&event)));
            }
        }

        if !self.sample_should_send() {
            sdk_debug!("event {event_id} dropped by sampling");
            return Uuid::nil();
        }

        if self.is_ignored(&event) {
            sdk_debug!("event {event_id} dropped by ignored exception filter");
            return Uuid::nil();
        }

        if let Some(callback) = &self.options.before_send {
            let input = event.clone();
            match run_guarded(|| callback(input, hint)) {
                Ok(Some(processed)) => event = processed,
                Ok(None) => {
                    sdk_debug!("event {event_id} dropped by before_send");
                    return Uuid::nil();
                }
                Err(err) => {
                    sdk_error!("before_send failed, sending unmodified event: {err}");
                    event.breadcrumbs.push(Breadcrumb {
                        ty: "error".into(),
                        category: Some("before_send".into()),
                        level: Level::Warning,
                        message: Some(err.to_string()),
                        ..Default::default()
                    });
                }
            }
        }

        let attachments = scope.map(|s| s.attachments()).unwrap_or_default();
        let envelope = self.assemble(EnvelopeItem::Event(event), pending_session, attachments, false);
        if envelope.is_empty() {
            sdk_debug!("nothing to send for event {event_id}");
            return Uuid::nil();
        }
        match transport.send(envelope, hint) {
            Ok(()) => event_id,
            Err(err) => {
                sdk_warn!("transport rejected event {event_id}: {err}");
                Uuid::nil()
            }
        }
    }

    /// Captures a finished transaction.
    pub fn capture_transaction(
        &self,
        transaction: Transaction,
        scope: Option<&dyn ScopeLike>,
        hint: &Hint,
    ) -> Uuid {
        let Some(transport) = self.transport() else {
            sdk_debug!("client is disabled, dropping transaction");
            return Uuid::nil();
        };

        let mut transaction = transaction;
        if transaction.event_id.is_nil() {
            transaction.event_id = random_uuid();
        }
        let event_id = transaction.event_id;

        if let Some(scope) = scope {
            if hint.is_from_cache() {
                sdk_debug!("transaction {event_id} is replayed, scope not applied");
            } else {
                scope.apply_to_transaction(&mut transaction);
            }
        }
        if transaction.release.is_none() {
            transaction.release = self.options.release.as_ref().map(|r| r.to_string());
        }
        if transaction.environment.is_none() {
            transaction.environment = self.options.environment.as_ref().map(|e| e.to_string());
        }

        let mut processors = scope.map(|s| s.event_processors()).unwrap_or_default();
        processors.extend(self.sorted_global_processors());
        for processor in processors {
            let input = transaction.clone();
            match run_guarded(|| processor.process_transaction(input, hint)) {
                Ok(Some(processed)) => transaction = processed,
                Ok(None) => {
                    sdk_debug!(
                        "transaction {event_id} dropped by processor {}",
                        processor.name()
                    );
                    return Uuid::nil();
                }
                Err(err) => {
                    sdk_error!(
                        "processor {} failed, transaction unchanged: {err}",
                        processor.name()
                    );
                }
            }
        }

        if let Some(callback) = &self.options.before_send_transaction {
            let input = transaction.clone();
            match run_guarded(|| callback(input, hint)) {
                Ok(Some(processed)) => transaction = processed,
                Ok(None) => {
                    sdk_debug!("transaction {event_id} dropped by before_send_transaction");
                    return Uuid::nil();
                }
                Err(err) => {
                    sdk_error!("before_send_transaction failed, sending unmodified: {err}");
                }
            }
        }

        let attachments = scope.map(|s| s.attachments()).unwrap_or_default();
        let envelope = self.assemble(
            EnvelopeItem::Transaction(transaction),
            None,
            attachments,
            true,
        );
        if envelope.is_empty() {
            sdk_debug!("nothing to send for transaction {event_id}");
            return Uuid::nil();
        }
        match transport.send(envelope, hint) {
            Ok(()) => event_id,
            Err(err) => {
                sdk_warn!("transport rejected transaction {event_id}: {err}");
                Uuid::nil()
            }
        }
    }

    /// Sends a standalone session update in an envelope of its own.
    pub fn capture_session(&self, session: Session, hint: &Hint) {
        let Some(transport) = self.transport() else {
            sdk_debug!("client is disabled, dropping session update");
            return;
        };
        let envelope = self.assemble(EnvelopeItem::Session(session), None, vec![], false);
        if envelope.is_empty() {
            sdk_debug!("nothing to send for session update");
            return;
        }
        if let Err(err) = transport.send(envelope, hint) {
            sdk_warn!("transport rejected session update: {err}");
        }
    }

    /// Blocks until the transport delivered its queue or the timeout passed.
    pub fn flush(&self, timeout: Option<Duration>) -> bool {
        match self.transport() {
            Some(transport) => {
                transport.flush(timeout.or(Some(self.options.shutdown_timeout)))
            }
            None => true,
        }
    }

    /// Shuts the client down, flushing the transport and disabling capture.
    pub fn close(&self, timeout: Option<Duration>) -> bool {
        let transport = self
            .transport
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match transport {
            Some(transport) => {
                transport.shutdown(timeout.or(Some(self.options.shutdown_timeout)))
            }
            None => true,
        }
    }

    fn prepare_event(
        &self,
        mut event: Event,
        scope: Option<&dyn ScopeLike>,
        hint: &Hint,
    ) -> Option<Event> {
        if event.event_id.is_nil() {
            event.event_id = random_uuid();
        }

        if let Some(scope) = scope {
            if hint.is_from_cache() {
                sdk_debug!("event {} is replayed, scope not applied", event.event_id);
            } else {
                scope.apply_to_event(&mut event);
            }
        }

        if event.release.is_none() {
            event.release = self.options.release.as_ref().map(|r| r.to_string());
        }
        if event.environment.is_none() {
            event.environment = self.options.environment.as_ref().map(|e| e.to_string());
        }
        if event.server_name.is_none() {
            event.server_name = self.options.server_name.as_ref().map(|s| s.to_string());
        }

        let mut processors = scope.map(|s| s.event_processors()).unwrap_or_default();
        processors.extend(self.sorted_global_processors());
        for processor in processors {
            let event_id = event.event_id;
            let input = event.clone();
            match run_guarded(|| processor.process_event(input, hint)) {
                Ok(Some(processed)) => event = processed,
                Ok(None) => {
                    sdk_debug!("event {event_id} dropped by processor {}", processor.name());
                    return None;
                }
                Err(err) => {
                    sdk_error!(
                        "processor {} failed, event unchanged: {err}",
                        processor.name()
                    );
                }
            }
        }
        Some(event)
    }

    fn sorted_global_processors(&self) -> Vec<Arc<dyn crate::processor::EventProcessor>> {
        let mut processors = self.options.event_processors.clone();
        processors.sort_by_key(|processor| processor.order());
        processors
    }

    fn sample_should_send(&self) -> bool {
        match self.options.sample_rate {
            Some(rate) => rate >= self.options.random_source.next_f64(),
            None => true,
        }
    }

    fn is_ignored(&self, event: &Event) -> bool {
        event.exceptions.iter().any(|exception| {
            self.options
                .ignored_exceptions
                .iter()
                .any(|ignored| ignored == &exception.ty)
        })
    }

    fn assemble(
        &self,
        item: EnvelopeItem,
        session: Option<Session>,
        attachments: Vec<Attachment>,
        for_transaction: bool,
    ) -> Envelope {
        let mut envelope = Envelope::new();
        let event_id = match &item {
            EnvelopeItem::Event(event) => Some(event.event_id),
            EnvelopeItem::Transaction(transaction) => Some(transaction.event_id),
            _ => None,
        };
        self.push_part(&mut envelope, &item);
        if let Some(session) = session {
            self.push_part(&mut envelope, &EnvelopeItem::Session(session));
        }
        for attachment in attachments {
            if for_transaction && !attachment.add_to_transactions {
                continue;
            }
            let filename = attachment.filename.clone();
            let ty = attachment.ty.unwrap_or_default().as_str();
            match self
                .options
                .serializer
                .serialize(&EnvelopeItem::Attachment(attachment))
            {
                Ok(payload) => {
                    let mut part = EnvelopePart::new(ItemKind::Attachment, payload);
                    part.filename = Some(filename);
                    part.attachment_type = Some(ty);
                    envelope.add_part(part);
                }
                Err(err) => sdk_error!("failed to serialize attachment part: {err}"),
            }
        }
        if let Some(event_id) = event_id {
            envelope.set_event_id(event_id);
        }
        envelope
    }

    fn push_part(&self, envelope: &mut Envelope, item: &EnvelopeItem) {
        match self.options.serializer.serialize(item) {
            Ok(payload) => envelope.add_part(EnvelopePart::new(item.kind(), payload)),
            Err(err) => sdk_error!("failed to serialize {} part: {err}", item.kind().as_str()),
        }
    }
}

/// Whether an event counts against release health.
fn event_counts_as_error(event: &Event) -> bool {
    event.level >= Level::Error || !event.exceptions.is_empty()
}

/// Whether an event represents a crash rather than a handled error.
fn event_is_crash(event: &Event) -> bool {
    if event.level == Level::Fatal {
        return true;
    }
    event.exceptions.iter().any(|exception| {
        exception
            .mechanism
            .as_ref()
            .is_some_and(|mechanism| mechanism.handled == Some(false))
    })
}

#[cfg(test)]
mod tests {
    use beacon_types::protocol::Exception;

    use crate::transport::TestTransport;
    use crate::util::FixedRandom;

    use super::*;

    fn client_with(transport: Arc<TestTransport>, configure: impl FnOnce(&mut ClientOptions)) -> Client {
        let mut options = ClientOptions {
            transport: Some(Arc::new(transport)),
            ..Default::default()
        };
        configure(&mut options);
        Client::with_options(options)
    }

    #[test]
    fn disabled_client_drops_everything() {
        let client = Client::disabled();
        assert!(!client.is_enabled());
        let hint = Hint::new();
        assert!(client.capture_event(Event::new(), None, &hint).is_nil());
        assert!(client.flush(None));
    }

    #[test]
    fn capture_returns_id_and_sends_one_envelope() {
        let transport = TestTransport::new();
        let client = client_with(transport.clone(), |_| {});
        let hint = Hint::new();
        let id = client.capture_event(Event::new(), None, &hint);
        assert!(!id.is_nil());
        let envelopes = transport.fetch_and_clear_envelopes();
        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].event_id(), Some(id));
        assert!(envelopes[0].part_of_kind(ItemKind::Event).is_some());
    }

    #[test]
    fn sampling_keeps_when_rate_at_least_drawn() {
        let transport = TestTransport::new();
        let client = client_with(transport.clone(), |options| {
            options.sample_rate = Some(0.5);
            options.random_source = Arc::new(FixedRandom(0.3));
        });
        let hint = Hint::new();
        assert!(!client.capture_event(Event::new(), None, &hint).is_nil());
        assert_eq!(transport.fetch_and_clear_envelopes().len(), 1);
    }

    #[test]
    fn sampling_drops_when_rate_below_drawn() {
        let transport = TestTransport::new();
        let client = client_with(transport.clone(), |options| {
            options.sample_rate = Some(0.2);
            options.random_source = Arc::new(FixedRandom(0.3));
        });
        let hint = Hint::new();
        assert!(client.capture_event(Event::new(), None, &hint).is_nil());
        assert!(transport.fetch_and_clear_envelopes().is_empty());
    }

    #[test]
    fn ignored_exception_types_are_filtered() {
        let transport = TestTransport::new();
        let client = client_with(transport.clone(), |options| {
            options.ignored_exceptions = vec!["ConnectionReset".into()];
        });
        let mut event = Event::new();
        event.exceptions.push(Exception {
            ty: "ConnectionReset".into(),
            ..Default::default()
        });
        let hint = Hint::new();
        assert!(client.capture_event(event, None, &hint).is_nil());
        assert!(transport.fetch_and_clear_envelopes().is_empty());
    }

    #[test]
    fn before_send_veto_drops_event() {
        let transport = TestTransport::new();
        let client = client_with(transport.clone(), |options| {
            options.before_send = Some(Arc::new(|_, _| None));
        });
        let hint = Hint::new();
        assert!(client.capture_event(Event::new(), None, &hint).is_nil());
        assert!(transport.fetch_and_clear_envelopes().is_empty());
    }

    #[test]
    fn panicking_before_send_still_sends_with_note() {
        let transport = TestTransport::new();
        let client = client_with(transport.clone(), |options| {
            options.before_send = Some(Arc::new(|_, _| panic!("scrubber broke")));
        });
        let hint = Hint::new();
        let id = client.capture_event(Event::new(), None, &hint);
        assert!(!id.is_nil());
        let envelopes = transport.fetch_and_clear_envelopes();
        let part = envelopes[0].part_of_kind(ItemKind::Event).unwrap();
        let event: Event = serde_json::from_slice(&part.payload).unwrap();
        assert_eq!(
            event.breadcrumbs.last().and_then(|b| b.category.as_deref()),
            Some("before_send")
        );
    }

    #[test]
    fn global_processors_run_in_order() {
        struct Tagger(&'static str, i32);
        impl crate::processor::EventProcessor for Tagger {
            fn order(&self) -> i32 {
                self.1
            }
            fn process_event(&self, mut event: Event, _: &Hint) -> Option<Event> {
                event.tags.insert("winner".into(), self.0.into());
                Some(event)
            }
        }

        let transport = TestTransport::new();
        let client = client_with(transport.clone(), |options| {
            options.event_processors = vec![Arc::new(Tagger("late", 10)), Arc::new(Tagger("early", -10))];
        });
        let hint = Hint::new();
        client.capture_event(Event::new(), None, &hint);
        let envelopes = transport.fetch_and_clear_envelopes();
        let part = envelopes[0].part_of_kind(ItemKind::Event).unwrap();
        let event: Event = serde_json::from_slice(&part.payload).unwrap();
        assert_eq!(event.tags["winner"], "late");
    }

    #[test]
    fn close_disables_the_client() {
        let transport = TestTransport::new();
        let client = client_with(transport.clone(), |_| {});
        assert!(client.is_enabled());
        assert!(client.close(None));
        assert!(!client.is_enabled());
        let hint = Hint::new();
        assert!(client.capture_event(Event::new(), None, &hint).is_nil());
    }
}
