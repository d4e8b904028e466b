use beacon_types::protocol::EnvelopeItem;
use thiserror::Error;

/// An error produced while turning an item into envelope payload bytes.
#[derive(Debug, Error)]
#[error("serialization failed: {0}")]
pub struct SerializeError(#[from] serde_json::Error);

/// Turns typed envelope items into payload bytes during assembly.
///
/// A part whose serialization fails is dropped from the envelope; the rest
/// of the envelope still goes out.
pub trait Serializer: Send + Sync {
    /// Serializes one item into its payload bytes.
    fn serialize(&self, item: &EnvelopeItem) -> Result<Vec<u8>, SerializeError>;
}

/// The default serializer, producing JSON payloads.
///
/// Attachments are opaque byte buffers and pass through unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize(&self, item: &EnvelopeItem) -> Result<Vec<u8>, SerializeError> {
        let payload = match item {
            EnvelopeItem::Event(event) => serde_json::to_vec(event)?,
            EnvelopeItem::Transaction(transaction) => serde_json::to_vec(transaction)?,
            EnvelopeItem::Session(session) => serde_json::to_vec(session)?,
            EnvelopeItem::Attachment(attachment) => attachment.buffer.clone(),
        };
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use beacon_types::protocol::{Attachment, Event};

    use super::*;

    #[test]
    fn events_serialize_to_json() {
        let mut event = Event::new();
        event.message = Some("hello".into());
        let payload = JsonSerializer
            .serialize(&EnvelopeItem::Event(event.clone()))
            .unwrap();
        let decoded: Event = serde_json::from_slice(&payload).unwrap();
        assert_eq!(decoded.event_id, event.event_id);
        assert_eq!(decoded.message.as_deref(), Some("hello"));
    }

    #[test]
    fn every_item_kind_produces_a_payload() {
        use beacon_types::protocol::{Session, Transaction};

        let session: Session = serde_json::from_str(
            r#"{"sid":"00000000-0000-0000-0000-000000000000","started":0,"attrs":{"release":"app@1.0.0"}}"#,
        )
        .unwrap();
        let items = [
            EnvelopeItem::Event(Event::new()),
            EnvelopeItem::Transaction(Transaction::new()),
            EnvelopeItem::Session(session),
        ];
        for item in items {
            assert!(!JsonSerializer.serialize(&item).unwrap().is_empty());
        }
    }

    #[test]
    fn attachments_pass_through_unchanged() {
        let attachment = Attachment {
            buffer: vec![1, 2, 3],
            filename: "dump.bin".into(),
            ..Default::default()
        };
        let payload = JsonSerializer
            .serialize(&EnvelopeItem::Attachment(attachment))
            .unwrap();
        assert_eq!(payload, vec![1, 2, 3]);
    }
}
