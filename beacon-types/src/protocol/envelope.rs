use uuid::Uuid;

use super::{Attachment, Event, Session, Transaction};

/// A typed item that can be placed into an [`Envelope`].
///
/// This is the assembly-side view; the envelope itself only stores the
/// serialized parts a `Serializer` collaborator produced from these.
#[derive(Clone, Debug)]
pub enum EnvelopeItem {
    /// An error event.
    Event(Event),
    /// A performance monitoring transaction.
    Transaction(Transaction),
    /// A release health session update.
    Session(Session),
    /// An attachment.
    Attachment(Attachment),
}

impl EnvelopeItem {
    /// The kind tag of this item.
    pub fn kind(&self) -> ItemKind {
        match self {
            EnvelopeItem::Event(_) => ItemKind::Event,
            EnvelopeItem::Transaction(_) => ItemKind::Transaction,
            EnvelopeItem::Session(_) => ItemKind::Session,
            EnvelopeItem::Attachment(_) => ItemKind::Attachment,
        }
    }
}

impl From<Event> for EnvelopeItem {
    fn from(event: Event) -> Self {
        EnvelopeItem::Event(event)
    }
}

impl From<Transaction> for EnvelopeItem {
    fn from(transaction: Transaction) -> Self {
        EnvelopeItem::Transaction(transaction)
    }
}

impl From<Session> for EnvelopeItem {
    fn from(session: Session) -> Self {
        EnvelopeItem::Session(session)
    }
}

impl From<Attachment> for EnvelopeItem {
    fn from(attachment: Attachment) -> Self {
        EnvelopeItem::Attachment(attachment)
    }
}

/// The kind of an envelope part.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemKind {
    /// An error event.
    Event,
    /// A performance monitoring transaction.
    Transaction,
    /// A release health session update.
    Session,
    /// An attachment.
    Attachment,
}

impl ItemKind {
    /// The string tag used to label this part kind.
    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Event => "event",
            ItemKind::Transaction => "transaction",
            ItemKind::Session => "session",
            ItemKind::Attachment => "attachment",
        }
    }
}

/// One serialized part of an [`Envelope`].
#[derive(Clone, Debug)]
pub struct EnvelopePart {
    /// The kind of item this part carries.
    pub kind: ItemKind,
    /// The serialized payload of the part.
    pub payload: Vec<u8>,
    /// The filename, for attachment parts.
    pub filename: Option<String>,
    /// The attachment type tag, for attachment parts.
    pub attachment_type: Option<&'static str>,
}

impl EnvelopePart {
    /// Creates a part carrying a serialized payload.
    pub fn new(kind: ItemKind, payload: Vec<u8>) -> Self {
        EnvelopePart {
            kind,
            payload,
            filename: None,
            attachment_type: None,
        }
    }
}

/// The multi-part container handed to the transport.
///
/// An envelope groups one captured item with its related parts, such as a
/// pending session update and the applicable attachments. Independent items
/// (e.g. a standalone session update) form an envelope of their own.
#[derive(Clone, Default, Debug)]
pub struct Envelope {
    event_id: Option<Uuid>,
    parts: Vec<EnvelopePart>,
}

impl Envelope {
    /// Creates a new empty envelope.
    pub fn new() -> Envelope {
        Default::default()
    }

    /// The id of the primary item in this envelope, if any.
    pub fn event_id(&self) -> Option<Uuid> {
        self.event_id
    }

    /// Associates the envelope with the id of its primary item.
    pub fn set_event_id(&mut self, event_id: Uuid) {
        self.event_id = Some(event_id);
    }

    /// Appends a serialized part to the envelope.
    pub fn add_part(&mut self, part: EnvelopePart) {
        self.parts.push(part);
    }

    /// Iterates over the parts in insertion order.
    pub fn parts(&self) -> impl Iterator<Item = &EnvelopePart> {
        self.parts.iter()
    }

    /// Returns the first part of the given kind, if any.
    pub fn part_of_kind(&self, kind: ItemKind) -> Option<&EnvelopePart> {
        self.parts.iter().find(|part| part.kind == kind)
    }

    /// Whether the envelope contains no parts at all.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// The number of parts in the envelope.
    pub fn len(&self) -> usize {
        self.parts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_envelope() {
        let envelope = Envelope::new();
        assert!(envelope.is_empty());
        assert_eq!(envelope.event_id(), None);
    }

    #[test]
    fn test_parts_keep_insertion_order() {
        let mut envelope = Envelope::new();
        envelope.add_part(EnvelopePart::new(ItemKind::Event, b"{}".to_vec()));
        envelope.add_part(EnvelopePart::new(ItemKind::Session, b"{}".to_vec()));
        let kinds: Vec<_> = envelope.parts().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![ItemKind::Event, ItemKind::Session]);
        assert_eq!(envelope.len(), 2);
    }
}
