//! The beacon protocol data model.
//!
//! Items captured by the SDK core are expressed in these types. The wire
//! encoding of an [`Envelope`] is not defined here; a `Serializer`
//! collaborator in `beacon-core` turns individual items into byte payloads.

mod attachment;
mod envelope;
mod event;
mod session;
mod trace;

pub use attachment::{Attachment, AttachmentType};
pub use envelope::{Envelope, EnvelopeItem, EnvelopePart, ItemKind};
pub use event::{
    Breadcrumb, Context, Event, Exception, Level, Mechanism, ParseLevelError, Request, Transaction,
    TransactionSpan, User,
};
pub use session::{
    ParseSessionStatusError, Session, SessionAttributes, SessionStatus,
};
pub use trace::{ParseIdError, PropagationContext, SpanId, SpanRef, TraceContext, TraceId};

pub use url::Url;
pub use uuid::Uuid;

/// An ordered map with deterministic iteration, used for tags, extras and
/// contexts.
pub type Map<K, V> = std::collections::BTreeMap<K, V>;

pub use serde_json::value::{from_value, to_value, Number, Value};
