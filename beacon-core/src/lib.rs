//! The core of the beacon telemetry SDK.
//!
//! This crate implements the client-side machinery every outer surface
//! builds on: scopes and their composition, release health sessions and the
//! capture pipeline that turns events into envelopes for a transport.
//!
//! # Scope models
//!
//! Contextual data lives in [`Scope`]s. Two composition models are offered:
//!
//! - [`ScopeComposer`] layers three tiers (current, isolation, global) and
//!   is what the thread-local convenience API uses.
//! - [`ScopeStack`] is the older push/pop model, kept for callers that
//!   structure their context that way. It can project itself onto the
//!   three-tier model via [`ScopeStack::to_composer`].
//!
//! # Getting started
//!
//! ```
//! let _guard = beacon_core::init(beacon_core::ClientOptions {
//!     release: Some("my-app@1.0.0".into()),
//!     ..Default::default()
//! });
//!
//! beacon_core::configure_scope(|scope| {
//!     scope.set_tag("component", "worker");
//! });
//! beacon_core::capture_message("something went wrong", beacon_core::protocol::Level::Error);
//! ```
//!
//! Without a transport in the options the client is disabled and every
//! capture is a logged no-op, which is the right default for libraries.
#![warn(missing_docs)]

#[macro_use]
mod macros;

mod api;
mod client;
mod clientoptions;
mod composer;
mod error;
mod hint;
mod observer;
mod processor;
mod scope;
mod serializer;
mod session;
mod stack;
mod transport;
mod util;


pub use beacon_types as types;
pub use beacon_types::protocol;

pub use crate::api::{
    add_breadcrumb, capture_event, capture_message, configure_scope, current_composer,
    end_session, end_session_with_status, flush, init, run_with, start_session, with_composer,
    InitGuard,
};
pub use crate::client::Client;
pub use crate::clientoptions::{BeforeCallback, ClientOptions};
pub use crate::composer::{MergedScope, ScopeComposer, ScopeSelector};
pub use crate::error::SdkError;
pub use crate::hint::Hint;
pub use crate::observer::ScopeObserver;
pub use crate::processor::EventProcessor;
pub use crate::scope::{BreadcrumbQueue, Scope, ScopeLike};
pub use crate::serializer::{JsonSerializer, SerializeError, Serializer};
pub use crate::session::{SessionChange, SessionSlot, SessionTracker, StartedSessions};
pub use crate::stack::{ScopeStack, StackEntry};
pub use crate::transport::{Transport, TransportError, TransportFactory};
pub use crate::util::{RandomSource, SystemClock, ThreadLocalRandom, TimeProvider};
