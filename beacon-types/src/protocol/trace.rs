use std::fmt;
use std::str;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// An error used when parsing trace or span identifiers.
#[derive(Debug, Error)]
#[error("invalid trace identifier")]
pub struct ParseIdError;

macro_rules! hex_id {
    ($name:ident, $len:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Creates a new random identifier.
            pub fn random() -> Self {
                Self(rand::random())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::random()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for byte in &self.0 {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self)
            }
        }

        impl str::FromStr for $name {
            type Err = ParseIdError;

            fn from_str(input: &str) -> Result<Self, Self::Err> {
                if input.len() != $len * 2 || !input.is_ascii() {
                    return Err(ParseIdError);
                }
                let mut bytes = [0u8; $len];
                for (i, chunk) in input.as_bytes().chunks(2).enumerate() {
                    let chunk = str::from_utf8(chunk).map_err(|_| ParseIdError)?;
                    bytes[i] = u8::from_str_radix(chunk, 16).map_err(|_| ParseIdError)?;
                }
                Ok(Self(bytes))
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let string = String::deserialize(deserializer)?;
                string.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_id!(SpanId, 8, "The unique identifier of a span within a trace.");
hex_id!(TraceId, 16, "The unique identifier of a distributed trace.");

/// The trace data attached to an item's `trace` context.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct TraceContext {
    /// The ID of the span this context describes.
    #[serde(default)]
    pub span_id: SpanId,
    /// Determines which trace the item belongs to.
    #[serde(default)]
    pub trace_id: TraceId,
    /// Determines the parent of this span if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<SpanId>,
    /// Short code identifying the type of operation the span is measuring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    /// Human readable detail description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A lightweight reference to the span that is currently active on a scope.
///
/// The scope does not own the span's lifecycle; it only carries enough data
/// to stamp a `trace` context onto captured items.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanRef {
    /// The trace the span belongs to.
    pub trace_id: TraceId,
    /// The ID of the span.
    pub span_id: SpanId,
    /// The parent span, if any.
    pub parent_span_id: Option<SpanId>,
    /// Short code identifying the type of operation.
    pub op: Option<String>,
    /// Human readable detail description.
    pub description: Option<String>,
}

impl SpanRef {
    /// Derives the trace context for this span reference.
    pub fn trace_context(&self) -> TraceContext {
        TraceContext {
            span_id: self.span_id,
            trace_id: self.trace_id,
            parent_span_id: self.parent_span_id,
            op: self.op.clone(),
            description: self.description.clone(),
        }
    }
}

/// Trace state used to continue a trace before any span has been started.
///
/// Every scope carries one of these from the moment it is created, so that
/// captured items can always be associated with a trace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropagationContext {
    /// The trace all items captured through this scope belong to.
    pub trace_id: TraceId,
    /// The span id representing the current unit of work.
    pub span_id: SpanId,
    /// An upstream sampling decision, if one was propagated.
    pub sampled: Option<bool>,
}

impl Default for PropagationContext {
    fn default() -> Self {
        PropagationContext {
            trace_id: TraceId::random(),
            span_id: SpanId::random(),
            sampled: None,
        }
    }
}

impl PropagationContext {
    /// Derives the trace context announced by this propagation state.
    pub fn trace_context(&self) -> TraceContext {
        TraceContext {
            span_id: self.span_id,
            trace_id: self.trace_id,
            ..Default::default()
        }
    }

    /// Formats the propagation state as a `traceparent`-style header value.
    pub fn to_header_value(&self) -> String {
        match self.sampled {
            Some(sampled) => format!("{}-{}-{}", self.trace_id, self.span_id, sampled as u8),
            None => format!("{}-{}", self.trace_id, self.span_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_id_roundtrip() {
        let id: SpanId = "d42ceb747ca1550f".parse().unwrap();
        assert_eq!(id.to_string(), "d42ceb747ca1550f");
        assert!("not hex!".parse::<SpanId>().is_err());
        assert!("d42c".parse::<SpanId>().is_err());
    }

    #[test]
    fn test_trace_id_serde() {
        let id: TraceId = "335e53d614474acc9f89e632b776cc28".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"335e53d614474acc9f89e632b776cc28\"");
        let back: TraceId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_propagation_header() {
        let ctx = PropagationContext {
            trace_id: "335e53d614474acc9f89e632b776cc28".parse().unwrap(),
            span_id: "d42ceb747ca1550f".parse().unwrap(),
            sampled: Some(true),
        };
        assert_eq!(
            ctx.to_header_value(),
            "335e53d614474acc9f89e632b776cc28-d42ceb747ca1550f-1"
        );
    }
}
