//! Trace propagation and trace-based sampling decisions.

use std::fmt;

use crate::context::Context;

/// The W3C trace context of a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TraceContext {
    trace_id: u128,
    span_id: u64,
    flags: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseTraceError {
    #[error("traceparent must be `version-traceid-spanid-flags`")]
    Format,
    #[error("unsupported traceparent version")]
    Version,
    #[error("trace id and span id must be non-zero")]
    ZeroId,
}

impl TraceContext {
    pub const FLAG_SAMPLED: u8 = 0x01;

    pub const fn new(trace_id: u128, span_id: u64, flags: u8) -> Self {
        Self {
            trace_id,
            span_id,
            flags,
        }
    }

    /// Start a new root trace, sampled with probability `ratio`.
    pub fn root(ratio: f64) -> Self {
        Self::root_with(&mut fastrand::Rng::new(), ratio)
    }

    pub fn root_with(rng: &mut fastrand::Rng, ratio: f64) -> Self {
        let sampled = rng.f64() < ratio;
        Self {
            trace_id: rng.u128(1..),
            span_id: rng.u64(1..),
            flags: if sampled { Self::FLAG_SAMPLED } else { 0 },
        }
    }

    /// Parse a `traceparent` header value.
    pub fn from_traceparent(header: &str) -> Result<Self, ParseTraceError> {
        let mut parts = header.trim().split('-');
        let (Some(version), Some(trace_id), Some(span_id), Some(flags)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ParseTraceError::Format);
        };

        let version = parse_hex(version, 2).ok_or(ParseTraceError::Format)?;
        // Later versions may append fields; version 00 must not.
        if version == 0xff || (version == 0 && parts.next().is_some()) {
            return Err(ParseTraceError::Version);
        }

        let trace_id = parse_hex(trace_id, 32).ok_or(ParseTraceError::Format)?;
        let span_id = parse_hex(span_id, 16).ok_or(ParseTraceError::Format)?;
        let flags = parse_hex(flags, 2).ok_or(ParseTraceError::Format)?;
        if trace_id == 0 || span_id == 0 {
            return Err(ParseTraceError::ZeroId);
        }

        Ok(Self {
            trace_id,
            span_id: span_id as u64,
            flags: flags as u8,
        })
    }

    pub fn trace_id(&self) -> [u8; 16] {
        self.trace_id.to_be_bytes()
    }

    pub fn span_id(&self) -> [u8; 8] {
        self.span_id.to_be_bytes()
    }

    pub fn flags(&self) -> u8 {
        self.flags
    }

    pub fn is_valid(&self) -> bool {
        self.trace_id != 0 && self.span_id != 0
    }

    pub fn is_sampled(&self) -> bool {
        self.flags & Self::FLAG_SAMPLED != 0
    }
}

/// Formats as a version 00 `traceparent` header value.
impl fmt::Display for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "00-{:032x}-{:016x}-{:02x}",
            self.trace_id, self.span_id, self.flags
        )
    }
}

fn parse_hex(s: &str, len: usize) -> Option<u128> {
    if s.len() != len || !s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return None;
    }
    u128::from_str_radix(s, 16).ok()
}

/// Samples according to the request's trace decision.
///
/// Contexts without a valid trace are always sampled.
pub fn trace_sampler(cx: &Context) -> bool {
    cx.trace()
        .is_none_or(|trace| !trace.is_valid() || trace.is_sampled())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

    #[test]
    fn parses_traceparent() {
        let trace = TraceContext::from_traceparent(HEADER).unwrap();
        assert!(trace.is_valid());
        assert!(trace.is_sampled());
        assert_eq!(trace.span_id(), [0x00, 0xf0, 0x67, 0xaa, 0x0b, 0xa9, 0x02, 0xb7]);
        assert_eq!(trace.trace_id()[0], 0x4b);
        assert_eq!(trace.to_string(), HEADER);
    }

    #[test]
    fn rejects_malformed_traceparent() {
        assert_eq!(
            TraceContext::from_traceparent("00-abc"),
            Err(ParseTraceError::Format)
        );
        assert_eq!(
            TraceContext::from_traceparent(
                "00-4BF92F3577B34DA6A3CE929D0E0E4736-00f067aa0ba902b7-01"
            ),
            Err(ParseTraceError::Format)
        );
        assert_eq!(
            TraceContext::from_traceparent(
                "ff-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"
            ),
            Err(ParseTraceError::Version)
        );
        assert_eq!(
            TraceContext::from_traceparent(
                "00-00000000000000000000000000000000-00f067aa0ba902b7-01"
            ),
            Err(ParseTraceError::ZeroId)
        );
    }

    #[test]
    fn sampler_follows_trace_flag() {
        assert!(trace_sampler(&Context::new()));

        let sampled = TraceContext::new(1, 1, TraceContext::FLAG_SAMPLED);
        assert!(trace_sampler(&Context::new().with_trace(sampled)));

        let unsampled = TraceContext::new(1, 1, 0);
        assert!(!trace_sampler(&Context::new().with_trace(unsampled)));

        let invalid = TraceContext::new(0, 0, 0);
        assert!(trace_sampler(&Context::new().with_trace(invalid)));
    }

    #[test]
    fn root_ratio_bounds() {
        let mut rng = fastrand::Rng::with_seed(7);
        for _ in 0..100 {
            let never = TraceContext::root_with(&mut rng, 0.0);
            assert!(never.is_valid());
            assert!(!never.is_sampled());
            assert!(TraceContext::root_with(&mut rng, 1.0).is_sampled());
        }
    }
}
