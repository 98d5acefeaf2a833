// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// The small set of control flags that coordinate the parent and a worker.
///
/// Values are the positive integers used on the wire. Zero, negative, or
/// otherwise unrecognised values are not represented by this enum at all;
/// callers go through [`Flag::from_wire`] and treat `None` as "drop this
/// payload, it carries nothing we understand".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    /// A request (parent -> worker) or a successful response (worker -> parent).
    Dispatch = 1,
    /// Worker-initiated availability signal. Reserved for the round-robin +
    /// busy-bit scheduler variant; the least-busy scheduler never emits it.
    Available = 2,
    /// A failure response, either for a specific request or a standalone
    /// initialization/communication failure.
    Error = 3,
    /// Redirected console output from a worker.
    Log = 4,
}

impl Flag {
    pub const fn wire_value(self) -> i32 {
        self as i32
    }

    /// Maps a raw wire integer to a known flag. Non-positive or unrecognised
    /// values yield `None` rather than an error: malformed *flags* are a
    /// silently-dropped payload, not a framing failure.
    pub const fn from_wire(value: i32) -> Option<Flag> {
        match value {
            1 => Some(Flag::Dispatch),
            2 => Some(Flag::Available),
            3 => Some(Flag::Error),
            4 => Some(Flag::Log),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_known_values() {
        for f in [Flag::Dispatch, Flag::Available, Flag::Error, Flag::Log] {
            assert_eq!(Flag::from_wire(f.wire_value()), Some(f));
        }
    }

    #[test]
    fn rejects_non_positive_and_unknown() {
        assert_eq!(Flag::from_wire(0), None);
        assert_eq!(Flag::from_wire(-1), None);
        assert_eq!(Flag::from_wire(5), None);
    }
}
