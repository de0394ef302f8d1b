// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Single-level wildcard topic matching.

/// Token that matches exactly one topic segment.
pub const SINGLE_LEVEL_WILDCARD: &str = "+";

/// Returns `true` if `topic` matches the subscription `pattern`.
///
/// Both strings are split on `/`. Segment counts must be equal; `#` has no
/// special meaning and is compared literally. A `+` pattern segment matches
/// any non-empty topic segment, every other segment must be equal
/// (case-sensitive). Leading and trailing slashes produce empty segments that
/// are compared like any other literal.
///
/// # Examples
///
/// ```
/// use homegate::topic::matches;
///
/// assert!(matches("devices/+/status", "devices/abc/status"));
/// assert!(!matches("devices/+/status", "devices/abc/telemetry"));
/// assert!(!matches("devices/#", "devices/abc/status"));
/// ```
#[must_use]
pub fn matches(pattern: &str, topic: &str) -> bool {
    if pattern.split('/').count() != topic.split('/').count() {
        return false;
    }

    pattern
        .split('/')
        .zip(topic.split('/'))
        .all(|(expected, actual)| {
            if expected == SINGLE_LEVEL_WILDCARD {
                !actual.is_empty()
            } else {
                expected == actual
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_topic_matches_itself() {
        assert!(matches("devices/abc/status", "devices/abc/status"));
    }

    #[test]
    fn wildcard_matches_any_segment() {
        assert!(matches("devices/+/status", "devices/123/status"));
        assert!(matches("homeassistant/+/+/config", "homeassistant/light/lamp/config"));
    }

    #[test]
    fn wildcard_does_not_match_empty_segment() {
        assert!(!matches("devices/+/status", "devices//status"));
    }

    #[test]
    fn segment_count_mismatch_never_matches() {
        assert!(!matches("devices/+", "devices/abc/status"));
        assert!(!matches("devices/+/status/+", "devices/abc/status"));
        assert!(!matches("+", "a/b"));
    }

    #[test]
    fn hash_is_not_a_wildcard() {
        assert!(!matches("devices/#", "devices/abc/status"));
        assert!(!matches("devices/#", "devices/abc"));
        assert!(matches("devices/#", "devices/#"));
    }

    #[test]
    fn literal_segments_are_case_sensitive() {
        assert!(!matches("Devices/+/status", "devices/abc/status"));
    }

    #[test]
    fn leading_and_trailing_slashes_are_literal() {
        assert!(matches("/devices/+", "/devices/abc"));
        assert!(!matches("/devices/+", "devices/abc/"));
        assert!(matches("devices/+/", "devices/abc/"));
    }

    #[test]
    fn plus_topic_segment_matches_plus_pattern() {
        assert!(matches("devices/+/status", "devices/+/status"));
    }
}
