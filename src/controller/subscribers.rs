//! # Subscribers
//!
//! The subscriber list is a compact JSON array of actor identities stored in
//! a single namespace annotation. It is bounded in count and in serialized
//! size because an annotation value is not the place for an unbounded list.

use thiserror::Error;
use tracing::warn;

/// Why a subscription change is refused. Nothing is written in any of these cases.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    #[error("already subscribed")]
    AlreadySubscribed,
    #[error("not subscribed")]
    NotSubscribed,
    #[error("maximum {max} subscribers allowed (current: {current})")]
    LimitReached { max: usize, current: usize },
    #[error("subscriber list would exceed annotation size limit ({size} > {max} bytes)")]
    TooLarge { size: usize, max: usize },
}

/// Limits applied when adding a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberLimits {
    pub max_subscribers: usize,
    pub max_bytes: usize,
}

/// Parse the annotation value. An absent annotation is an empty list.
///
/// # Errors
///
/// Returns an error if the value is not a JSON array of strings.
pub fn parse(raw: Option<&str>) -> Result<Vec<String>, serde_json::Error> {
    match raw {
        None => Ok(Vec::new()),
        Some(raw) => serde_json::from_str(raw),
    }
}

/// Parse the annotation value, treating malformed content as an empty list
#[must_use]
pub fn parse_or_empty(namespace: &str, raw: Option<&str>) -> Vec<String> {
    parse(raw).unwrap_or_else(|e| {
        warn!(
            namespace,
            annotation = raw.unwrap_or_default(),
            error = %e,
            "Invalid subscriber annotation, treating as empty"
        );
        Vec::new()
    })
}

/// Encode the list the way it is stored in the annotation
///
/// # Errors
///
/// Returns an error only if serialization fails.
pub fn encode(subscribers: &[String]) -> Result<String, serde_json::Error> {
    serde_json::to_string(subscribers)
}

/// New list and its encoding after appending `actor`
///
/// # Errors
///
/// Refuses duplicates, a full list, and lists whose encoding exceeds the size limit.
pub fn with_subscriber(
    current: &[String],
    actor: &str,
    limits: SubscriberLimits,
) -> Result<(Vec<String>, String), SubscriptionError> {
    if current.iter().any(|s| s == actor) {
        return Err(SubscriptionError::AlreadySubscribed);
    }
    if current.len() >= limits.max_subscribers {
        return Err(SubscriptionError::LimitReached {
            max: limits.max_subscribers,
            current: current.len(),
        });
    }

    let mut updated = current.to_vec();
    updated.push(actor.to_string());
    let encoded = encode_infallible(&updated);
    if encoded.len() > limits.max_bytes {
        return Err(SubscriptionError::TooLarge {
            size: encoded.len(),
            max: limits.max_bytes,
        });
    }
    Ok((updated, encoded))
}

/// New list and its encoding after removing `actor`
///
/// # Errors
///
/// Refuses to remove an actor that is not in the list.
pub fn without_subscriber(
    current: &[String],
    actor: &str,
) -> Result<(Vec<String>, String), SubscriptionError> {
    if !current.iter().any(|s| s == actor) {
        return Err(SubscriptionError::NotSubscribed);
    }
    let updated: Vec<String> = current.iter().filter(|s| *s != actor).cloned().collect();
    let encoded = encode_infallible(&updated);
    Ok((updated, encoded))
}

// A list of plain strings always serializes
fn encode_infallible(subscribers: &[String]) -> String {
    encode(subscribers).unwrap_or_else(|_| String::from("[]"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMITS: SubscriberLimits = SubscriberLimits {
        max_subscribers: 10,
        max_bytes: 1000,
    };

    fn list(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("user{i}@example.com")).collect()
    }

    #[test]
    fn test_parse_absent_and_valid() {
        assert!(parse(None).unwrap().is_empty());
        assert_eq!(
            parse(Some(r#"["a@x.io","b@x.io"]"#)).unwrap(),
            vec!["a@x.io".to_string(), "b@x.io".to_string()]
        );
    }

    #[test]
    fn test_malformed_is_empty() {
        assert!(parse_or_empty("ns", Some("not json")).is_empty());
        assert!(parse_or_empty("ns", Some(r#"{"a":1}"#)).is_empty());
        assert!(parse_or_empty("ns", Some("[1,2]")).is_empty());
    }

    #[test]
    fn test_encoding_is_compact() {
        assert_eq!(
            encode(&["a@x.io".to_string(), "b@x.io".to_string()]).unwrap(),
            r#"["a@x.io","b@x.io"]"#
        );
    }

    #[test]
    fn test_add_appends() {
        let (updated, encoded) = with_subscriber(&list(1), "new@example.com", LIMITS).unwrap();
        assert_eq!(updated.len(), 2);
        assert_eq!(updated[1], "new@example.com");
        assert_eq!(encoded, r#"["user0@example.com","new@example.com"]"#);
    }

    #[test]
    fn test_duplicate_rejected() {
        assert_eq!(
            with_subscriber(&list(2), "user1@example.com", LIMITS),
            Err(SubscriptionError::AlreadySubscribed)
        );
    }

    #[test]
    fn test_eleventh_subscriber_rejected() {
        assert_eq!(
            with_subscriber(&list(10), "late@example.com", LIMITS),
            Err(SubscriptionError::LimitReached {
                max: 10,
                current: 10
            })
        );
    }

    #[test]
    fn test_size_ceiling_rejected() {
        let long_actor = format!("{}@example.com", "x".repeat(1000));
        assert!(matches!(
            with_subscriber(&[], &long_actor, LIMITS),
            Err(SubscriptionError::TooLarge { max: 1000, .. })
        ));
    }

    #[test]
    fn test_remove_filters_actor() {
        let (updated, encoded) = without_subscriber(&list(3), "user1@example.com").unwrap();
        assert_eq!(updated, vec!["user0@example.com", "user2@example.com"]);
        assert_eq!(encoded, r#"["user0@example.com","user2@example.com"]"#);

        let (updated, encoded) = without_subscriber(&list(1), "user0@example.com").unwrap();
        assert!(updated.is_empty());
        assert_eq!(encoded, "[]");
    }

    #[test]
    fn test_remove_absent_rejected() {
        assert_eq!(
            without_subscriber(&list(2), "stranger@example.com"),
            Err(SubscriptionError::NotSubscribed)
        );
    }
}
