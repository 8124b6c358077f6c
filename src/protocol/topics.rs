//! Topic validation and wildcard matching
//!
//! Implements the hierarchical topic rules of MQTT: levels separated by `/`,
//! `+` matches exactly one level, `#` matches the remaining levels (including
//! the parent level) and must be the last level of a filter.

use thiserror::Error;

const SINGLE_LEVEL: &str = "+";
const MULTI_LEVEL: &str = "#";

/// Validate a subscription filter (wildcards allowed)
pub fn validate_topic_filter(filter: &str) -> Result<(), TopicError> {
    check_common(filter)?;

    let levels: Vec<&str> = filter.split('/').collect();
    for (index, level) in levels.iter().enumerate() {
        if level.contains('#') {
            if *level != MULTI_LEVEL {
                return Err(TopicError::MisplacedWildcard(filter.to_string()));
            }
            if index != levels.len() - 1 {
                return Err(TopicError::MultiLevelNotLast(filter.to_string()));
            }
        }
        if level.contains('+') && *level != SINGLE_LEVEL {
            return Err(TopicError::MisplacedWildcard(filter.to_string()));
        }
    }

    Ok(())
}

/// Validate a concrete topic name used for publishing (no wildcards)
pub fn validate_topic_name(topic: &str) -> Result<(), TopicError> {
    check_common(topic)?;

    if topic.contains('+') || topic.contains('#') {
        return Err(TopicError::WildcardInTopicName(topic.to_string()));
    }

    Ok(())
}

fn check_common(topic: &str) -> Result<(), TopicError> {
    if topic.is_empty() {
        return Err(TopicError::Empty);
    }
    if topic.contains('\0') {
        return Err(TopicError::NullCharacter);
    }
    if topic.len() > u16::MAX as usize {
        return Err(TopicError::TooLong(topic.len()));
    }
    Ok(())
}

/// Check whether a concrete topic matches a subscription filter
///
/// Topics starting with `$` are never matched by a leading wildcard.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }

    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some(MULTI_LEVEL), _) => return true,
            (Some(SINGLE_LEVEL), Some(_)) => continue,
            (Some(f), Some(t)) if f == t => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Validate a session identifier prefix: `[a-zA-Z0-9._-]+`
pub fn validate_client_id(client_id: &str) -> Result<(), TopicError> {
    if client_id.is_empty() {
        return Err(TopicError::EmptyClientId);
    }

    for ch in client_id.chars() {
        if !ch.is_ascii_alphanumeric() && ch != '.' && ch != '_' && ch != '-' {
            return Err(TopicError::InvalidClientIdChar(ch));
        }
    }

    Ok(())
}

/// Topic and identifier validation errors
#[derive(Debug, Error, PartialEq)]
pub enum TopicError {
    #[error("Topic cannot be empty")]
    Empty,
    #[error("Topic contains a NUL character")]
    NullCharacter,
    #[error("Topic is {0} bytes long, limit is 65535")]
    TooLong(usize),
    #[error("Wildcard must occupy a whole level: {0}")]
    MisplacedWildcard(String),
    #[error("Multi-level wildcard must be the last level: {0}")]
    MultiLevelNotLast(String),
    #[error("Wildcards are not allowed in topic names: {0}")]
    WildcardInTopicName(String),
    #[error("Client identifier cannot be empty")]
    EmptyClientId,
    #[error("Client identifier contains invalid character: '{0}'")]
    InvalidClientIdChar(char),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn multi_level_root_matches_everything(topic in "[a-z0-9]{1,8}(/[a-z0-9]{0,8}){0,5}") {
            prop_assert!(topic_matches("#", &topic));
        }

        #[test]
        fn topic_matches_itself(topic in "[a-z0-9]{1,8}(/[a-z0-9]{1,8}){0,5}") {
            prop_assert!(validate_topic_name(&topic).is_ok());
            prop_assert!(topic_matches(&topic, &topic));
        }

        #[test]
        fn single_level_substitution_still_matches(
            levels in proptest::collection::vec("[a-z0-9]{1,8}", 1..6),
            index in 0usize..6,
        ) {
            let index = index % levels.len();
            let topic = levels.join("/");
            let mut filter_levels = levels.clone();
            filter_levels[index] = "+".to_string();
            let filter = filter_levels.join("/");
            prop_assert!(validate_topic_filter(&filter).is_ok());
            prop_assert!(topic_matches(&filter, &topic));
        }

        #[test]
        fn extra_level_never_matches_exact_filter(
            levels in proptest::collection::vec("[a-z0-9]{1,8}", 1..6),
            extra in "[a-z0-9]{1,8}",
        ) {
            let filter = levels.join("/");
            let topic = format!("{filter}/{extra}");
            prop_assert!(!topic_matches(&filter, &topic));
        }
    }

    #[test]
    fn test_wildcard_examples() {
        assert!(topic_matches("a/+/c", "a/b/c"));
        assert!(topic_matches("a/#", "a/b/c"));
        assert!(!topic_matches("x/b/c", "a/b/c"));

        // `#` also matches the parent level
        assert!(topic_matches("a/#", "a"));
        assert!(topic_matches("+/+", "a/"));
        assert!(!topic_matches("a/+", "a"));
        assert!(!topic_matches("a/+/c", "a/b/c/d"));
    }

    #[test]
    fn test_system_topics_excluded_from_leading_wildcards() {
        assert!(!topic_matches("#", "$SYS/broker/uptime"));
        assert!(!topic_matches("+/broker/uptime", "$SYS/broker/uptime"));
        assert!(topic_matches("$SYS/#", "$SYS/broker/uptime"));
    }

    #[test]
    fn test_filter_validation() {
        assert!(validate_topic_filter("deme25/8/esp32s3/commands").is_ok());
        assert!(validate_topic_filter("sensors/+/temperature").is_ok());
        assert!(validate_topic_filter("sensors/#").is_ok());
        assert!(validate_topic_filter("#").is_ok());
        assert!(validate_topic_filter("+").is_ok());

        assert_eq!(validate_topic_filter(""), Err(TopicError::Empty));
        assert!(matches!(
            validate_topic_filter("sensors/#/temperature"),
            Err(TopicError::MultiLevelNotLast(_))
        ));
        assert!(matches!(
            validate_topic_filter("sensors/temp#"),
            Err(TopicError::MisplacedWildcard(_))
        ));
        assert!(matches!(
            validate_topic_filter("sensors/te+mp"),
            Err(TopicError::MisplacedWildcard(_))
        ));
        assert_eq!(
            validate_topic_filter("bad\0topic"),
            Err(TopicError::NullCharacter)
        );
    }

    #[test]
    fn test_topic_name_validation() {
        assert!(validate_topic_name("test/esp32").is_ok());
        assert!(matches!(
            validate_topic_name("test/+"),
            Err(TopicError::WildcardInTopicName(_))
        ));
        assert!(matches!(
            validate_topic_name("test/#"),
            Err(TopicError::WildcardInTopicName(_))
        ));
    }

    #[test]
    fn test_client_id_validation() {
        assert!(validate_client_id("ESP32S3_").is_ok());
        assert!(validate_client_id("esp32_tls_basic").is_ok());
        assert_eq!(validate_client_id(""), Err(TopicError::EmptyClientId));
        assert_eq!(
            validate_client_id("esp 32"),
            Err(TopicError::InvalidClientIdChar(' '))
        );
    }
}
