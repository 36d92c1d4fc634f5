//! Input checks run before any remote call

use super::errors::{SessionError, SessionResult};
use crate::config::ValidationConfig;
use crate::core_filter::ContentFilter;
use crate::core_model::PostCandidate;

/// Reject an empty value for `field`
pub fn require_non_empty(field: &str, value: &str) -> SessionResult<()> {
    if value.is_empty() {
        return Err(SessionError::invalid(format!("{} is empty", field)));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> SessionResult<()> {
    let email = email.trim();
    require_non_empty("email", email)?;
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(SessionError::invalid("email is not an address")),
    }
}

pub fn validate_password(password: &str, rules: &ValidationConfig) -> SessionResult<()> {
    require_non_empty("password", password)?;
    if password.chars().count() < rules.min_password_len {
        return Err(SessionError::invalid(format!(
            "password must be at least {} characters",
            rules.min_password_len
        )));
    }
    Ok(())
}

pub fn validate_display_name(
    name: &str,
    rules: &ValidationConfig,
    filter: &ContentFilter,
) -> SessionResult<()> {
    check_text("display name", name, rules.max_display_name_len, filter)
}

/// Subject and body of a post about to be sent
pub fn validate_post(
    candidate: &PostCandidate,
    rules: &ValidationConfig,
    filter: &ContentFilter,
) -> SessionResult<()> {
    check_text("subject", &candidate.subject, rules.max_subject_len, filter)?;
    check_text("content", &candidate.content, rules.max_content_len, filter)?;
    if candidate.from.uid == candidate.to.uid {
        return Err(SessionError::invalid("cannot post to yourself"));
    }
    Ok(())
}

fn check_text(field: &str, text: &str, max_len: usize, filter: &ContentFilter) -> SessionResult<()> {
    if text.trim().is_empty() {
        return Err(SessionError::invalid(format!("{} is blank", field)));
    }
    if text.chars().count() > max_len {
        return Err(SessionError::invalid(format!(
            "{} is longer than {} characters",
            field, max_len
        )));
    }
    // A disabled filter logs the miss and lets the text through
    if filter.contains(text) {
        return Err(SessionError::invalid(format!("{} contains a blocked term", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{post_candidate, user_key};

    fn filter() -> ContentFilter {
        let filter = ContentFilter::default();
        filter.enable_with_bundled();
        filter
    }

    #[test]
    fn test_email_rules() {
        assert!(validate_email("ada@example.com").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("ada").is_err());
        assert!(validate_email("@example.com").is_err());
    }

    #[test]
    fn test_password_length() {
        let rules = ValidationConfig::default();
        assert!(validate_password("secret", &rules).is_ok());
        assert!(matches!(
            validate_password("abc", &rules),
            Err(SessionError::InputValidation(_))
        ));
        assert!(validate_password("", &rules).is_err());
    }

    #[test]
    fn test_display_name_rules() {
        let rules = ValidationConfig::default();
        let filter = filter();

        assert!(validate_display_name("Ada", &rules, &filter).is_ok());
        assert!(validate_display_name("   ", &rules, &filter).is_err());
        assert!(validate_display_name(&"x".repeat(33), &rules, &filter).is_err());
        assert!(validate_display_name("Captain Bozo", &rules, &filter).is_err());
    }

    #[test]
    fn test_disabled_filter_does_not_block() {
        let rules = ValidationConfig::default();
        let filter = ContentFilter::default();

        assert!(validate_display_name("Captain Bozo", &rules, &filter).is_ok());
        assert_eq!(filter.unready_checks(), 1);
    }

    #[test]
    fn test_post_rules() {
        let rules = ValidationConfig::default();
        let filter = filter();
        let ada = user_key("a", "Ada");
        let bob = user_key("b", "Bob");

        assert!(validate_post(&post_candidate(&ada, &bob, "hi there"), &rules, &filter).is_ok());
        assert!(validate_post(&post_candidate(&ada, &bob, " "), &rules, &filter).is_err());
        assert!(validate_post(&post_candidate(&ada, &ada, "hi"), &rules, &filter).is_err());
        assert!(validate_post(&post_candidate(&ada, &bob, "you bozo"), &rules, &filter).is_err());
    }
}
