//! Syntax checks for normalized (lower-case, punycode, dotless) domain names.

use crate::error::DomainError;

/// Maximum length of a domain name without the root dot (RFC 1035).
pub const MAX_DOMAIN_LEN: usize = 253;
/// Maximum length of a single label (RFC 1035).
pub const MAX_LABEL_LEN: usize = 63;

/// Provides domain name validation functionality
#[derive(Debug, Default, Clone, Copy)]
pub struct DomainValidator;

impl DomainValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validates a normalized domain name for format and syntax
    ///
    /// The domain must:
    /// - Contain at least one dot (.)
    /// - Not exceed 253 characters
    /// - Consist of lower-case ASCII letters, digits, hyphens and dots
    /// - Not have empty labels (no leading, trailing or consecutive dots)
    /// - Keep every label within 63 characters, without a leading or trailing hyphen
    pub fn validate_domain_format(&self, domain: &str) -> bool {
        if domain.is_empty() || domain.len() > MAX_DOMAIN_LEN {
            return false;
        }

        if !domain.contains('.') {
            return false;
        }

        domain.split('.').all(|label| self.validate_label(label))
    }

    /// Validates a single host label.
    pub fn validate_label(&self, label: &str) -> bool {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return false;
        }

        if !label
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return false;
        }

        !(label.starts_with('-') || label.ends_with('-'))
    }
}

/// Validates a normalized domain, returning the offending input on failure.
pub fn validate_domain(domain: &str) -> Result<(), DomainError> {
    if DomainValidator::new().validate_domain_format(domain) {
        Ok(())
    } else {
        Err(DomainError::InvalidFormat(domain.to_string()))
    }
}
