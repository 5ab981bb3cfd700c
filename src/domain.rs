//! Authentic-domain normalization and decomposition into base label + TLD suffix.
//!
//! An [`AuthenticDomain`] is always lower-case, punycode-encoded and stored
//! with a trailing root dot. Decomposition scans the labels left to right and
//! splits at the first point from which every remaining label is a known TLD,
//! so `www.shop.co.uk.` yields base `shop` and suffix `co.uk`.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::{Host, Url};

use crate::error::{DecompositionError, DomainError};
use crate::validation::validate_domain;

/// TLD labels recognized by the decomposer. Distinct from the configurable
/// generation targets in [`crate::config::AnalysisConfig::tlds`].
pub const REFERENCE_TLDS: &[&str] = &[
    "com", "ru", "org", "in", "net", "uk", "info", "co", "au", "ai", "tk", "nl", "de", "cn",
    "io", "us", "me", "app", "dev", "biz", "fr", "jp", "br", "it", "es", "ca", "ch", "pl", "eu",
];

/// A normalized fully-qualified domain name supplied for analysis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AuthenticDomain {
    fqdn: String,
}

impl AuthenticDomain {
    /// Normalizes user input into an authentic domain.
    ///
    /// Accepts bare hosts (`Example.COM.`) or URLs (`https://example.com/login`).
    /// Internationalized names are converted to punycode.
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(DomainError::Empty);
        }

        let host = if trimmed.contains("://") {
            let url = Url::parse(trimmed)
                .map_err(|_| DomainError::InvalidFormat(trimmed.to_string()))?;
            url.host_str()
                .ok_or_else(|| DomainError::InvalidFormat(trimmed.to_string()))?
                .to_string()
        } else {
            trimmed.split('/').next().unwrap_or_default().to_string()
        };

        let host = host.trim_end_matches('.');
        if host.is_empty() {
            return Err(DomainError::Empty);
        }

        let ascii = to_ascii_host(host)?;
        validate_domain(&ascii)?;

        Ok(Self {
            fqdn: format!("{}.", ascii),
        })
    }

    /// The canonical form, with trailing root dot.
    pub fn as_str(&self) -> &str {
        &self.fqdn
    }

    /// The canonical form without the trailing root dot.
    pub fn without_root(&self) -> &str {
        self.fqdn.trim_end_matches('.')
    }

    pub fn decompose(&self) -> Result<Decomposition, DecompositionError> {
        decompose(self.without_root())
    }
}

impl fmt::Display for AuthenticDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fqdn)
    }
}

impl TryFrom<String> for AuthenticDomain {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AuthenticDomain> for String {
    fn from(domain: AuthenticDomain) -> Self {
        domain.fqdn
    }
}

/// The registrable part of a domain split around its TLD sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decomposition {
    /// Labels preceding the base label, if any (`www` in `www.google.com`).
    pub subdomain: Option<String>,
    pub base: String,
    pub suffix: String,
}

impl Decomposition {
    /// `base.suffix`, without root dot.
    pub fn registrable(&self) -> String {
        format!("{}.{}", self.base, self.suffix)
    }
}

pub fn is_reference_tld(label: &str) -> bool {
    REFERENCE_TLDS.contains(&label)
}

/// Splits a dotless, normalized domain into base label and TLD suffix.
pub fn decompose(domain: &str) -> Result<Decomposition, DecompositionError> {
    let labels: Vec<&str> = domain.split('.').collect();

    let split = (0..labels.len())
        .find(|&idx| labels[idx..].iter().all(|label| is_reference_tld(label)))
        .ok_or_else(|| DecompositionError::NoRecognizedTld(domain.to_string()))?;

    if split == 0 || labels[split - 1].is_empty() {
        return Err(DecompositionError::MissingBaseLabel(domain.to_string()));
    }

    let decomposition = Decomposition {
        subdomain: (split > 1).then(|| labels[..split - 1].join(".")),
        base: labels[split - 1].to_string(),
        suffix: labels[split..].join("."),
    };

    let rejoined = match &decomposition.subdomain {
        Some(sub) => format!("{}.{}", sub, decomposition.registrable()),
        None => decomposition.registrable(),
    };
    if rejoined != domain {
        return Err(DecompositionError::Mismatch {
            domain: domain.to_string(),
            rejoined,
        });
    }

    Ok(decomposition)
}

/// Lower-cases and IDNA-encodes a generated lookalike name.
///
/// Returns `None` when the name cannot be expressed as an ASCII host. ASCII
/// input is only lower-cased, so names with characters DNS will refuse
/// (`_`, empty labels) pass through unchanged and are rejected at lookup.
pub fn normalize_lookalike(name: &str) -> Option<String> {
    let name = name.trim_end_matches('.');
    if name.is_ascii() {
        return Some(name.to_ascii_lowercase());
    }
    to_ascii_host(name).ok()
}

fn to_ascii_host(host: &str) -> Result<String, DomainError> {
    match Host::parse(host) {
        Ok(Host::Domain(ascii)) => Ok(ascii),
        Ok(Host::Ipv4(_)) | Ok(Host::Ipv6(_)) => Err(DomainError::NotADomain(host.to_string())),
        Err(e) => Err(DomainError::Idna {
            domain: host.to_string(),
            reason: e.to_string(),
        }),
    }
}
