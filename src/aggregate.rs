//! Union of generator outputs, deduplicated against known variants.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::domain::normalize_lookalike;
use crate::generators::{Candidate, GeneratorKind, GeneratorOutput};

/// Candidates that survived aggregation, plus bookkeeping for the report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CandidateSet {
    /// Unique, normalized candidates in lexical order
    pub candidates: Vec<Candidate>,
    /// Raw count per generator, before any dedup
    pub generated: BTreeMap<GeneratorKind, usize>,
    /// Generated names that collapsed onto an earlier candidate
    pub duplicates: usize,
    /// Candidates already on record for this original
    pub known_skipped: usize,
    /// Candidates that could not be IDNA-encoded
    pub unencodable: usize,
}

impl CandidateSet {
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

pub struct CandidateAggregator {
    known: HashSet<String>,
    exclude: Option<String>,
}

impl CandidateAggregator {
    /// `known` holds malicious variants as stored, with or without root dot.
    pub fn new<I, S>(known: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let known = known
            .into_iter()
            .filter_map(|variant| normalize_lookalike(variant.as_ref()))
            .collect();
        Self {
            known,
            exclude: None,
        }
    }

    /// Never emit `domain` itself (dotless, normalized) as a candidate.
    pub fn excluding(mut self, domain: &str) -> Self {
        self.exclude = Some(domain.trim_end_matches('.').to_string());
        self
    }

    pub fn known_len(&self) -> usize {
        self.known.len()
    }

    pub fn aggregate(&self, outputs: &[GeneratorOutput]) -> CandidateSet {
        let mut set = CandidateSet::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut unique: BTreeMap<String, Candidate> = BTreeMap::new();

        for output in outputs {
            *set.generated.entry(output.kind).or_default() += output.candidates.len();

            for candidate in &output.candidates {
                let Some(name) = normalize_lookalike(&candidate.domain) else {
                    debug!("Dropping unencodable candidate {}", candidate.domain);
                    set.unencodable += 1;
                    continue;
                };

                if !seen.insert(name.clone()) {
                    set.duplicates += 1;
                    continue;
                }

                if self.known.contains(&name) || self.exclude.as_deref() == Some(name.as_str()) {
                    set.known_skipped += 1;
                    continue;
                }

                unique.insert(
                    name.clone(),
                    Candidate {
                        domain: name,
                        tld: candidate.tld.clone(),
                    },
                );
            }
        }

        set.candidates = unique.into_values().collect();
        set
    }
}
