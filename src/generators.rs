//! Lookalike candidate generators.
//!
//! Four independent, stateless generators each turn a base label and a list
//! of target TLDs into candidate domains:
//!
//! - [`EditDistanceGenerator`]: the full edit-distance-1 neighbourhood
//! - [`SimilarityGenerator`]: single edits kept only when Jaro-Winkler > 0.8
//! - [`HomographGenerator`]: whole-character confusable substitution
//! - [`CombosquatGenerator`]: `{base}-{keyword}.{tld}`
//!
//! Generators only read their inputs, so [`generate_all`] runs them on the
//! rayon pool.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use rayon::prelude::*;
use serde::Serialize;

use crate::config::{AnalysisConfig, SIMILARITY_THRESHOLD};

/// Alphabet for the edit-distance-1 model.
pub const TYPO_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz0123456789.-_";
/// Alphabet for similarity-filtered substitutions and insertions.
pub const SIMILARITY_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz";

/// A generated lookalike, not yet deduplicated or checked against DNS.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Candidate {
    /// Full name without root dot, e.g. `faceb00k.com`
    pub domain: String,
    /// The TLD the candidate was generated against
    pub tld: String,
}

impl Candidate {
    pub fn new(label: &str, tld: &str) -> Self {
        Self {
            domain: format!("{}.{}", label, tld),
            tld: tld.to_string(),
        }
    }

    /// The mutated label, i.e. the domain with `.{tld}` removed.
    pub fn label(&self) -> &str {
        self.domain
            .strip_suffix(&self.tld)
            .and_then(|rest| rest.strip_suffix('.'))
            .unwrap_or(&self.domain)
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.domain)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorKind {
    EditDistance,
    Similarity,
    Homograph,
    Combosquat,
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::EditDistance => "edit_distance",
            Self::Similarity => "similarity",
            Self::Homograph => "homograph",
            Self::Combosquat => "combosquat",
        };
        f.write_str(name)
    }
}

/// A pure candidate generator.
pub trait Generator: Send + Sync {
    fn kind(&self) -> GeneratorKind;

    /// Produces deduplicated candidates for `base` under every TLD in `tlds`.
    fn generate(&self, base: &str, tlds: &[String]) -> Vec<Candidate>;
}

/// Every single insertion, deletion, substitution and adjacent transposition
/// over [`TYPO_ALPHABET`].
#[derive(Debug, Clone)]
pub struct EditDistanceGenerator {
    alphabet: Vec<char>,
}

impl Default for EditDistanceGenerator {
    fn default() -> Self {
        Self {
            alphabet: TYPO_ALPHABET.chars().collect(),
        }
    }
}

impl EditDistanceGenerator {
    /// The mutated labels, independent of TLD. Never contains `base` itself
    /// (swapping two equal neighbours reproduces it) or the empty label.
    pub fn labels(&self, base: &str) -> BTreeSet<String> {
        let chars: Vec<char> = base.chars().collect();
        let n = chars.len();
        let mut labels = BTreeSet::new();

        for i in 0..=n {
            for &c in &self.alphabet {
                let mut mutated = chars.clone();
                mutated.insert(i, c);
                labels.insert(mutated.into_iter().collect::<String>());
            }
        }

        for i in 0..n {
            let mut mutated = chars.clone();
            mutated.remove(i);
            labels.insert(mutated.into_iter().collect::<String>());

            for &c in &self.alphabet {
                if c != chars[i] {
                    let mut mutated = chars.clone();
                    mutated[i] = c;
                    labels.insert(mutated.into_iter().collect::<String>());
                }
            }
        }

        for i in 0..n.saturating_sub(1) {
            let mut mutated = chars.clone();
            mutated.swap(i, i + 1);
            labels.insert(mutated.into_iter().collect::<String>());
        }

        labels.remove(base);
        labels.remove("");
        labels
    }
}

impl Generator for EditDistanceGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::EditDistance
    }

    fn generate(&self, base: &str, tlds: &[String]) -> Vec<Candidate> {
        let labels = self.labels(base);
        tlds.iter()
            .flat_map(|tld| labels.iter().map(move |label| Candidate::new(label, tld)))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Single edits that stay visually/phonetically close to the original,
/// measured by Jaro-Winkler similarity between the labels.
#[derive(Debug, Clone)]
pub struct SimilarityGenerator {
    alphabet: Vec<char>,
    threshold: f64,
}

impl Default for SimilarityGenerator {
    fn default() -> Self {
        Self::with_threshold(SIMILARITY_THRESHOLD)
    }
}

impl SimilarityGenerator {
    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            alphabet: SIMILARITY_ALPHABET.chars().collect(),
            threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn labels(&self, base: &str) -> BTreeSet<String> {
        let chars: Vec<char> = base.chars().collect();
        let n = chars.len();
        let mut mutations = BTreeSet::new();

        for i in 0..n {
            let mut deleted = chars.clone();
            deleted.remove(i);
            mutations.insert(deleted.into_iter().collect::<String>());

            if i + 1 < n {
                let mut swapped = chars.clone();
                swapped.swap(i, i + 1);
                mutations.insert(swapped.into_iter().collect::<String>());
            }

            for &c in &self.alphabet {
                let mut substituted = chars.clone();
                substituted[i] = c;
                mutations.insert(substituted.into_iter().collect::<String>());

                let mut inserted = chars.clone();
                inserted.insert(i, c);
                mutations.insert(inserted.into_iter().collect::<String>());
            }
        }

        mutations
            .into_iter()
            .filter(|label| label != base && !label.is_empty())
            .filter(|label| strsim::jaro_winkler(base, label) > self.threshold)
            .collect()
    }
}

impl Generator for SimilarityGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Similarity
    }

    fn generate(&self, base: &str, tlds: &[String]) -> Vec<Candidate> {
        let labels = self.labels(base);
        tlds.iter()
            .flat_map(|tld| labels.iter().map(move |label| Candidate::new(label, tld)))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Replaces every occurrence of one confusable character at a time.
#[derive(Debug, Clone)]
pub struct HomographGenerator {
    table: BTreeMap<char, Vec<String>>,
}

impl HomographGenerator {
    pub fn new(table: BTreeMap<char, Vec<String>>) -> Self {
        Self { table }
    }
}

impl Generator for HomographGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Homograph
    }

    fn generate(&self, base: &str, tlds: &[String]) -> Vec<Candidate> {
        let mut candidates = BTreeSet::new();
        let distinct: BTreeSet<char> = base.chars().collect();

        for ch in distinct {
            let Some(substitutes) = self.table.get(&ch.to_ascii_lowercase()) else {
                continue;
            };
            for substitute in substitutes {
                let replaced = base.replace(ch, substitute);
                if replaced == base {
                    continue;
                }
                for tld in tlds {
                    candidates.insert(Candidate::new(&replaced, tld));
                }
            }
        }

        candidates.into_iter().collect()
    }
}

/// `{base}-{keyword}.{tld}` for every keyword and TLD.
#[derive(Debug, Clone)]
pub struct CombosquatGenerator {
    keywords: Vec<String>,
}

impl CombosquatGenerator {
    pub fn new(keywords: Vec<String>) -> Self {
        Self { keywords }
    }
}

impl Generator for CombosquatGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Combosquat
    }

    fn generate(&self, base: &str, tlds: &[String]) -> Vec<Candidate> {
        self.keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .flat_map(|keyword| {
                tlds.iter()
                    .map(move |tld| Candidate::new(&format!("{}-{}", base, keyword), tld))
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Output of one generator run.
#[derive(Debug, Clone)]
pub struct GeneratorOutput {
    pub kind: GeneratorKind,
    pub candidates: Vec<Candidate>,
}

/// The four generators configured from `config`.
pub fn default_generators(config: &AnalysisConfig) -> Vec<Box<dyn Generator>> {
    vec![
        Box::new(EditDistanceGenerator::default()),
        Box::new(SimilarityGenerator::default()),
        Box::new(HomographGenerator::new(config.confusables.clone())),
        Box::new(CombosquatGenerator::new(config.keywords.clone())),
    ]
}

/// Runs every generator against `base` in parallel.
pub fn generate_all(
    generators: &[Box<dyn Generator>],
    base: &str,
    tlds: &[String],
) -> Vec<GeneratorOutput> {
    generators
        .par_iter()
        .map(|generator| GeneratorOutput {
            kind: generator.kind(),
            candidates: generator.generate(base, tlds),
        })
        .collect()
}
