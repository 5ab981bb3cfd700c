//! Two-stage existence verification.
//!
//! Each candidate starts `Pending`. Stage 1 asks the primary resolver for an
//! A record; only a non-empty answer moves it to `PrimaryConfirmed`. Stage 2
//! asks an independent resolver for the configured record type; a non-empty
//! answer makes it `Confirmed`. Any failure at either stage, including a
//! timeout, is final and yields `Rejected`. Stage 2 is never attempted for a
//! candidate rejected at stage 1.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use tokio::time::timeout;
use tracing::debug;
use trust_dns_resolver::proto::rr::RecordType;

use crate::config::AnalysisConfig;
use crate::dns::RecordLookup;
use crate::error::{ConfigError, ResolutionFailure};
use crate::generators::Candidate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationState {
    Pending,
    PrimaryConfirmed,
    Confirmed,
    Rejected {
        stage: Stage,
        failure: ResolutionFailure,
    },
}

impl VerificationState {
    /// Applies the outcome of the next stage. Terminal states are unchanged.
    pub fn advance(self, outcome: Result<(), ResolutionFailure>) -> Self {
        match (self, outcome) {
            (Self::Pending, Ok(())) => Self::PrimaryConfirmed,
            (Self::Pending, Err(failure)) => Self::Rejected {
                stage: Stage::Primary,
                failure,
            },
            (Self::PrimaryConfirmed, Ok(())) => Self::Confirmed,
            (Self::PrimaryConfirmed, Err(failure)) => Self::Rejected {
                stage: Stage::Secondary,
                failure,
            },
            (terminal, _) => terminal,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Rejected { .. })
    }
}

/// Final state of one candidate.
#[derive(Debug, Clone)]
pub struct Verification {
    pub candidate: Candidate,
    /// Name as queried, with root dot
    pub fqdn: String,
    pub state: VerificationState,
}

pub struct ExistenceVerifier {
    primary: Arc<dyn RecordLookup>,
    secondary: Arc<dyn RecordLookup>,
    lookup_timeout: Duration,
    secondary_record_type: RecordType,
    concurrency: usize,
}

impl ExistenceVerifier {
    pub fn new(
        primary: Arc<dyn RecordLookup>,
        secondary: Arc<dyn RecordLookup>,
        lookup_timeout: Duration,
        secondary_record_type: RecordType,
        concurrency: usize,
    ) -> Self {
        Self {
            primary,
            secondary,
            lookup_timeout,
            secondary_record_type,
            concurrency: concurrency.max(1),
        }
    }

    pub fn from_config(
        config: &AnalysisConfig,
        primary: Arc<dyn RecordLookup>,
        secondary: Arc<dyn RecordLookup>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(
            primary,
            secondary,
            config.lookup_timeout(),
            config.secondary_record_type()?,
            config.max_concurrent_lookups,
        ))
    }

    pub async fn verify(&self, candidate: Candidate) -> Verification {
        let fqdn = format!("{}.", candidate.domain.trim_end_matches('.'));

        let primary = self.primary_stage(&fqdn).await;
        let mut state = VerificationState::Pending.advance(primary);

        if state == VerificationState::PrimaryConfirmed {
            let secondary = self.secondary_stage(&fqdn).await;
            state = state.advance(secondary);
        }

        if let VerificationState::Rejected { stage, failure } = &state {
            debug!("{} rejected at {:?} stage: {}", fqdn, stage, failure);
        }

        Verification {
            candidate,
            fqdn,
            state,
        }
    }

    /// Verifies `candidates` with at most `concurrency` in flight, yielding
    /// results in completion order.
    pub fn verify_all(
        &self,
        candidates: Vec<Candidate>,
    ) -> impl Stream<Item = Verification> + '_ {
        stream::iter(candidates)
            .map(move |candidate| self.verify(candidate))
            .buffer_unordered(self.concurrency)
    }

    async fn primary_stage(&self, fqdn: &str) -> Result<(), ResolutionFailure> {
        // The slot is held until the lookup ends; only the lookup is timed
        let _slot = self.primary.reserve().await?;
        self.run_stage(self.primary.lookup_a(fqdn)).await
    }

    async fn secondary_stage(&self, fqdn: &str) -> Result<(), ResolutionFailure> {
        let _slot = self.secondary.reserve().await?;
        self.run_stage(self.secondary.lookup_records(fqdn, self.secondary_record_type))
            .await
    }

    async fn run_stage<F>(&self, lookup: F) -> Result<(), ResolutionFailure>
    where
        F: Future<Output = Result<usize, ResolutionFailure>>,
    {
        match timeout(self.lookup_timeout, lookup).await {
            Err(_) => Err(ResolutionFailure::Timeout),
            Ok(Ok(0)) => Err(ResolutionFailure::NoAnswer),
            Ok(Ok(_)) => Ok(()),
            Ok(Err(failure)) => Err(failure),
        }
    }
}
