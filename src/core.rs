//! Analysis orchestration.
//!
//! An [`Analyzer`] runs one pipeline per authentic domain:
//! decompose → generate (four generators, in parallel) → aggregate against
//! known variants → verify against two resolvers → write confirmed entries.
//!
//! Runs can be awaited directly with [`Analyzer::analyze`] or handed to the
//! runtime with [`Analyzer::submit`], which validates the input, spawns the
//! run and returns immediately.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::aggregate::{CandidateAggregator, CandidateSet};
use crate::config::AnalysisConfig;
use crate::dns::{DnsResolver, RecordLookup};
use crate::domain::{AuthenticDomain, Decomposition};
use crate::error::AnalysisError;
use crate::generators::{default_generators, generate_all, Generator, GeneratorKind};
use crate::retry::RetryConfig;
use crate::store::BlacklistStore;
use crate::verify::{ExistenceVerifier, Stage, VerificationState};
use crate::writer::{BlacklistWriter, WriteReport};

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub run_id: String,
    /// Authentic FQDN, with root dot
    pub original: String,
    pub base: String,
    pub suffix: String,
    /// Raw output size per generator
    pub generated: BTreeMap<GeneratorKind, usize>,
    /// Candidates sent to verification
    pub unique_candidates: usize,
    /// Candidates skipped because they were already on record
    pub known_skipped: usize,
    pub rejected_primary: usize,
    pub rejected_secondary: usize,
    /// Newly confirmed lookalikes, FQDN with root dot, sorted
    pub confirmed: Vec<String>,
    pub write: WriteReport,
    pub processing_time_ms: u64,
}

/// Handle to a submitted background run. Dropping it does not cancel the run.
pub struct AnalysisTicket {
    pub run_id: Uuid,
    pub domain: AuthenticDomain,
    handle: JoinHandle<Result<AnalysisReport, AnalysisError>>,
}

impl AnalysisTicket {
    /// Waits for the run to finish.
    pub async fn wait(self) -> Result<AnalysisReport, AnalysisError> {
        self.handle
            .await
            .map_err(|e| AnalysisError::Background(e.to_string()))?
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

pub struct Analyzer {
    config: Arc<AnalysisConfig>,
    generators: Arc<Vec<Box<dyn Generator>>>,
    verifier: Arc<ExistenceVerifier>,
    store: Arc<dyn BlacklistStore>,
}

impl Analyzer {
    /// Analyzer querying the resolvers named in `config`.
    pub fn new(config: AnalysisConfig, store: Arc<dyn BlacklistStore>) -> Result<Self, AnalysisError> {
        let primary: Arc<dyn RecordLookup> = Arc::new(DnsResolver::primary(&config));
        let secondary: Arc<dyn RecordLookup> = Arc::new(DnsResolver::secondary(&config));
        Self::with_resolvers(config, store, primary, secondary)
    }

    /// Analyzer with caller-supplied resolver endpoints.
    pub fn with_resolvers(
        config: AnalysisConfig,
        store: Arc<dyn BlacklistStore>,
        primary: Arc<dyn RecordLookup>,
        secondary: Arc<dyn RecordLookup>,
    ) -> Result<Self, AnalysisError> {
        config.validate()?;
        let verifier = ExistenceVerifier::from_config(&config, primary, secondary)?;

        Ok(Self {
            generators: Arc::new(default_generators(&config)),
            config: Arc::new(config),
            verifier: Arc::new(verifier),
            store,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn BlacklistStore> {
        &self.store
    }

    /// Normalizes `domain` and runs the full pipeline to completion.
    pub async fn analyze(&self, domain: &str) -> Result<AnalysisReport, AnalysisError> {
        let domain = AuthenticDomain::parse(domain)?;
        self.analyze_domain(&domain).await
    }

    pub async fn analyze_domain(&self, domain: &AuthenticDomain) -> Result<AnalysisReport, AnalysisError> {
        self.run(domain, Uuid::new_v4()).await
    }

    /// Validates `domain` now and runs the pipeline in the background.
    ///
    /// Invalid input is reported immediately; failures inside the run are
    /// logged and available through [`AnalysisTicket::wait`].
    pub fn submit(&self, domain: &str) -> Result<AnalysisTicket, AnalysisError> {
        let domain = AuthenticDomain::parse(domain)?;
        let run_id = Uuid::new_v4();
        let analyzer = self.clone();
        let target = domain.clone();

        let handle = tokio::spawn(async move {
            let result = analyzer.run(&target, run_id).await;
            if let Err(ref e) = result {
                error!("Analysis {} of {} failed: {}", run_id, target, e);
            }
            result
        });

        info!("Queued analysis {} for {}", run_id, domain);
        Ok(AnalysisTicket {
            run_id,
            domain,
            handle,
        })
    }

    /// Decomposes, generates and aggregates without touching DNS.
    pub async fn candidates(
        &self,
        domain: &AuthenticDomain,
    ) -> Result<(Decomposition, CandidateSet), AnalysisError> {
        let decomposition = domain.decompose().map_err(|e| {
            warn!("Cannot analyze {}: {}", domain, e);
            e
        })?;

        let known = self.store.list_malicious_variants(domain.as_str()).await?;

        let generators = Arc::clone(&self.generators);
        let base = decomposition.base.clone();
        let tlds = self.config.tlds.clone();
        let outputs = tokio::task::spawn_blocking(move || generate_all(&generators, &base, &tlds))
            .await
            .map_err(|e| AnalysisError::Background(e.to_string()))?;

        let aggregator = CandidateAggregator::new(&known).excluding(domain.without_root());
        Ok((decomposition, aggregator.aggregate(&outputs)))
    }

    async fn run(&self, domain: &AuthenticDomain, run_id: Uuid) -> Result<AnalysisReport, AnalysisError> {
        let span = info_span!("analysis", run_id = %run_id, domain = %domain);
        self.run_inner(domain, run_id).instrument(span).await
    }

    async fn run_inner(&self, domain: &AuthenticDomain, run_id: Uuid) -> Result<AnalysisReport, AnalysisError> {
        let start = Instant::now();
        let (decomposition, set) = self.candidates(domain).await?;

        info!(
            "Base label {:?} under {:?}: {} unique candidates, {} already known",
            decomposition.base,
            decomposition.suffix,
            set.len(),
            set.known_skipped
        );

        let mut writer = BlacklistWriter::new(
            Arc::clone(&self.store),
            domain.as_str(),
            self.config.batch_size,
            RetryConfig::with_attempts(self.config.flush_retries),
        );

        let mut confirmed = Vec::new();
        let mut rejected_primary = 0;
        let mut rejected_secondary = 0;

        // Results are consumed here, one at a time, so the writer has a single producer
        let mut results = Box::pin(self.verifier.verify_all(set.candidates.clone()));
        while let Some(verification) = results.next().await {
            match verification.state {
                VerificationState::Confirmed => {
                    info!("Confirmed lookalike {}", verification.fqdn);
                    writer.record(&verification.fqdn).await;
                    confirmed.push(verification.fqdn);
                }
                VerificationState::Rejected {
                    stage: Stage::Primary,
                    ..
                } => rejected_primary += 1,
                VerificationState::Rejected {
                    stage: Stage::Secondary,
                    ..
                } => rejected_secondary += 1,
                VerificationState::Pending | VerificationState::PrimaryConfirmed => {}
            }
        }

        let write = writer.finish().await?;
        if !write.is_clean() {
            warn!(
                "Storage reported {} append and {} flush failures",
                write.append_failures, write.flush_failures
            );
        }

        confirmed.sort();
        let report = AnalysisReport {
            run_id: run_id.to_string(),
            original: domain.to_string(),
            base: decomposition.base,
            suffix: decomposition.suffix,
            generated: set.generated,
            unique_candidates: set.candidates.len(),
            known_skipped: set.known_skipped,
            rejected_primary,
            rejected_secondary,
            confirmed,
            write,
            processing_time_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "Analysis finished in {}ms: {} confirmed, {} committed",
            report.processing_time_ms,
            report.confirmed.len(),
            report.write.committed
        );
        Ok(report)
    }
}

impl Clone for Analyzer {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            generators: Arc::clone(&self.generators),
            verifier: Arc::clone(&self.verifier),
            store: Arc::clone(&self.store),
        }
    }
}
