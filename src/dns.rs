use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use trust_dns_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::proto::error::ProtoErrorKind;
use trust_dns_resolver::proto::op::ResponseCode;
use trust_dns_resolver::proto::rr::RecordType;
use trust_dns_resolver::TokioAsyncResolver as AsyncResolver;

use crate::config::AnalysisConfig;
use crate::error::ResolutionFailure;
use crate::rate_limit::{RateLimitGuard, RateLimiter};

/// One DNS endpoint the verifier can query.
///
/// Implementations report the size of the answer set; an empty answer is
/// reported as `Ok(0)` and treated by the caller as a failure.
///
/// Callers take a slot with [`reserve`](RecordLookup::reserve) and hold it
/// for the duration of one lookup. Waiting for the slot is not part of the
/// lookup and does not count against its timeout.
#[async_trait]
pub trait RecordLookup: Send + Sync {
    /// Human-readable endpoint, used in diagnostics.
    fn endpoint(&self) -> String;

    /// Waits until this endpoint may be sent another query.
    async fn reserve(&self) -> Result<Option<RateLimitGuard>, ResolutionFailure> {
        Ok(None)
    }

    async fn lookup_a(&self, fqdn: &str) -> Result<usize, ResolutionFailure>;

    async fn lookup_records(
        &self,
        fqdn: &str,
        record_type: RecordType,
    ) -> Result<usize, ResolutionFailure>;
}

/// A resolver pinned to a single nameserver, e.g. `8.8.8.8:53`.
pub struct DnsResolver {
    resolver: AsyncResolver,
    endpoint: SocketAddr,
    rate_limiter: Arc<RateLimiter>,
}

impl DnsResolver {
    pub fn new(endpoint: SocketAddr, timeout: Duration, rate_limiter: Arc<RateLimiter>) -> Self {
        let group = NameServerConfigGroup::from_ips_clear(&[endpoint.ip()], endpoint.port(), true);
        let config = ResolverConfig::from_parts(None, vec![], group);

        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        // A single failed attempt is final
        opts.attempts = 1;
        opts.use_hosts_file = false;
        opts.cache_size = 1024;

        Self {
            resolver: AsyncResolver::tokio(config, opts),
            endpoint,
            rate_limiter,
        }
    }

    /// The A-record (stage 1) resolver from `config`.
    pub fn primary(config: &AnalysisConfig) -> Self {
        Self::from_config(config.primary_resolver, config)
    }

    /// The independent confirmation (stage 2) resolver from `config`.
    pub fn secondary(config: &AnalysisConfig) -> Self {
        Self::from_config(config.secondary_resolver, config)
    }

    fn from_config(endpoint: SocketAddr, config: &AnalysisConfig) -> Self {
        let limiter = RateLimiter::for_resolver(config.queries_per_minute, config.max_concurrent_lookups);
        Self::new(endpoint, config.lookup_timeout(), Arc::new(limiter))
    }

    /// Overrides the query budget, e.g. to share one limiter between endpoints.
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = limiter;
        self
    }
}

#[async_trait]
impl RecordLookup for DnsResolver {
    fn endpoint(&self) -> String {
        self.endpoint.to_string()
    }

    async fn reserve(&self) -> Result<Option<RateLimitGuard>, ResolutionFailure> {
        let guard = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| ResolutionFailure::Other(e.to_string()))?;
        Ok(Some(guard))
    }

    async fn lookup_a(&self, fqdn: &str) -> Result<usize, ResolutionFailure> {
        debug!("A lookup for {} via {}", fqdn, self.endpoint);
        let lookup = self.resolver.ipv4_lookup(fqdn).await.map_err(|e| classify(&e))?;
        Ok(lookup.iter().count())
    }

    async fn lookup_records(
        &self,
        fqdn: &str,
        record_type: RecordType,
    ) -> Result<usize, ResolutionFailure> {
        debug!("{} lookup for {} via {}", record_type, fqdn, self.endpoint);
        let lookup = self
            .resolver
            .lookup(fqdn, record_type)
            .await
            .map_err(|e| classify(&e))?;
        Ok(lookup.iter().count())
    }
}

/// Maps a resolver error onto the failure taxonomy.
pub fn classify(err: &ResolveError) -> ResolutionFailure {
    match err.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. }
            if *response_code == ResponseCode::NXDomain =>
        {
            ResolutionFailure::NxDomain
        }
        ResolveErrorKind::NoRecordsFound { .. } => ResolutionFailure::NoAnswer,
        ResolveErrorKind::NoConnections => ResolutionFailure::NoNameservers,
        ResolveErrorKind::Timeout => ResolutionFailure::Timeout,
        ResolveErrorKind::Proto(proto) if matches!(proto.kind(), ProtoErrorKind::Timeout) => {
            ResolutionFailure::Timeout
        }
        _ => ResolutionFailure::Other(err.to_string()),
    }
}
