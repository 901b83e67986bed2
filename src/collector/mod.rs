use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use crate::parsing::profiling_seconds;
use crate::types::{Config, ProfileArtifact, ProfileKind, Target};

/// Fetches heap and CPU profiles for a list of targets.
#[async_trait]
pub trait ProfileCollector: Send + Sync {
    /// Returns two artifacts per target, heap before cpu, in target order.
    async fn collect(&self, targets: &[Target]) -> Result<Vec<ProfileArtifact>>;
}

#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub port: u16,
    /// Passed through verbatim as the `seconds` query parameter.
    pub profiling_time: String,
    pub output_dir: PathBuf,
    pub request_timeout: Duration,
}

impl CollectorSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            port: cfg.pprof_port,
            profiling_time: cfg.profiling_time.clone(),
            output_dir: cfg.output_dir.clone(),
            request_timeout: cfg.request_timeout,
        }
    }

    pub fn profile_url(&self, target: &Target, kind: ProfileKind) -> String {
        match kind {
            ProfileKind::Heap => format!("http://{}:{}/debug/pprof/heap", target.address, self.port),
            ProfileKind::Cpu => format!(
                "http://{}:{}/debug/pprof/profile?seconds={}",
                target.address, self.port, self.profiling_time
            ),
        }
    }

    /// The CPU endpoint holds the connection for the whole sampling window.
    pub fn timeout_for(&self, kind: ProfileKind) -> Duration {
        match (kind, profiling_seconds(&self.profiling_time)) {
            (ProfileKind::Cpu, Some(secs)) => self.request_timeout.saturating_add(Duration::from_secs(secs)),
            _ => self.request_timeout,
        }
    }
}

/// Pulls profiles from the pprof debug endpoint over HTTP, one request at a time.
pub struct HttpProfileCollector {
    client: reqwest::Client,
    settings: CollectorSettings,
}

impl HttpProfileCollector {
    pub fn new(client: reqwest::Client, settings: CollectorSettings) -> Self {
        Self { client, settings }
    }

    async fn fetch(&self, target: &Target, kind: ProfileKind) -> Result<ProfileArtifact> {
        let artifact = ProfileArtifact::new(&self.settings.output_dir, &target.name, kind);
        let url = self.settings.profile_url(target, kind);

        let res = self
            .client
            .get(&url)
            .timeout(self.settings.timeout_for(kind))
            .send()
            .await
            .with_context(|| format!("Failed to fetch {} profile from {}", kind, url))?;
        let res = res
            .error_for_status()
            .with_context(|| format!("Debug endpoint {} returned an error", url))?;
        let body = res
            .bytes()
            .await
            .with_context(|| format!("Failed to read {} profile body from {}", kind, url))?;

        tokio::fs::write(&artifact.path, &body)
            .await
            .with_context(|| format!("Failed to write {}", artifact.path.display()))?;
        Ok(artifact)
    }
}

#[async_trait]
impl ProfileCollector for HttpProfileCollector {
    async fn collect(&self, targets: &[Target]) -> Result<Vec<ProfileArtifact>> {
        let mut artifacts = Vec::with_capacity(targets.len() * 2);
        for target in targets {
            info!("Running memory profiling for {}", target.name);
            artifacts.push(self.fetch(target, ProfileKind::Heap).await?);

            info!("Running cpu profiling for {}", target.name);
            artifacts.push(self.fetch(target, ProfileKind::Cpu).await?);
        }
        Ok(artifacts)
    }
}
