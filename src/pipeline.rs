use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::collector::{CollectorSettings, HttpProfileCollector, ProfileCollector};
use crate::config::{load_config_with_env, EnvironmentProvider};
use crate::kubernetes::build_client;
use crate::mattermost::{ArtifactPublisher, MattermostPublisher, MattermostSettings};
use crate::resolver::{ClusterResolver, StaticResolver, TargetResolver};
use crate::types::{Config, ProfileArtifact, TargetGroup, TargetSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configuring,
    Resolving,
    Collecting,
    Publishing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Configuring => "configuring",
            Stage::Resolving => "resolving",
            Stage::Collecting => "collecting",
            Stage::Publishing => "publishing",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running(Stage),
    Done,
    Failed(Stage),
}

impl RunState {
    pub fn start() -> Self {
        RunState::Running(Stage::Configuring)
    }

    /// Next state after the current stage succeeded. Terminal states stay put.
    pub fn advance(self) -> Self {
        match self {
            RunState::Running(Stage::Configuring) => RunState::Running(Stage::Resolving),
            RunState::Running(Stage::Resolving) => RunState::Running(Stage::Collecting),
            RunState::Running(Stage::Collecting) => RunState::Running(Stage::Publishing),
            RunState::Running(Stage::Publishing) => RunState::Done,
            terminal => terminal,
        }
    }

    pub fn fail(self) -> Self {
        match self {
            RunState::Running(stage) => RunState::Failed(stage),
            terminal => terminal,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunState::Running(_))
    }
}

#[derive(Debug, Error)]
#[error("{stage} stage failed")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: anyhow::Error,
}

impl PipelineError {
    pub fn new(stage: Stage, source: anyhow::Error) -> Self {
        Self { stage, source }
    }
}

fn fail(stage: Stage, source: anyhow::Error) -> PipelineError {
    error!("{} stage failed: {:#}", stage, source);
    PipelineError::new(stage, source)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedGroup {
    pub label: String,
    pub file_ids: Vec<String>,
}

#[derive(Debug)]
pub struct RunReport {
    pub state: RunState,
    pub posts: Vec<PostedGroup>,
}

impl RunReport {
    pub fn file_count(&self) -> usize {
        self.posts.iter().map(|p| p.file_ids.len()).sum()
    }
}

/// Loads the run configuration, reporting failures as a configuring-stage error.
pub fn configure<E: EnvironmentProvider>(env: &E) -> Result<Config, PipelineError> {
    load_config_with_env(env).map_err(|e| fail(Stage::Configuring, e))
}

pub struct Pipeline {
    resolver: Arc<dyn TargetResolver>,
    collector: Arc<dyn ProfileCollector>,
    publisher: Arc<dyn ArtifactPublisher>,
}

impl Pipeline {
    pub fn new(
        resolver: Arc<dyn TargetResolver>,
        collector: Arc<dyn ProfileCollector>,
        publisher: Arc<dyn ArtifactPublisher>,
    ) -> Self {
        Self {
            resolver,
            collector,
            publisher,
        }
    }

    /// Wires the HTTP collector and Mattermost publisher with the resolver
    /// selected by the configured target source.
    pub async fn from_config(cfg: &Config) -> Result<Self, PipelineError> {
        let resolver: Arc<dyn TargetResolver> = match &cfg.target_source {
            TargetSource::Static { targets } => Arc::new(StaticResolver::new(targets.clone())),
            TargetSource::Cluster {
                deployments,
                namespace,
                developer_mode,
                kubeconfig,
            } => {
                let client = build_client(*developer_mode, kubeconfig.as_deref())
                    .await
                    .map_err(|e| fail(Stage::Resolving, e))?;
                Arc::new(ClusterResolver::new(client, namespace.clone(), deployments.clone()))
            }
        };

        let http = reqwest::Client::builder()
            .timeout(cfg.request_timeout)
            .build()
            .context("Failed to create HTTP client")
            .map_err(|e| fail(Stage::Configuring, e))?;

        Ok(Self::new(
            resolver,
            Arc::new(HttpProfileCollector::new(http.clone(), CollectorSettings::from_config(cfg))),
            Arc::new(MattermostPublisher::new(http, MattermostSettings::from_config(cfg))),
        ))
    }

    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        // configuration is done by the time a pipeline exists
        let mut state = RunState::start().advance();
        debug!("Run state: {:?}", state);

        let groups = match self.resolver.resolve().await {
            Ok(groups) => groups,
            Err(e) => return Err(self.abort(state, Stage::Resolving, e)),
        };
        let groups: Vec<TargetGroup> = groups
            .into_iter()
            .filter(|g| {
                if g.targets.is_empty() {
                    warn!("No targets found for {}, skipping", g.label);
                }
                !g.targets.is_empty()
            })
            .collect();
        state = state.advance();
        debug!("Run state: {:?}", state);

        let mut collected: Vec<(TargetGroup, Vec<ProfileArtifact>)> = Vec::with_capacity(groups.len());
        for group in groups {
            info!("Running profiling for {}", group.label);
            match self.collector.collect(&group.targets).await {
                Ok(artifacts) => collected.push((group, artifacts)),
                Err(e) => {
                    let e = e.context(format!("Failed to run profiling for {}", group.label));
                    return Err(self.abort(state, Stage::Collecting, e));
                }
            }
        }
        state = state.advance();
        debug!("Run state: {:?}", state);

        let mut posts = Vec::with_capacity(collected.len());
        for (group, artifacts) in &collected {
            match self.publisher.publish(&group.label, artifacts).await {
                Ok(file_ids) => posts.push(PostedGroup {
                    label: group.label.clone(),
                    file_ids,
                }),
                Err(e) => {
                    let e = e.context(format!("Failed to upload and post files for {}", group.label));
                    return Err(self.abort(state, Stage::Publishing, e));
                }
            }
        }
        state = state.advance();
        debug!("Run state: {:?}", state);

        let report = RunReport { state, posts };
        if report.posts.is_empty() {
            info!("No targets to profile, nothing posted");
        } else {
            info!("Posted {} profile files in {} messages", report.file_count(), report.posts.len());
        }
        Ok(report)
    }

    fn abort(&self, state: RunState, stage: Stage, source: anyhow::Error) -> PipelineError {
        debug_assert_eq!(state, RunState::Running(stage));
        debug!("Run state: {:?}", state.fail());
        fail(stage, source)
    }
}
