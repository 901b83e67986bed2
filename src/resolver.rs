use anyhow::Result;
use async_trait::async_trait;
use kube::Client;
use tracing::info;

use crate::kubernetes::{list_deployment_pods, targets_from_pods};
use crate::types::{Target, TargetGroup};

/// Produces the targets of a run, grouped by the post they are reported in.
#[async_trait]
pub trait TargetResolver: Send + Sync {
    async fn resolve(&self) -> Result<Vec<TargetGroup>>;
}

/// Targets taken verbatim from configuration; name and address are the same string.
pub struct StaticResolver {
    targets: Vec<String>,
}

impl StaticResolver {
    pub fn new(targets: Vec<String>) -> Self {
        Self { targets }
    }
}

#[async_trait]
impl TargetResolver for StaticResolver {
    async fn resolve(&self) -> Result<Vec<TargetGroup>> {
        if self.targets.is_empty() {
            return Ok(Vec::new());
        }
        let targets = self
            .targets
            .iter()
            .map(|t| Target::new(t.clone(), t.clone()))
            .collect();
        Ok(vec![TargetGroup {
            label: self.targets.join(", "),
            targets,
        }])
    }
}

/// Pods of each configured deployment, one group per deployment.
pub struct ClusterResolver {
    client: Client,
    namespace: String,
    deployments: Vec<String>,
}

impl ClusterResolver {
    pub fn new(client: Client, namespace: impl Into<String>, deployments: Vec<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            deployments,
        }
    }
}

#[async_trait]
impl TargetResolver for ClusterResolver {
    async fn resolve(&self) -> Result<Vec<TargetGroup>> {
        let mut groups = Vec::with_capacity(self.deployments.len());
        for deployment in &self.deployments {
            let pods = list_deployment_pods(&self.client, &self.namespace, deployment).await?;
            let targets = targets_from_pods(&pods);
            info!("Deployment {} resolved to {} pods", deployment, targets.len());
            groups.push(TargetGroup {
                label: deployment.clone(),
                targets,
            });
        }
        Ok(groups)
    }
}
