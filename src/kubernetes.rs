use std::path::Path;

use anyhow::{anyhow, Context, Result};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client};
use tracing::{debug, warn};

use crate::parsing::label_selector;
use crate::types::Target;

/// Builds a client from a local kubeconfig in developer mode, otherwise from
/// the in-cluster service account.
pub async fn build_client(developer_mode: bool, kubeconfig: Option<&Path>) -> Result<Client> {
    let config = if developer_mode {
        let path = kubeconfig.ok_or_else(|| anyhow!("No kubeconfig path available (set HOME or KUBECONFIG)"))?;
        let kubeconfig = Kubeconfig::read_from(path)
            .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
        kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .context("Failed to load kubeconfig")?
    } else {
        kube::Config::incluster().context("Failed to load in-cluster config")?
    };
    Client::try_from(config).context("Unable to create k8s client")
}

/// Selector for the pods of a deployment: its own labels, or the pod
/// selector when it carries none.
pub fn deployment_selector(deployment: &Deployment) -> Option<String> {
    let labels = deployment
        .metadata
        .labels
        .as_ref()
        .filter(|l| !l.is_empty())
        .or_else(|| {
            deployment
                .spec
                .as_ref()
                .and_then(|s| s.selector.match_labels.as_ref())
                .filter(|l| !l.is_empty())
        })?;
    Some(label_selector(labels))
}

pub fn targets_from_pods(pods: &[Pod]) -> Vec<Target> {
    let mut targets = Vec::new();
    for pod in pods {
        let name = match pod.metadata.name.as_ref() {
            Some(n) => n.clone(),
            None => {
                warn!("Skipping pod without a name");
                continue;
            }
        };
        match pod.status.as_ref().and_then(|s| s.pod_ip.as_ref()) {
            Some(ip) if !ip.is_empty() => targets.push(Target::new(name, ip.clone())),
            _ => warn!("Skipping pod {} without an IP address", name),
        }
    }
    targets
}

pub async fn list_deployment_pods(client: &Client, namespace: &str, deployment: &str) -> Result<Vec<Pod>> {
    let deployments: Api<Deployment> = Api::namespaced(client.clone(), namespace);
    let d = deployments
        .get(deployment)
        .await
        .with_context(|| format!("Unable to get deployment {}/{}", namespace, deployment))?;

    let selector = deployment_selector(&d)
        .ok_or_else(|| anyhow!("Deployment {}/{} has no labels to select pods by", namespace, deployment))?;
    debug!("Listing pods in {} with selector {}", namespace, selector);

    let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let list = pods
        .list(&ListParams::default().labels(&selector))
        .await
        .with_context(|| format!("Unable to list pods for deployment {}/{}", namespace, deployment))?;
    Ok(list.items)
}
