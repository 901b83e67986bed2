use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::parsing::profile_file_name;

#[derive(Debug, Clone)]
pub struct Config {
    pub upload_api_url: String,
    pub post_api_url: String,
    pub profiling_time: String,
    pub channel_id: String,
    pub token: String,
    pub target_source: TargetSource,
    pub pprof_port: u16,
    pub request_timeout: Duration,
    pub output_dir: PathBuf,
}

/// Where the list of profiling targets comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetSource {
    /// Hostnames or addresses listed directly in the environment.
    Static { targets: Vec<String> },
    /// Pods belonging to the named deployments.
    Cluster {
        deployments: Vec<String>,
        namespace: String,
        developer_mode: bool,
        kubeconfig: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub address: String,
}

impl Target {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// Targets whose profiles are announced together in one post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetGroup {
    pub label: String,
    pub targets: Vec<Target>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileKind {
    Heap,
    Cpu,
}

impl ProfileKind {
    /// Suffix used in the local file name.
    pub fn file_suffix(&self) -> &'static str {
        match self {
            ProfileKind::Heap => "mem",
            ProfileKind::Cpu => "cpu",
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileKind::Heap => write!(f, "memory"),
            ProfileKind::Cpu => write!(f, "cpu"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileArtifact {
    pub target: String,
    pub kind: ProfileKind,
    pub path: PathBuf,
}

impl ProfileArtifact {
    pub fn new(output_dir: &std::path::Path, target: &str, kind: ProfileKind) -> Self {
        Self {
            target: target.to_string(),
            kind,
            path: output_dir.join(profile_file_name(target, kind)),
        }
    }

    pub fn file_name(&self) -> String {
        profile_file_name(&self.target, self.kind)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadRecord {
    #[serde(rename = "id")]
    pub file_id: String,
    #[serde(rename = "user_id", default)]
    pub owner_user_id: String,
    #[serde(rename = "name", default)]
    pub file_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub file_infos: Vec<UploadRecord>,
}

#[derive(Debug, Serialize)]
pub struct PostPayload {
    pub channel_id: String,
    pub message: String,
    pub file_ids: Vec<String>,
}
