use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::parsing::{parse_flag, split_list};
use crate::types::{Config, TargetSource};

pub const DEFAULT_PPROF_PORT: u16 = 8067;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Trait for abstracting environment variable access
pub trait EnvironmentProvider {
    fn get_var(&self, key: &str) -> Option<String>;
}

/// Production implementation using std::env
pub struct SystemEnvironment;

impl EnvironmentProvider for SystemEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Mock implementation for testing
#[derive(Debug, Default)]
pub struct MockEnvironment {
    vars: HashMap<String, String>,
}

impl MockEnvironment {
    pub fn new() -> Self {
        Self {
            vars: HashMap::new(),
        }
    }

    pub fn set_var<K, V>(&mut self, key: K, value: V) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn with_var<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.set_var(key, value);
        self
    }
}

impl EnvironmentProvider for MockEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn load_config() -> Result<Config> {
    load_config_with_env(&SystemEnvironment)
}

fn required<E: EnvironmentProvider>(env: &E, key: &str) -> Result<String> {
    env.get_var(key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow!("{} environment variable is not set", key))
}

fn optional<E: EnvironmentProvider>(env: &E, key: &str) -> Option<String> {
    env.get_var(key).filter(|v| !v.is_empty())
}

pub fn load_config_with_env<E: EnvironmentProvider>(env: &E) -> Result<Config> {
    let upload_api_url = required(env, "UPLOAD_API_URL")?;
    let post_api_url = required(env, "POST_API_URL")?;

    let cluster = match optional(env, "TARGET_SOURCE").as_deref() {
        None | Some("static") => false,
        Some("cluster") => true,
        Some(other) => bail!("Invalid TARGET_SOURCE '{}' (expected static or cluster)", other),
    };

    let target_source = if cluster {
        let namespace = required(env, "MATTERMOST_NAMESPACE")?;
        let deployments = optional(env, "MATTERMOST_DEPLOYMENTS")
            .map(|v| split_list(&v))
            .unwrap_or_default();
        let developer_mode = parse_flag(env.get_var("DEVELOPER_MODE").as_deref());
        let kubeconfig = if developer_mode {
            optional(env, "KUBECONFIG")
                .map(PathBuf::from)
                .or_else(|| optional(env, "HOME").map(|h| PathBuf::from(h).join(".kube").join("config")))
        } else {
            None
        };
        TargetSource::Cluster {
            deployments,
            namespace,
            developer_mode,
            kubeconfig,
        }
    } else {
        let targets = optional(env, "MATTERMOST_PROFILE_TARGETS")
            .map(|v| split_list(&v))
            .unwrap_or_default();
        TargetSource::Static { targets }
    };

    let profiling_time = required(env, "PROFILING_TIME")?;
    let channel_id = required(env, "CHANNEL_ID")?;
    let token = required(env, "TOKEN")?;

    let pprof_port: u16 = match optional(env, "PPROF_PORT") {
        Some(v) => v.trim().parse().context("Invalid PPROF_PORT")?,
        None => DEFAULT_PPROF_PORT,
    };

    let timeout_secs: u64 = match optional(env, "REQUEST_TIMEOUT_SECONDS") {
        Some(v) => v.trim().parse().context("Invalid REQUEST_TIMEOUT_SECONDS")?,
        None => DEFAULT_REQUEST_TIMEOUT_SECS,
    };

    let output_dir = optional(env, "PROFILE_OUTPUT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    Ok(Config {
        upload_api_url,
        post_api_url,
        profiling_time,
        channel_id,
        token,
        target_source,
        pprof_port,
        request_timeout: Duration::from_secs(timeout_secs),
        output_dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_env() -> MockEnvironment {
        MockEnvironment::new()
            .with_var("UPLOAD_API_URL", "https://chat.example.com/api/v4/files")
            .with_var("POST_API_URL", "https://chat.example.com/api/v4/posts")
            .with_var("PROFILING_TIME", "30")
            .with_var("CHANNEL_ID", "chan123")
            .with_var("TOKEN", "secret")
    }

    #[test]
    fn test_config_loading_static() {
        let env = base_env().with_var("MATTERMOST_PROFILE_TARGETS", "app-1,app-2");

        let config = load_config_with_env(&env).unwrap();

        assert_eq!(config.upload_api_url, "https://chat.example.com/api/v4/files");
        assert_eq!(config.post_api_url, "https://chat.example.com/api/v4/posts");
        assert_eq!(config.profiling_time, "30");
        assert_eq!(config.channel_id, "chan123");
        assert_eq!(config.token, "secret");
        assert_eq!(
            config.target_source,
            TargetSource::Static {
                targets: vec!["app-1".to_string(), "app-2".to_string()]
            }
        );
    }

    #[test]
    fn test_config_loading_defaults() {
        let config = load_config_with_env(&base_env()).unwrap();

        assert_eq!(config.target_source, TargetSource::Static { targets: vec![] });
        assert_eq!(config.pprof_port, 8067);
        assert_eq!(config.request_timeout, Duration::from_secs(300));
        assert_eq!(config.output_dir, PathBuf::from("."));
    }

    #[test]
    fn test_config_loading_missing_required() {
        for key in ["UPLOAD_API_URL", "POST_API_URL", "PROFILING_TIME", "CHANNEL_ID", "TOKEN"] {
            let mut env = base_env();
            env.set_var(key, "");
            let result = load_config_with_env(&env);
            assert!(result.is_err());
            assert!(result.unwrap_err().to_string().contains(key), "Failed for key: {}", key);
        }
    }

    #[test]
    fn test_missing_values_reported_in_order() {
        let env = MockEnvironment::new();
        let err = load_config_with_env(&env).unwrap_err();
        assert!(err.to_string().contains("UPLOAD_API_URL"));

        let env = MockEnvironment::new()
            .with_var("UPLOAD_API_URL", "http://up")
            .with_var("TARGET_SOURCE", "cluster");
        let err = load_config_with_env(&env).unwrap_err();
        assert!(err.to_string().contains("POST_API_URL"));

        // namespace is checked before the profiling duration
        let env = MockEnvironment::new()
            .with_var("UPLOAD_API_URL", "http://up")
            .with_var("POST_API_URL", "http://post")
            .with_var("TARGET_SOURCE", "cluster");
        let err = load_config_with_env(&env).unwrap_err();
        assert!(err.to_string().contains("MATTERMOST_NAMESPACE"));

        let env = MockEnvironment::new()
            .with_var("UPLOAD_API_URL", "http://up")
            .with_var("POST_API_URL", "http://post")
            .with_var("TOKEN", "t");
        let err = load_config_with_env(&env).unwrap_err();
        assert!(err.to_string().contains("PROFILING_TIME"));
    }

    #[test]
    fn test_config_loading_cluster() {
        let env = base_env()
            .with_var("TARGET_SOURCE", "cluster")
            .with_var("MATTERMOST_NAMESPACE", "community")
            .with_var("MATTERMOST_DEPLOYMENTS", "mm-app, mm-jobs")
            .with_var("HOME", "/home/ops");

        let config = load_config_with_env(&env).unwrap();
        assert_eq!(
            config.target_source,
            TargetSource::Cluster {
                deployments: vec!["mm-app".to_string(), "mm-jobs".to_string()],
                namespace: "community".to_string(),
                developer_mode: false,
                kubeconfig: None,
            }
        );
    }

    #[test]
    fn test_developer_mode_kubeconfig() {
        let env = base_env()
            .with_var("TARGET_SOURCE", "cluster")
            .with_var("MATTERMOST_NAMESPACE", "community")
            .with_var("DEVELOPER_MODE", "true")
            .with_var("HOME", "/home/ops");

        let config = load_config_with_env(&env).unwrap();
        match config.target_source {
            TargetSource::Cluster { developer_mode, kubeconfig, deployments, .. } => {
                assert!(developer_mode);
                assert!(deployments.is_empty());
                assert_eq!(kubeconfig, Some(PathBuf::from("/home/ops/.kube/config")));
            }
            other => panic!("unexpected target source: {:?}", other),
        }

        let env = base_env()
            .with_var("TARGET_SOURCE", "cluster")
            .with_var("MATTERMOST_NAMESPACE", "community")
            .with_var("DEVELOPER_MODE", "true")
            .with_var("KUBECONFIG", "/tmp/kc")
            .with_var("HOME", "/home/ops");
        let config = load_config_with_env(&env).unwrap();
        match config.target_source {
            TargetSource::Cluster { kubeconfig, .. } => {
                assert_eq!(kubeconfig, Some(PathBuf::from("/tmp/kc")));
            }
            other => panic!("unexpected target source: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_target_source() {
        let env = base_env().with_var("TARGET_SOURCE", "consul");
        let result = load_config_with_env(&env);
        assert!(result.unwrap_err().to_string().contains("TARGET_SOURCE"));

        // the upload URL is still reported first
        let env = MockEnvironment::new().with_var("TARGET_SOURCE", "consul");
        let err = load_config_with_env(&env).unwrap_err();
        assert!(err.to_string().contains("UPLOAD_API_URL"));

        let env = MockEnvironment::new()
            .with_var("TARGET_SOURCE", "consul")
            .with_var("UPLOAD_API_URL", "http://up");
        let err = load_config_with_env(&env).unwrap_err();
        assert!(err.to_string().contains("POST_API_URL"));
    }

    #[test]
    fn test_numeric_parsing_with_invalid_values() {
        let env = base_env().with_var("PPROF_PORT", "http");
        assert!(load_config_with_env(&env).unwrap_err().to_string().contains("PPROF_PORT"));

        let env = base_env().with_var("REQUEST_TIMEOUT_SECONDS", "soon");
        assert!(load_config_with_env(&env)
            .unwrap_err()
            .to_string()
            .contains("REQUEST_TIMEOUT_SECONDS"));

        let env = base_env()
            .with_var("PPROF_PORT", "6060")
            .with_var("REQUEST_TIMEOUT_SECONDS", "45")
            .with_var("PROFILE_OUTPUT_DIR", "/var/tmp/profiles");
        let config = load_config_with_env(&env).unwrap();
        assert_eq!(config.pprof_port, 6060);
        assert_eq!(config.request_timeout, Duration::from_secs(45));
        assert_eq!(config.output_dir, PathBuf::from("/var/tmp/profiles"));
    }

    #[test]
    fn test_profiling_time_not_validated() {
        let env = base_env().with_var("PROFILING_TIME", "half a minute");
        let config = load_config_with_env(&env).unwrap();
        assert_eq!(config.profiling_time, "half a minute");
    }
}
