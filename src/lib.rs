// Public modules
pub mod types;
pub mod config;
pub mod parsing;
pub mod kubernetes;
pub mod resolver;
pub mod collector;
pub mod mattermost;
pub mod pipeline;

// Re-export commonly used items
pub use types::*;
pub use config::{load_config, load_config_with_env, EnvironmentProvider, SystemEnvironment, MockEnvironment};
pub use parsing::{split_list, parse_flag, profile_file_name, profiling_seconds, label_selector};
pub use resolver::{TargetResolver, StaticResolver, ClusterResolver};
pub use collector::{ProfileCollector, HttpProfileCollector, CollectorSettings};
pub use mattermost::{
    build_post_payload, post_files, upload_file, ArtifactPublisher, FormField, MattermostPublisher,
    MattermostSettings, UploadError,
};
pub use pipeline::{configure, Pipeline, PipelineError, RunReport, RunState, Stage};
