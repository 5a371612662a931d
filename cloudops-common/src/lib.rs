pub mod config;
pub mod report;

pub use config::{
    BackupConfig, ConfigError, JenkinsConfig, ProviderSettings, ReaperConfig, RetentionScope,
    ScalewaySettings,
};
pub use report::{BatchReport, ItemFailure};
