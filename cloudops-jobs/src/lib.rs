pub mod action_log;
pub mod backup_job;
pub mod failure_report_job;
pub mod idle_reaper_job;
pub mod log_classifier;
pub mod provider_manager;
