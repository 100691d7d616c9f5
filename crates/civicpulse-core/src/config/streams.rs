//! Upstream event stream configuration.

use serde::{Deserialize, Serialize};

/// Redis connection and consumer-group settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis URL.
    #[serde(default = "default_url")]
    pub url: String,
    /// Consumer group shared by all hub instances.
    #[serde(default = "default_group")]
    pub consumer_group: String,
    /// Consumer name of this process inside the group.
    #[serde(default = "default_consumer")]
    pub consumer_name: String,
    /// How long a blocking read waits before returning empty, in ms.
    #[serde(default = "default_block_ms")]
    pub block_ms: u64,
    /// Maximum entries fetched per read.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            consumer_group: default_group(),
            consumer_name: default_consumer(),
            block_ms: default_block_ms(),
            batch_size: default_batch_size(),
        }
    }
}

/// Stream key per upstream topic plus reconnect backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamsConfig {
    /// Report submission outcomes.
    #[serde(default = "default_submission")]
    pub submission: String,
    /// Media processing outcomes.
    #[serde(default = "default_media")]
    pub media: String,
    /// Newly created reports.
    #[serde(default = "default_report_created")]
    pub report_created: String,
    /// Report status changes.
    #[serde(default = "default_status_change")]
    pub status_change: String,
    /// Staff assignments.
    #[serde(default = "default_assignment")]
    pub assignment: String,
    /// Department escalations.
    #[serde(default = "default_escalation")]
    pub escalation: String,
    /// Staff responses to reports.
    #[serde(default = "default_response")]
    pub response: String,
    /// Initial reconnect backoff in milliseconds.
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,
    /// Backoff ceiling in milliseconds.
    #[serde(default = "default_backoff_max")]
    pub backoff_max_ms: u64,
}

impl Default for StreamsConfig {
    fn default() -> Self {
        Self {
            submission: default_submission(),
            media: default_media(),
            report_created: default_report_created(),
            status_change: default_status_change(),
            assignment: default_assignment(),
            escalation: default_escalation(),
            response: default_response(),
            backoff_base_ms: default_backoff_base(),
            backoff_max_ms: default_backoff_max(),
        }
    }
}

fn default_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_group() -> String {
    "notification-hub".to_string()
}

fn default_consumer() -> String {
    "hub-1".to_string()
}

fn default_block_ms() -> u64 {
    5_000
}

fn default_batch_size() -> usize {
    32
}

fn default_submission() -> String {
    "submission.events".to_string()
}

fn default_media() -> String {
    "media.events".to_string()
}

fn default_report_created() -> String {
    "report.created".to_string()
}

fn default_status_change() -> String {
    "report.status_change".to_string()
}

fn default_assignment() -> String {
    "report.assignment".to_string()
}

fn default_escalation() -> String {
    "report.escalation".to_string()
}

fn default_response() -> String {
    "report.response".to_string()
}

fn default_backoff_base() -> u64 {
    500
}

fn default_backoff_max() -> u64 {
    30_000
}
