use serde::{Deserialize, Serialize};

use super::states::JobState;

/// Statistics for a single job, as returned by `stats-job`.
///
/// Field names mirror the dash-separated keys of the server's YAML.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct JobStats {
    pub id: u64,
    pub tube: String,
    pub state: JobState,
    /// priority set by the last put/release/bury
    pub pri: u32,
    /// seconds since creation
    pub age: u32,
    pub delay: u32,
    pub ttr: u32,
    /// seconds until the job returns to the ready queue
    #[serde(rename = "time-left")]
    pub time_left: u32,
    /// earliest binlog file containing the job
    pub file: u32,
    pub reserves: u64,
    pub timeouts: u64,
    pub releases: u64,
    pub buries: u64,
    pub kicks: u64,
}

/// Statistics for a single tube, as returned by `stats-tube`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TubeStats {
    pub name: String,
    /// ready jobs with priority < 1024
    #[serde(rename = "current-jobs-urgent")]
    pub current_jobs_urgent: u64,
    #[serde(rename = "current-jobs-ready")]
    pub current_jobs_ready: u64,
    #[serde(rename = "current-jobs-reserved")]
    pub current_jobs_reserved: u64,
    #[serde(rename = "current-jobs-delayed")]
    pub current_jobs_delayed: u64,
    #[serde(rename = "current-jobs-buried")]
    pub current_jobs_buried: u64,
    #[serde(rename = "total-jobs")]
    pub total_jobs: u64,
    #[serde(rename = "current-using")]
    pub current_using: u64,
    /// clients watching this tube and blocked on a reserve
    #[serde(rename = "current-waiting")]
    pub current_waiting: u64,
    #[serde(rename = "current-watching")]
    pub current_watching: u64,
    /// total seconds this tube has been paused for
    pub pause: u32,
    #[serde(rename = "cmd-delete")]
    pub cmd_delete: u64,
    #[serde(rename = "cmd-pause-tube")]
    pub cmd_pause_tube: u64,
    #[serde(rename = "pause-time-left")]
    pub pause_time_left: u32,
}
