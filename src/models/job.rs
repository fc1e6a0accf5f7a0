use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

/// Status of an image request as reported by CloudSight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
pub enum JobStatus {
    /// Recognition is still running; keep polling.
    #[serde(rename = "not completed")]
    #[strum(serialize = "not completed")]
    NotCompleted,

    /// Recognition finished; the annotation is in the job payload.
    #[serde(rename = "completed")]
    #[strum(serialize = "completed")]
    Completed,

    /// The token does not match any image.
    #[serde(rename = "not found")]
    #[strum(serialize = "not found")]
    NotFound,

    /// The image was not recognized; see [`SkipReason`].
    #[serde(rename = "skipped")]
    #[strum(serialize = "skipped")]
    Skipped,

    /// Processing exceeded the allowed TTL. The job can be reposted.
    #[serde(rename = "timeout")]
    #[strum(serialize = "timeout")]
    Timeout,
}

impl JobStatus {
    /// Whether polling this job again can change anything.
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::NotCompleted)
    }
}

/// Why CloudSight declined to annotate an image.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SkipReason {
    Offensive,
    Blurry,
    Close,
    Dark,
    Bright,
    Unsure,
}

/// One submitted image request and its latest known state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    /// Token returned at submission. Status responses may omit it, in which
    /// case the client fills in the token it polled with.
    #[serde(default)]
    pub token: String,

    pub status: JobStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<SkipReason>,

    /// Every other field of the response body (name, ttl, categories, ...).
    #[serde(flatten)]
    pub annotation: Map<String, Value>,
}

impl Job {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Service annotation, only once the job has completed.
    pub fn result(&self) -> Option<&Map<String, Value>> {
        (self.status == JobStatus::Completed).then_some(&self.annotation)
    }

    /// Skip reason, only when the job was skipped.
    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self.status {
            JobStatus::Skipped => self.reason,
            _ => None,
        }
    }

    /// Recognized description of the image (`name` annotation).
    pub fn name(&self) -> Option<&str> {
        self.result()?.get("name")?.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_wire_tokens() {
        let job: Job = serde_json::from_str(r#"{"token":"t1","status":"not completed"}"#).unwrap();
        assert_eq!(job.status, JobStatus::NotCompleted);
        assert!(!job.is_terminal());

        assert_eq!(JobStatus::NotFound.to_string(), "not found");
        assert_eq!(JobStatus::from_str("timeout").unwrap(), JobStatus::Timeout);
        assert_eq!(
            serde_json::to_value(JobStatus::NotCompleted).unwrap(),
            serde_json::json!("not completed")
        );
    }

    #[test]
    fn test_completed_job_exposes_annotation() {
        let job: Job = serde_json::from_str(
            r#"{"token":"t2","url":"https://example.com/cat.jpg","status":"completed","name":"grey tabby cat","ttl":54.0}"#,
        )
        .unwrap();

        assert!(job.is_terminal());
        assert_eq!(job.name(), Some("grey tabby cat"));
        let result = job.result().unwrap();
        assert_eq!(result.get("ttl"), Some(&serde_json::json!(54.0)));
        assert!(!result.contains_key("status"));
        assert!(job.skip_reason().is_none());
    }

    #[test]
    fn test_skipped_job_reason() {
        let job: Job =
            serde_json::from_str(r#"{"token":"t3","status":"skipped","reason":"blurry"}"#).unwrap();
        assert_eq!(job.skip_reason(), Some(SkipReason::Blurry));
        assert!(job.result().is_none());
        assert_eq!(SkipReason::Offensive.to_string(), "offensive");
    }

    #[test]
    fn test_pending_job_has_no_result() {
        let job: Job =
            serde_json::from_str(r#"{"token":"t4","status":"not completed","name":"partial"}"#).unwrap();
        assert!(job.result().is_none());
        assert!(job.name().is_none());
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let parsed = serde_json::from_str::<Job>(r#"{"token":"t5","status":"exploded"}"#);
        assert!(parsed.is_err());
    }
}
