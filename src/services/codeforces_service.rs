use crate::error::{Error, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hard timeout on every outbound call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Fixed throttle applied before each request to stay under the Codeforces
/// rate limit.
const REQUEST_DELAY: Duration = Duration::from_millis(500);
const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Response envelope used by every Codeforces API method.
/// Codeforces documentation: https://codeforces.com/apiHelp
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", tag = "status")]
pub enum CfEnvelope<T> {
    Ok { result: T },
    Failed { comment: String },
}

/// https://codeforces.com/apiHelp/objects#User
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CfUser {
    pub handle: String,
    pub rating: Option<i32>,
    pub max_rating: Option<i32>,
}

/// https://codeforces.com/apiHelp/objects#Problem
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CfProblem {
    pub contest_id: Option<i64>,
    pub index: String,
    pub name: String,
    pub rating: Option<i32>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// https://codeforces.com/apiHelp/objects#Submission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CfSubmission {
    pub id: i64,
    pub creation_time_seconds: i64,
    pub problem: CfProblem,
    pub verdict: Option<String>,
    pub programming_language: String,
}

/// https://codeforces.com/apiHelp/objects#RatingChange
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CfRatingChange {
    pub contest_id: i64,
    pub contest_name: String,
    pub rank: i64,
    pub rating_update_time_seconds: i64,
    pub old_rating: i32,
    pub new_rating: i32,
}

#[derive(Clone)]
pub struct CodeforcesService {
    client: Client,
    base_url: String,
}

impl CodeforcesService {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap(),
            base_url,
        }
    }

    /// Fetch the user's profile. A nonexistent handle is a distinguished
    /// outcome and maps to `Ok(None)` rather than an error.
    pub async fn fetch_user_info(&self, handle: &str) -> Result<Option<CfUser>> {
        match self
            .call::<Vec<CfUser>>("user.info", &[("handles", handle)])
            .await
        {
            Ok(users) => Ok(users.into_iter().next()),
            Err(Error::HandleNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fetch the user's full submission history in one call (no paging).
    pub async fn fetch_submissions(&self, handle: &str) -> Result<Vec<CfSubmission>> {
        match self
            .call::<Vec<CfSubmission>>("user.status", &[("handle", handle)])
            .await
        {
            Ok(submissions) => Ok(submissions),
            Err(Error::HandleNotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Fetch the user's rated contest history.
    pub async fn fetch_rating_history(&self, handle: &str) -> Result<Vec<CfRatingChange>> {
        match self
            .call::<Vec<CfRatingChange>>("user.rating", &[("handle", handle)])
            .await
        {
            Ok(changes) => Ok(changes),
            Err(Error::HandleNotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Throttled call with fixed-delay retries. "handle not found" is never
    /// retried; everything else gets up to [`MAX_ATTEMPTS`] tries before the
    /// error is surfaced.
    async fn call<T>(&self, method: &str, params: &[(&str, &str)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, method);
        let mut attempt = 0;
        loop {
            attempt += 1;
            tokio::time::sleep(REQUEST_DELAY).await;
            match self.call_once(&url, params).await {
                Ok(result) => return Ok(result),
                Err(e @ Error::HandleNotFound(_)) => return Err(e),
                Err(e) if attempt < MAX_ATTEMPTS => {
                    tracing::warn!(method, attempt, error = %e, "Codeforces call failed, retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn call_once<T>(&self, url: &str, params: &[(&str, &str)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await?
            .error_for_status()?;
        let envelope: CfEnvelope<T> = response.json().await?;
        match envelope {
            CfEnvelope::Ok { result } => Ok(result),
            CfEnvelope::Failed { comment } => {
                if comment.to_lowercase().contains("not found") {
                    Err(Error::HandleNotFound(comment))
                } else {
                    Err(Error::Upstream(comment))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_parses_ok_result() {
        let raw = r#"{"status":"OK","result":[{"handle":"tourist","rating":3726,"maxRating":3979}]}"#;
        let envelope: CfEnvelope<Vec<CfUser>> = serde_json::from_str(raw).unwrap();
        match envelope {
            CfEnvelope::Ok { result } => {
                assert_eq!(result.len(), 1);
                assert_eq!(result[0].handle, "tourist");
                assert_eq!(result[0].max_rating, Some(3979));
            }
            CfEnvelope::Failed { .. } => panic!("expected OK envelope"),
        }
    }

    #[test]
    fn envelope_parses_failure_comment() {
        let raw = r#"{"status":"FAILED","comment":"handles: User with handle nobody_here not found"}"#;
        let envelope: CfEnvelope<Vec<CfUser>> = serde_json::from_str(raw).unwrap();
        match envelope {
            CfEnvelope::Failed { comment } => assert!(comment.contains("not found")),
            CfEnvelope::Ok { .. } => panic!("expected FAILED envelope"),
        }
    }

    #[test]
    fn submission_defaults_missing_optional_fields() {
        let raw = r#"{
            "id": 1,
            "creationTimeSeconds": 1700000000,
            "problem": {"index": "A", "name": "Theatre Square"},
            "programmingLanguage": "Rust"
        }"#;
        let submission: CfSubmission = serde_json::from_str(raw).unwrap();
        assert!(submission.verdict.is_none());
        assert!(submission.problem.rating.is_none());
        assert!(submission.problem.contest_id.is_none());
        assert!(submission.problem.tags.is_empty());
    }
}
