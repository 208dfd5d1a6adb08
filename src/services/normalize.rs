use crate::models::codeforces_record::{ContestResult, Submission};
use crate::services::codeforces_service::{CfRatingChange, CfSubmission};
use chrono::DateTime;
use std::collections::{HashMap, HashSet};

/// Codeforces verdict string for an accepted submission.
pub const VERDICT_ACCEPTED: &str = "OK";

/// Map raw API submissions to the persisted shape: internal field names,
/// epoch seconds to timestamps, missing ratings to `None`, missing tag
/// lists to empty. No filtering, no aggregation.
pub fn normalize_submissions(raw: Vec<CfSubmission>) -> Vec<Submission> {
    raw.into_iter()
        .map(|submission| Submission {
            id: submission.id,
            problem_key: problem_key(
                submission.problem.contest_id,
                &submission.problem.index,
                &submission.problem.name,
            ),
            problem_name: submission.problem.name,
            rating: submission.problem.rating,
            verdict: submission
                .verdict
                .unwrap_or_else(|| "UNKNOWN".to_string()),
            language: submission.programming_language,
            submitted_at: DateTime::from_timestamp(submission.creation_time_seconds, 0)
                .unwrap_or_default(),
            tags: submission.problem.tags,
        })
        .collect()
}

/// Map raw rating changes to contest participation records. The
/// `problems_unsolved` count is filled in afterwards by
/// [`attach_unsolved_counts`] once submissions are available.
pub fn normalize_contests(raw: Vec<CfRatingChange>) -> Vec<ContestResult> {
    raw.into_iter()
        .map(|change| ContestResult {
            contest_id: change.contest_id,
            contest_name: change.contest_name,
            rank: change.rank,
            old_rating: change.old_rating,
            new_rating: change.new_rating,
            rated_at: DateTime::from_timestamp(change.rating_update_time_seconds, 0)
                .unwrap_or_default(),
            problems_unsolved: 0,
        })
        .collect()
}

/// For each contest, count the problems the student attempted there but
/// never got accepted, across the whole submission history.
pub fn attach_unsolved_counts(contests: &mut [ContestResult], submissions: &[Submission]) {
    let mut attempted: HashMap<i64, HashSet<&str>> = HashMap::new();
    let mut solved: HashMap<i64, HashSet<&str>> = HashMap::new();

    for submission in submissions {
        let Some(contest_id) = contest_id_of(&submission.problem_key) else {
            continue;
        };
        attempted
            .entry(contest_id)
            .or_default()
            .insert(submission.problem_key.as_str());
        if submission.verdict == VERDICT_ACCEPTED {
            solved
                .entry(contest_id)
                .or_default()
                .insert(submission.problem_key.as_str());
        }
    }

    for contest in contests.iter_mut() {
        let attempted_count = attempted
            .get(&contest.contest_id)
            .map(|keys| keys.len())
            .unwrap_or(0);
        let solved_count = solved
            .get(&contest.contest_id)
            .map(|keys| keys.len())
            .unwrap_or(0);
        contest.problems_unsolved = (attempted_count - solved_count) as i64;
    }
}

/// `"<contestId>-<index>"` when the contest id is known, else the problem
/// name (problemset entries without a contest).
fn problem_key(contest_id: Option<i64>, index: &str, name: &str) -> String {
    match contest_id {
        Some(id) => format!("{}-{}", id, index),
        None => name.to_string(),
    }
}

fn contest_id_of(key: &str) -> Option<i64> {
    key.split_once('-').and_then(|(id, _)| id.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::codeforces_service::CfProblem;

    fn raw_submission(
        id: i64,
        contest_id: Option<i64>,
        index: &str,
        rating: Option<i32>,
        verdict: Option<&str>,
    ) -> CfSubmission {
        CfSubmission {
            id,
            creation_time_seconds: 1_700_000_000 + id,
            problem: CfProblem {
                contest_id,
                index: index.to_string(),
                name: format!("Problem {}", index),
                rating,
                tags: vec!["greedy".to_string()],
            },
            verdict: verdict.map(|v| v.to_string()),
            programming_language: "Rust".to_string(),
        }
    }

    #[test]
    fn submissions_map_to_internal_fields() {
        let normalized =
            normalize_submissions(vec![raw_submission(7, Some(1999), "B", Some(1200), Some("OK"))]);
        assert_eq!(normalized.len(), 1);
        let submission = &normalized[0];
        assert_eq!(submission.problem_key, "1999-B");
        assert_eq!(submission.rating, Some(1200));
        assert_eq!(submission.verdict, "OK");
        assert_eq!(submission.submitted_at.timestamp(), 1_700_000_007);
        assert_eq!(submission.tags, vec!["greedy".to_string()]);
    }

    #[test]
    fn missing_rating_and_verdict_get_defaults() {
        let normalized = normalize_submissions(vec![raw_submission(1, Some(1), "A", None, None)]);
        assert_eq!(normalized[0].rating, None);
        assert_eq!(normalized[0].verdict, "UNKNOWN");
    }

    #[test]
    fn problem_without_contest_keys_by_name() {
        let normalized = normalize_submissions(vec![raw_submission(1, None, "A", None, Some("OK"))]);
        assert_eq!(normalized[0].problem_key, "Problem A");
    }

    #[test]
    fn contests_map_to_internal_fields() {
        let contests = normalize_contests(vec![CfRatingChange {
            contest_id: 600,
            contest_name: "Round 600".to_string(),
            rank: 42,
            rating_update_time_seconds: 1_600_000_000,
            old_rating: 1400,
            new_rating: 1450,
        }]);
        assert_eq!(contests[0].contest_id, 600);
        assert_eq!(contests[0].rank, 42);
        assert_eq!(contests[0].rated_at.timestamp(), 1_600_000_000);
        assert_eq!(contests[0].problems_unsolved, 0);
    }

    #[test]
    fn unsolved_counts_exclude_eventually_accepted_problems() {
        let submissions = normalize_submissions(vec![
            raw_submission(1, Some(600), "A", None, Some("WRONG_ANSWER")),
            raw_submission(2, Some(600), "A", None, Some("OK")),
            raw_submission(3, Some(600), "B", None, Some("TIME_LIMIT_EXCEEDED")),
            raw_submission(4, Some(601), "C", None, Some("OK")),
        ]);
        let mut contests = normalize_contests(vec![
            CfRatingChange {
                contest_id: 600,
                contest_name: "Round 600".to_string(),
                rank: 1,
                rating_update_time_seconds: 0,
                old_rating: 0,
                new_rating: 0,
            },
            CfRatingChange {
                contest_id: 601,
                contest_name: "Round 601".to_string(),
                rank: 1,
                rating_update_time_seconds: 0,
                old_rating: 0,
                new_rating: 0,
            },
        ]);

        attach_unsolved_counts(&mut contests, &submissions);
        assert_eq!(contests[0].problems_unsolved, 1);
        assert_eq!(contests[1].problems_unsolved, 0);
    }

    #[test]
    fn normalized_shape_round_trips_through_json() {
        let normalized =
            normalize_submissions(vec![raw_submission(9, Some(2), "D", Some(1800), Some("OK"))]);
        let json = serde_json::to_value(&normalized).unwrap();
        let back: Vec<Submission> = serde_json::from_value(json).unwrap();
        assert_eq!(back, normalized);
    }
}
