//! End-to-end pipeline tests: raw Codeforces API payloads through
//! normalization, aggregation and inactivity detection. No network or
//! database involved.

use chrono::{Duration, Utc};
use serde_json::json;
use student_progress_backend::models::codeforces_record::RatingBucket;
use student_progress_backend::services::codeforces_service::{
    CfEnvelope, CfRatingChange, CfSubmission,
};
use student_progress_backend::services::inactivity::is_inactive;
use student_progress_backend::services::normalize::{
    attach_unsolved_counts, normalize_contests, normalize_submissions,
};
use student_progress_backend::services::statistics::compute_statistics;

fn submissions_envelope() -> serde_json::Value {
    let now = Utc::now();
    let ts = |days_ago: i64| (now - Duration::days(days_ago)).timestamp();

    // Newest-first, as the live API returns. Problem 1999-B is solved
    // twice; 1999-C is attempted but never accepted.
    json!({
        "status": "OK",
        "result": [
            {
                "id": 104,
                "creationTimeSeconds": ts(2),
                "problem": {
                    "contestId": 1999, "index": "B", "name": "Card Game",
                    "rating": 1200, "tags": ["games", "greedy"]
                },
                "verdict": "OK",
                "programmingLanguage": "GNU C++20"
            },
            {
                "id": 103,
                "creationTimeSeconds": ts(5),
                "problem": {
                    "contestId": 1999, "index": "C", "name": "Showering",
                    "rating": 1000, "tags": ["sortings"]
                },
                "verdict": "WRONG_ANSWER",
                "programmingLanguage": "GNU C++20"
            },
            {
                "id": 102,
                "creationTimeSeconds": ts(12),
                "problem": {
                    "contestId": 1999, "index": "B", "name": "Card Game",
                    "rating": 1200, "tags": ["games", "greedy"]
                },
                "verdict": "OK",
                "programmingLanguage": "GNU C++20"
            },
            {
                "id": 101,
                "creationTimeSeconds": ts(40),
                "problem": {
                    "contestId": 2000, "index": "A", "name": "Primary Task",
                    "rating": 800, "tags": ["implementation"]
                },
                "verdict": "OK",
                "programmingLanguage": "PyPy 3"
            },
            {
                "id": 100,
                "creationTimeSeconds": ts(41),
                "problem": {
                    "contestId": 2000, "index": "B", "name": "Seating in a Bus",
                    "tags": []
                },
                "verdict": "TESTING",
                "programmingLanguage": "PyPy 3"
            }
        ]
    })
}

#[test]
fn raw_submission_history_flows_through_to_statistics() {
    let envelope: CfEnvelope<Vec<CfSubmission>> =
        serde_json::from_value(submissions_envelope()).unwrap();
    let raw = match envelope {
        CfEnvelope::Ok { result } => result,
        CfEnvelope::Failed { comment } => panic!("unexpected failure: {}", comment),
    };
    assert_eq!(raw.len(), 5);

    let submissions = normalize_submissions(raw);
    let stats = compute_statistics(&submissions, Utc::now());

    // Two unique accepted problems out of three accepted submissions.
    assert_eq!(stats.total_solved, 2);
    assert!(stats.total_solved <= submissions.len() as i64);
    assert_eq!(stats.average_rating, 1000.0);

    let hardest = stats.hardest.as_ref().unwrap();
    assert_eq!(hardest.problem_key, "1999-B");
    assert_eq!(hardest.rating, 1200);

    assert_eq!(
        stats.buckets,
        vec![
            RatingBucket { bucket: 800, count: 1 },
            RatingBucket { bucket: 1200, count: 1 },
        ]
    );

    // The kept solve of 1999-B is the earliest accepted one (12 days
    // ago), so only the 30- and 90-day windows see it.
    assert_eq!(stats.windows[0].days, 7);
    assert_eq!(stats.windows[0].solved, 0);
    assert_eq!(stats.windows[1].days, 30);
    assert_eq!(stats.windows[1].solved, 1);
    assert_eq!(stats.windows[2].days, 90);
    assert_eq!(stats.windows[2].solved, 2);
}

#[test]
fn contest_history_gains_unsolved_counts_from_submissions() {
    let raw_contests: Vec<CfRatingChange> = serde_json::from_value(json!([
        {
            "contestId": 1999,
            "contestName": "Codeforces Round 964 (Div. 4)",
            "rank": 1234,
            "ratingUpdateTimeSeconds": 1722790800,
            "oldRating": 1100,
            "newRating": 1163
        },
        {
            "contestId": 2000,
            "contestName": "Codeforces Round 966 (Div. 3)",
            "rank": 980,
            "ratingUpdateTimeSeconds": 1723741200,
            "oldRating": 1163,
            "newRating": 1204
        }
    ]))
    .unwrap();

    let envelope: CfEnvelope<Vec<CfSubmission>> =
        serde_json::from_value(submissions_envelope()).unwrap();
    let submissions = match envelope {
        CfEnvelope::Ok { result } => normalize_submissions(result),
        CfEnvelope::Failed { comment } => panic!("unexpected failure: {}", comment),
    };

    let mut contests = normalize_contests(raw_contests);
    attach_unsolved_counts(&mut contests, &submissions);

    assert_eq!(contests[0].contest_name, "Codeforces Round 964 (Div. 4)");
    // 1999-C was attempted and never accepted.
    assert_eq!(contests[0].problems_unsolved, 1);
    // 2000-B only reached TESTING, so it counts as unsolved too.
    assert_eq!(contests[1].problems_unsolved, 1);
    assert_eq!(contests[1].new_rating, 1204);
}

#[test]
fn inactivity_follows_the_latest_normalized_submission() {
    let envelope: CfEnvelope<Vec<CfSubmission>> =
        serde_json::from_value(submissions_envelope()).unwrap();
    let submissions = match envelope {
        CfEnvelope::Ok { result } => normalize_submissions(result),
        CfEnvelope::Failed { comment } => panic!("unexpected failure: {}", comment),
    };

    let now = Utc::now();
    let last = submissions.iter().map(|s| s.submitted_at).max();

    // Latest submission is 2 days old: active at a 7-day threshold,
    // inactive at a 1-day threshold.
    assert!(!is_inactive(last, 7, now));
    assert!(is_inactive(last, 1, now));
    assert!(is_inactive(None, 7, now));
}

#[test]
fn handle_not_found_envelope_is_distinguishable() {
    let envelope: CfEnvelope<Vec<CfSubmission>> = serde_json::from_value(json!({
        "status": "FAILED",
        "comment": "handle: User with handle ghost_user not found"
    }))
    .unwrap();

    match envelope {
        CfEnvelope::Failed { comment } => {
            assert!(comment.to_lowercase().contains("not found"));
        }
        CfEnvelope::Ok { .. } => panic!("expected FAILED envelope"),
    }
}
