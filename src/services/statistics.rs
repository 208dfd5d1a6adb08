use crate::models::codeforces_record::{
    HardestProblem, RatingBucket, Statistics, Submission, WindowStats,
};
use crate::services::normalize::VERDICT_ACCEPTED;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashSet};

/// Width of one problem-rating histogram bucket.
pub const BUCKET_SIZE: i32 = 100;

/// Trailing activity windows, in days.
pub const WINDOW_DAYS: [i64; 3] = [7, 30, 90];

/// Compute the derived statistics block for one student's normalized
/// submission history. Pure; `now` anchors the trailing windows so the
/// result is deterministic for a fixed instant.
///
/// Accepted submissions are sorted by time before deduplication, so the
/// kept submission per problem is the earliest accepted one regardless of
/// the order the API returned them in.
pub fn compute_statistics(submissions: &[Submission], now: DateTime<Utc>) -> Statistics {
    let mut accepted: Vec<&Submission> = submissions
        .iter()
        .filter(|s| s.verdict == VERDICT_ACCEPTED)
        .collect();
    accepted.sort_by_key(|s| (s.submitted_at, s.id));

    let mut seen = HashSet::new();
    let mut solved: Vec<&Submission> = Vec::new();
    for submission in accepted {
        if seen.insert(submission.problem_key.as_str()) {
            solved.push(submission);
        }
    }

    let mut bucket_counts: BTreeMap<i32, i64> = BTreeMap::new();
    let mut hardest: Option<&Submission> = None;
    let mut rating_sum: i64 = 0;
    let mut rated_count: i64 = 0;

    for submission in &solved {
        if let Some(rating) = submission.rating {
            *bucket_counts
                .entry((rating / BUCKET_SIZE) * BUCKET_SIZE)
                .or_insert(0) += 1;
            rating_sum += rating as i64;
            rated_count += 1;
            // Strictly-greater comparison: ties keep the earlier solve.
            if hardest.map_or(true, |h| rating > h.rating.unwrap_or(0)) {
                hardest = Some(submission);
            }
        }
    }

    let average_rating = if rated_count > 0 {
        rating_sum as f64 / rated_count as f64
    } else {
        0.0
    };

    let windows = WINDOW_DAYS
        .iter()
        .map(|&days| {
            let cutoff = now - Duration::days(days);
            let solved_in_window = solved
                .iter()
                .filter(|s| s.submitted_at > cutoff)
                .count() as i64;
            WindowStats {
                days,
                solved: solved_in_window,
                per_day: solved_in_window as f64 / days as f64,
            }
        })
        .collect();

    Statistics {
        total_solved: solved.len() as i64,
        buckets: bucket_counts
            .into_iter()
            .map(|(bucket, count)| RatingBucket { bucket, count })
            .collect(),
        hardest: hardest.map(|s| HardestProblem {
            problem_key: s.problem_key.clone(),
            problem_name: s.problem_name.clone(),
            rating: s.rating.unwrap_or(0),
        }),
        average_rating,
        windows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(
        id: i64,
        problem_key: &str,
        rating: Option<i32>,
        verdict: &str,
        days_ago: i64,
    ) -> Submission {
        Submission {
            id,
            problem_key: problem_key.to_string(),
            problem_name: format!("Problem {}", problem_key),
            rating,
            verdict: verdict.to_string(),
            language: "Rust".to_string(),
            submitted_at: Utc::now() - Duration::days(days_ago),
            tags: Vec::new(),
        }
    }

    #[test]
    fn dedupes_by_problem_and_averages_rated_solves() {
        // Three accepted submissions over two distinct problems: 800 and
        // 1200, with a duplicate 1200 solve of the same problem.
        let submissions = vec![
            submission(1, "1-A", Some(800), "OK", 20),
            submission(2, "2-B", Some(1200), "OK", 10),
            submission(3, "2-B", Some(1200), "OK", 5),
        ];
        let stats = compute_statistics(&submissions, Utc::now());
        assert_eq!(stats.total_solved, 2);
        assert_eq!(stats.average_rating, 1000.0);
        let hardest = stats.hardest.unwrap();
        assert_eq!(hardest.rating, 1200);
        assert_eq!(hardest.problem_key, "2-B");
    }

    #[test]
    fn empty_history_yields_zeroed_block() {
        let stats = compute_statistics(&[], Utc::now());
        assert_eq!(stats.total_solved, 0);
        assert!(stats.buckets.is_empty());
        assert!(stats.hardest.is_none());
        assert_eq!(stats.average_rating, 0.0);
        assert!(stats.windows.iter().all(|w| w.solved == 0 && w.per_day == 0.0));
    }

    #[test]
    fn rejected_submissions_never_count_as_solved() {
        let submissions = vec![
            submission(1, "1-A", Some(900), "WRONG_ANSWER", 3),
            submission(2, "1-A", Some(900), "OK", 2),
            submission(3, "1-B", Some(1000), "TIME_LIMIT_EXCEEDED", 1),
        ];
        let stats = compute_statistics(&submissions, Utc::now());
        assert_eq!(stats.total_solved, 1);
        assert!(stats.total_solved <= submissions.len() as i64);
    }

    #[test]
    fn earliest_accepted_submission_wins_dedupe() {
        // Newest-first input order, as the API usually returns; the kept
        // solve must still be the chronologically earliest one.
        let submissions = vec![
            submission(99, "1-A", Some(800), "OK", 1),
            submission(11, "1-A", Some(800), "OK", 30),
        ];
        let stats = compute_statistics(&submissions, Utc::now());
        assert_eq!(stats.total_solved, 1);
        // The earliest solve is 30 days old, so the 7-day window is empty.
        assert_eq!(stats.windows[0].days, 7);
        assert_eq!(stats.windows[0].solved, 0);
        assert_eq!(stats.windows[1].days, 30);
        assert_eq!(stats.windows[1].solved, 1);
    }

    #[test]
    fn buckets_are_ordered_and_cover_100_point_ranges() {
        let submissions = vec![
            submission(1, "1-A", Some(1250), "OK", 1),
            submission(2, "1-B", Some(1299), "OK", 1),
            submission(3, "2-A", Some(800), "OK", 1),
            submission(4, "3-A", None, "OK", 1),
        ];
        let stats = compute_statistics(&submissions, Utc::now());
        assert_eq!(
            stats.buckets,
            vec![
                RatingBucket { bucket: 800, count: 1 },
                RatingBucket { bucket: 1200, count: 2 },
            ]
        );
        // The unrated solve still counts toward the total.
        assert_eq!(stats.total_solved, 4);
        assert_eq!(stats.average_rating, (1250 + 1299 + 800) as f64 / 3.0);
    }

    #[test]
    fn per_day_rate_divides_by_full_window_length() {
        let submissions = vec![
            submission(1, "1-A", Some(800), "OK", 1),
            submission(2, "1-B", Some(900), "OK", 2),
            submission(3, "1-C", Some(950), "OK", 3),
        ];
        let stats = compute_statistics(&submissions, Utc::now());
        assert_eq!(stats.windows[0].solved, 3);
        assert!((stats.windows[0].per_day - 3.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn deterministic_for_a_fixed_instant() {
        let submissions = vec![
            submission(1, "1-A", Some(800), "OK", 4),
            submission(2, "1-B", None, "OK", 2),
            submission(3, "1-C", Some(1500), "WRONG_ANSWER", 1),
        ];
        let now = Utc::now();
        let first = compute_statistics(&submissions, now);
        let second = compute_statistics(&submissions, now);
        assert_eq!(first, second);
    }
}
