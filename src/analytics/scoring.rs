use crate::domain::models::{Review, ReviewAnswer};
use std::collections::HashMap;
use uuid::Uuid;

/// Effective score of a review: `overall_score` when present and > 0, else
/// the legacy single `score`, else 0.
pub fn effective_score(overall_score: Option<f64>, legacy_score: Option<f64>) -> f64 {
    match overall_score {
        Some(v) if v > 0.0 => v,
        _ => legacy_score.unwrap_or(0.0),
    }
}

pub fn review_score(review: &Review) -> f64 {
    effective_score(review.overall_score, review.score)
}

/// Overall score of a submitted answer set: the mean of its rating answers.
/// Choice and free-text answers carry no numeric weight. None when the set
/// has no ratings.
pub fn overall_from_answers(answers: &[ReviewAnswer]) -> Option<f64> {
    let ratings: Vec<f64> = answers
        .iter()
        .filter_map(|a| a.rating)
        .map(f64::from)
        .collect();
    if ratings.is_empty() {
        return None;
    }
    Some(ratings.iter().sum::<f64>() / ratings.len() as f64)
}

/// Average each employee's own review average first, then average those.
/// A flat mean over rows would let employees with more reviews dominate.
pub fn average_of_averages(reviews: &[Review]) -> Option<f64> {
    let per_employee = per_employee_averages(reviews);
    if per_employee.is_empty() {
        return None;
    }
    let sum: f64 = per_employee.values().sum();
    Some(sum / per_employee.len() as f64)
}

/// Mean effective score per employee, self-assessments excluded.
pub fn per_employee_averages(reviews: &[Review]) -> HashMap<Uuid, f64> {
    let mut sums: HashMap<Uuid, (f64, usize)> = HashMap::new();
    for review in reviews {
        if review.is_self_assessment() {
            continue;
        }
        let entry = sums.entry(review.employee_id).or_insert((0.0, 0));
        entry.0 += review_score(review);
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(id, (sum, count))| (id, sum / count as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn review(employee: Uuid, reviewer: Uuid, overall: Option<f64>, legacy: Option<f64>) -> Review {
        Review {
            id: Uuid::new_v4(),
            employee_id: employee,
            reviewer_id: reviewer,
            department_id: Uuid::new_v4(),
            period: "Q1 2025".to_string(),
            answers: serde_json::json!([]),
            overall_score: overall,
            score: legacy,
            comment: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn rating(value: i16) -> ReviewAnswer {
        ReviewAnswer {
            question_id: Uuid::new_v4(),
            rating: Some(value),
            choice: None,
            text: None,
        }
    }

    #[test]
    fn effective_score_fallback_chain() {
        assert_eq!(effective_score(Some(4.2), Some(3.0)), 4.2);
        // A non-positive overall is not "present and truthy".
        assert_eq!(effective_score(Some(0.0), Some(3.0)), 3.0);
        assert_eq!(effective_score(Some(-1.0), Some(3.0)), 3.0);
        assert_eq!(effective_score(None, Some(3.0)), 3.0);
        assert_eq!(effective_score(None, None), 0.0);
    }

    #[test]
    fn overall_ignores_non_rating_answers() {
        let answers = vec![
            rating(4),
            rating(2),
            ReviewAnswer {
                question_id: Uuid::new_v4(),
                rating: None,
                choice: Some("Exceeds".to_string()),
                text: None,
            },
        ];
        assert_eq!(overall_from_answers(&answers), Some(3.0));
    }

    #[test]
    fn overall_is_none_without_ratings() {
        let answers = vec![ReviewAnswer {
            question_id: Uuid::new_v4(),
            rating: None,
            choice: None,
            text: Some("solid quarter".to_string()),
        }];
        assert_eq!(overall_from_answers(&answers), None);
        assert_eq!(overall_from_answers(&[]), None);
    }

    #[test]
    fn average_of_averages_weighs_employees_equally() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let reviewer = Uuid::new_v4();
        // Alice has four 5.0 reviews, Bob a single 1.0. A flat mean over rows
        // would be 4.2; per-employee averaging gives 3.0.
        let reviews = vec![
            review(alice, reviewer, Some(5.0), None),
            review(alice, reviewer, Some(5.0), None),
            review(alice, reviewer, Some(5.0), None),
            review(alice, reviewer, Some(5.0), None),
            review(bob, reviewer, Some(1.0), None),
        ];
        assert_eq!(average_of_averages(&reviews), Some(3.0));
    }

    #[test]
    fn self_assessments_are_excluded_from_aggregates() {
        let alice = Uuid::new_v4();
        let reviewer = Uuid::new_v4();
        let reviews = vec![
            review(alice, reviewer, Some(3.0), None),
            review(alice, alice, Some(5.0), None),
        ];
        assert_eq!(average_of_averages(&reviews), Some(3.0));

        let only_self = vec![review(alice, alice, Some(5.0), None)];
        assert_eq!(average_of_averages(&only_self), None);
    }
}
