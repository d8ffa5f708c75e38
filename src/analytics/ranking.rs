use crate::analytics::scoring;
use crate::domain::models::Review;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct DepartmentRanking {
    pub department_id: Uuid,
    pub department_name: String,
    pub average_score: f64,
    pub review_count: usize,
    pub rank: usize,
}

/// Rank departments for one period by their average-of-averages score,
/// highest first; ties broken by department name. Departments with no
/// managerial reviews in the period are omitted.
pub fn rank_departments(
    names: &HashMap<Uuid, String>,
    reviews_by_department: &HashMap<Uuid, Vec<Review>>,
) -> Vec<DepartmentRanking> {
    let mut rankings: Vec<DepartmentRanking> = reviews_by_department
        .iter()
        .filter_map(|(dept_id, reviews)| {
            let average = scoring::average_of_averages(reviews)?;
            let count = reviews.iter().filter(|r| !r.is_self_assessment()).count();
            Some(DepartmentRanking {
                department_id: *dept_id,
                department_name: names
                    .get(dept_id)
                    .cloned()
                    .unwrap_or_else(|| "Unknown".to_string()),
                average_score: average,
                review_count: count,
                rank: 0,
            })
        })
        .collect();

    rankings.sort_by(|a, b| {
        b.average_score
            .partial_cmp(&a.average_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.department_name.cmp(&b.department_name))
    });

    for (idx, entry) in rankings.iter_mut().enumerate() {
        entry.rank = idx + 1;
    }
    rankings
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn review(department: Uuid, employee: Uuid, score: f64) -> Review {
        Review {
            id: Uuid::new_v4(),
            employee_id: employee,
            reviewer_id: Uuid::new_v4(),
            department_id: department,
            period: "Q1 2025".to_string(),
            answers: serde_json::json!([]),
            overall_score: Some(score),
            score: None,
            comment: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn orders_by_score_then_name() {
        let eng = Uuid::new_v4();
        let sales = Uuid::new_v4();
        let ops = Uuid::new_v4();
        let names: HashMap<Uuid, String> = [
            (eng, "Engineering".to_string()),
            (sales, "Sales".to_string()),
            (ops, "Operations".to_string()),
        ]
        .into();

        let mut by_dept: HashMap<Uuid, Vec<Review>> = HashMap::new();
        by_dept.insert(eng, vec![review(eng, Uuid::new_v4(), 4.0)]);
        by_dept.insert(sales, vec![review(sales, Uuid::new_v4(), 4.0)]);
        by_dept.insert(ops, vec![review(ops, Uuid::new_v4(), 5.0)]);

        let ranked = rank_departments(&names, &by_dept);
        let order: Vec<&str> = ranked.iter().map(|r| r.department_name.as_str()).collect();
        assert_eq!(order, vec!["Operations", "Engineering", "Sales"]);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[2].rank, 3);
    }

    #[test]
    fn departments_without_managerial_reviews_are_omitted() {
        let dept = Uuid::new_v4();
        let employee = Uuid::new_v4();
        let names: HashMap<Uuid, String> = [(dept, "Legal".to_string())].into();

        let mut self_only = review(dept, employee, 5.0);
        self_only.reviewer_id = employee;
        let mut by_dept: HashMap<Uuid, Vec<Review>> = HashMap::new();
        by_dept.insert(dept, vec![self_only]);

        assert!(rank_departments(&names, &by_dept).is_empty());
    }
}
