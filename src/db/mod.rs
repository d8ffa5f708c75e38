pub mod seed;

use crate::domain::models::{
    AssessmentType, Department, DepartmentNode, HodLevel, InputType, Question, QuestionCategory,
    Review, User, UserRole,
};
use anyhow::Result;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, employee_id, name, hash, role, department_id, hod_level, \
     is_active, created_at, updated_at";

const REVIEW_COLUMNS: &str = "id, employee_id, reviewer_id, department_id, period, answers, \
     overall_score, score, comment, created_at, updated_at";

const QUESTION_COLUMNS: &str = "id, text, category, assessment, input, choices, department_id, \
     is_active, created_at, updated_at";

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub struct NewUser {
    pub employee_id: String,
    pub name: String,
    pub hash: String,
    pub role: UserRole,
    pub department_id: Option<Uuid>,
    pub hod_level: Option<HodLevel>,
}

pub struct UserUpdate {
    pub name: String,
    pub role: UserRole,
    pub department_id: Option<Uuid>,
    pub hod_level: Option<HodLevel>,
}

pub async fn find_user_by_employee_id(pool: &PgPool, employee_id: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE employee_id = $1 AND is_active = true"
    ))
    .bind(employee_id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

/// Find by employee id including inactive (admin-only use).
pub async fn find_user_by_employee_id_any(
    pool: &PgPool,
    employee_id: &str,
) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE employee_id = $1"
    ))
    .bind(employee_id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn find_user_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>> {
    let user =
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?;
    Ok(user)
}

pub async fn list_users(pool: &PgPool) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at"
    ))
    .fetch_all(pool)
    .await?;
    Ok(users)
}

pub async fn list_active_employees(pool: &PgPool, department_ids: &[Uuid]) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users \
         WHERE is_active = true AND department_id = ANY($1) \
         ORDER BY name"
    ))
    .bind(department_ids)
    .fetch_all(pool)
    .await?;
    Ok(users)
}

pub async fn insert_user(pool: &PgPool, new_user: &NewUser) -> Result<User> {
    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (id, employee_id, name, hash, role, department_id, hod_level) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&new_user.employee_id)
    .bind(&new_user.name)
    .bind(&new_user.hash)
    .bind(new_user.role)
    .bind(new_user.department_id)
    .bind(new_user.hod_level)
    .fetch_one(pool)
    .await?;
    Ok(user)
}

pub async fn update_user(pool: &PgPool, id: Uuid, update: &UserUpdate) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "UPDATE users \
         SET name = $2, role = $3, department_id = $4, hod_level = $5, updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(id)
    .bind(&update.name)
    .bind(update.role)
    .bind(update.department_id)
    .bind(update.hod_level)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn set_user_active(pool: &PgPool, id: Uuid, is_active: bool) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET is_active = $2, updated_at = NOW() WHERE id = $1 \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(id)
    .bind(is_active)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn update_user_hash(pool: &PgPool, id: Uuid, hash: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE users SET hash = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(hash)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ---------------------------------------------------------------------------
// Departments
// ---------------------------------------------------------------------------

pub async fn find_department(pool: &PgPool, id: Uuid) -> Result<Option<Department>> {
    let department = sqlx::query_as::<_, Department>(
        "SELECT id, name, parent_id, is_active, created_at, updated_at \
         FROM departments WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(department)
}

pub async fn list_departments(pool: &PgPool) -> Result<Vec<Department>> {
    let departments = sqlx::query_as::<_, Department>(
        "SELECT id, name, parent_id, is_active, created_at, updated_at \
         FROM departments ORDER BY name",
    )
    .fetch_all(pool)
    .await?;
    Ok(departments)
}

/// Departments joined with their explicit HOD membership, the input to
/// scope resolution.
pub async fn load_department_nodes(pool: &PgPool) -> Result<Vec<DepartmentNode>> {
    let departments = list_departments(pool).await?;

    let rows = sqlx::query("SELECT department_id, user_id FROM department_hods")
        .fetch_all(pool)
        .await?;
    let mut hods_by_department: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for row in rows {
        let department_id: Uuid = row.try_get("department_id")?;
        let user_id: Uuid = row.try_get("user_id")?;
        hods_by_department
            .entry(department_id)
            .or_default()
            .push(user_id);
    }

    Ok(departments
        .into_iter()
        .map(|d| DepartmentNode {
            hod_ids: hods_by_department.remove(&d.id).unwrap_or_default(),
            id: d.id,
            name: d.name,
            parent_id: d.parent_id,
            is_active: d.is_active,
        })
        .collect())
}

pub async fn insert_department(
    pool: &PgPool,
    name: &str,
    parent_id: Option<Uuid>,
) -> Result<Department> {
    let department = sqlx::query_as::<_, Department>(
        "INSERT INTO departments (id, name, parent_id) VALUES ($1, $2, $3) \
         RETURNING id, name, parent_id, is_active, created_at, updated_at",
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(parent_id)
    .fetch_one(pool)
    .await?;
    Ok(department)
}

pub async fn update_department(
    pool: &PgPool,
    id: Uuid,
    name: &str,
    parent_id: Option<Uuid>,
) -> Result<Option<Department>> {
    let department = sqlx::query_as::<_, Department>(
        "UPDATE departments SET name = $2, parent_id = $3, updated_at = NOW() WHERE id = $1 \
         RETURNING id, name, parent_id, is_active, created_at, updated_at",
    )
    .bind(id)
    .bind(name)
    .bind(parent_id)
    .fetch_optional(pool)
    .await?;
    Ok(department)
}

pub async fn set_department_active(
    pool: &PgPool,
    id: Uuid,
    is_active: bool,
) -> Result<Option<Department>> {
    let department = sqlx::query_as::<_, Department>(
        "UPDATE departments SET is_active = $2, updated_at = NOW() WHERE id = $1 \
         RETURNING id, name, parent_id, is_active, created_at, updated_at",
    )
    .bind(id)
    .bind(is_active)
    .fetch_optional(pool)
    .await?;
    Ok(department)
}

pub async fn add_department_hod(pool: &PgPool, department_id: Uuid, user_id: Uuid) -> Result<()> {
    sqlx::query(
        "INSERT INTO department_hods (department_id, user_id) VALUES ($1, $2) \
         ON CONFLICT DO NOTHING",
    )
    .bind(department_id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn remove_department_hod(
    pool: &PgPool,
    department_id: Uuid,
    user_id: Uuid,
) -> Result<bool> {
    let result =
        sqlx::query("DELETE FROM department_hods WHERE department_id = $1 AND user_id = $2")
            .bind(department_id)
            .bind(user_id)
            .execute(pool)
            .await?;
    Ok(result.rows_affected() > 0)
}

// ---------------------------------------------------------------------------
// Questions
// ---------------------------------------------------------------------------

pub struct QuestionInput {
    pub text: String,
    pub category: QuestionCategory,
    pub assessment: AssessmentType,
    pub input: InputType,
    pub choices: Option<serde_json::Value>,
    pub department_id: Option<Uuid>,
}

pub async fn list_questions(pool: &PgPool) -> Result<Vec<Question>> {
    let questions = sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions ORDER BY created_at"
    ))
    .fetch_all(pool)
    .await?;
    Ok(questions)
}

/// Active questions applicable to one assessment in one department: the
/// global bank plus the department's own questions.
pub async fn active_questions_for(
    pool: &PgPool,
    assessment: AssessmentType,
    department_id: Option<Uuid>,
) -> Result<Vec<Question>> {
    let questions = sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions \
         WHERE is_active = true AND assessment = $1 \
           AND (department_id IS NULL OR department_id = $2) \
         ORDER BY created_at"
    ))
    .bind(assessment)
    .bind(department_id)
    .fetch_all(pool)
    .await?;
    Ok(questions)
}

pub async fn insert_question(pool: &PgPool, input: &QuestionInput) -> Result<Question> {
    let question = sqlx::query_as::<_, Question>(&format!(
        "INSERT INTO questions (id, text, category, assessment, input, choices, department_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING {QUESTION_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&input.text)
    .bind(input.category)
    .bind(input.assessment)
    .bind(input.input)
    .bind(&input.choices)
    .bind(input.department_id)
    .fetch_one(pool)
    .await?;
    Ok(question)
}

pub async fn update_question(
    pool: &PgPool,
    id: Uuid,
    input: &QuestionInput,
) -> Result<Option<Question>> {
    let question = sqlx::query_as::<_, Question>(&format!(
        "UPDATE questions \
         SET text = $2, category = $3, assessment = $4, input = $5, choices = $6, \
             department_id = $7, updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {QUESTION_COLUMNS}"
    ))
    .bind(id)
    .bind(&input.text)
    .bind(input.category)
    .bind(input.assessment)
    .bind(input.input)
    .bind(&input.choices)
    .bind(input.department_id)
    .fetch_optional(pool)
    .await?;
    Ok(question)
}

pub async fn set_question_active(
    pool: &PgPool,
    id: Uuid,
    is_active: bool,
) -> Result<Option<Question>> {
    let question = sqlx::query_as::<_, Question>(&format!(
        "UPDATE questions SET is_active = $2, updated_at = NOW() WHERE id = $1 \
         RETURNING {QUESTION_COLUMNS}"
    ))
    .bind(id)
    .bind(is_active)
    .fetch_optional(pool)
    .await?;
    Ok(question)
}

// ---------------------------------------------------------------------------
// Reviews
// ---------------------------------------------------------------------------

pub struct NewReview {
    pub employee_id: Uuid,
    pub reviewer_id: Uuid,
    pub department_id: Uuid,
    pub period: String,
    pub answers: serde_json::Value,
    pub overall_score: Option<f64>,
    pub comment: Option<String>,
}

#[derive(Default)]
pub struct ReviewFilter {
    pub period: Option<String>,
    pub employee_id: Option<Uuid>,
    pub reviewer_id: Option<Uuid>,
    pub department_ids: Option<Vec<Uuid>>,
}

/// The unique index on (employee_id, reviewer_id, period) rejects duplicate
/// submissions; callers map that to a conflict response.
pub async fn insert_review(pool: &PgPool, new_review: &NewReview) -> Result<Review> {
    let review = sqlx::query_as::<_, Review>(&format!(
        "INSERT INTO reviews \
             (id, employee_id, reviewer_id, department_id, period, answers, overall_score, comment) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING {REVIEW_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(new_review.employee_id)
    .bind(new_review.reviewer_id)
    .bind(new_review.department_id)
    .bind(&new_review.period)
    .bind(&new_review.answers)
    .bind(new_review.overall_score)
    .bind(&new_review.comment)
    .fetch_one(pool)
    .await?;
    Ok(review)
}

pub async fn list_reviews(pool: &PgPool, filter: &ReviewFilter) -> Result<Vec<Review>> {
    let reviews = sqlx::query_as::<_, Review>(&format!(
        "SELECT {REVIEW_COLUMNS} FROM reviews \
         WHERE ($1::text IS NULL OR period = $1) \
           AND ($2::uuid IS NULL OR employee_id = $2) \
           AND ($3::uuid IS NULL OR reviewer_id = $3) \
           AND ($4::uuid[] IS NULL OR department_id = ANY($4)) \
         ORDER BY created_at DESC"
    ))
    .bind(&filter.period)
    .bind(filter.employee_id)
    .bind(filter.reviewer_id)
    .bind(&filter.department_ids)
    .fetch_all(pool)
    .await?;
    Ok(reviews)
}

#[derive(Debug, sqlx::FromRow)]
pub struct PeriodAverageRow {
    pub period: String,
    pub average_score: f64,
    pub review_count: i64,
}

/// Per-period average effective score across managerial reviews.
/// Self-assessments are excluded; the score expression mirrors
/// `analytics::scoring::effective_score` (overall when > 0, else legacy
/// score, else 0). Each employee's reviews are averaged first and the
/// period average is taken over those, so employees with more reviews do
/// not dominate department-scoped series.
pub async fn period_averages(
    pool: &PgPool,
    periods: &[String],
    employee_id: Option<Uuid>,
    department_ids: Option<&[Uuid]>,
) -> Result<Vec<PeriodAverageRow>> {
    let rows = sqlx::query_as::<_, PeriodAverageRow>(
        "SELECT period, \
                AVG(employee_average) AS average_score, \
                SUM(employee_reviews)::bigint AS review_count \
         FROM ( \
             SELECT period, employee_id, \
                    AVG(CASE WHEN overall_score > 0 THEN overall_score \
                             ELSE COALESCE(score, 0) END) AS employee_average, \
                    COUNT(*) AS employee_reviews \
             FROM reviews \
             WHERE period = ANY($1) \
               AND employee_id <> reviewer_id \
               AND ($2::uuid IS NULL OR employee_id = $2) \
               AND ($3::uuid[] IS NULL OR department_id = ANY($3)) \
             GROUP BY period, employee_id \
         ) per_employee \
         GROUP BY period",
    )
    .bind(periods)
    .bind(employee_id)
    .bind(department_ids.map(|ids| ids.to_vec()))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::error::ApiError;
    use serde_json::json;

    // These run against a live Postgres named by DATABASE_URL:
    //   DATABASE_URL=postgres://... cargo test -- --ignored
    async fn test_pool() -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL missing");
        let pool = PgPool::connect(&url).await.expect("connect failed");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("migrations failed");
        pool
    }

    async fn make_user(pool: &PgPool, role: UserRole, department_id: Option<Uuid>) -> User {
        insert_user(
            pool,
            &NewUser {
                employee_id: format!("T{}", Uuid::new_v4().simple()),
                name: "Test User".to_string(),
                hash: "not-a-real-hash".to_string(),
                role,
                department_id,
                hod_level: None,
            },
        )
        .await
        .expect("insert_user failed")
    }

    fn review_of(employee: &User, reviewer: &User, department_id: Uuid, score: f64) -> NewReview {
        NewReview {
            employee_id: employee.id,
            reviewer_id: reviewer.id,
            department_id,
            period: "Q1 2031".to_string(),
            answers: json!([]),
            overall_score: Some(score),
            comment: None,
        }
    }

    #[tokio::test]
    #[ignore = "requires a running Postgres via DATABASE_URL"]
    async fn period_average_weighs_employees_equally() {
        let pool = test_pool().await;
        let dept = insert_department(&pool, &format!("dept-{}", Uuid::new_v4()), None)
            .await
            .unwrap();

        let prolific = make_user(&pool, UserRole::Employee, Some(dept.id)).await;
        let quiet = make_user(&pool, UserRole::Employee, Some(dept.id)).await;
        let mut reviewers = Vec::new();
        for _ in 0..4 {
            reviewers.push(make_user(&pool, UserRole::Hod, Some(dept.id)).await);
        }

        // One employee with four 5.0 reviews, another with a single 1.0.
        for reviewer in &reviewers {
            insert_review(&pool, &review_of(&prolific, reviewer, dept.id, 5.0))
                .await
                .unwrap();
        }
        insert_review(&pool, &review_of(&quiet, &reviewers[0], dept.id, 1.0))
            .await
            .unwrap();

        let periods = vec!["Q1 2031".to_string()];
        let rows = period_averages(&pool, &periods, None, Some(&[dept.id]))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].period, "Q1 2031");
        assert_eq!(rows[0].review_count, 5);
        // Per-employee first: (5.0 + 1.0) / 2, not the flat 4.2.
        assert!((rows[0].average_score - 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    #[ignore = "requires a running Postgres via DATABASE_URL"]
    async fn period_average_falls_back_to_legacy_score() {
        let pool = test_pool().await;
        let dept = insert_department(&pool, &format!("dept-{}", Uuid::new_v4()), None)
            .await
            .unwrap();
        let employee = make_user(&pool, UserRole::Employee, Some(dept.id)).await;
        let reviewer = make_user(&pool, UserRole::Hod, Some(dept.id)).await;

        // Non-positive overall must yield to the legacy score column.
        let review = insert_review(&pool, &review_of(&employee, &reviewer, dept.id, -2.0))
            .await
            .unwrap();
        sqlx::query("UPDATE reviews SET score = 4.0 WHERE id = $1")
            .bind(review.id)
            .execute(&pool)
            .await
            .unwrap();

        let periods = vec!["Q1 2031".to_string()];
        let rows = period_averages(&pool, &periods, Some(employee.id), None)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert!((rows[0].average_score - 4.0).abs() < 1e-9);
    }

    #[tokio::test]
    #[ignore = "requires a running Postgres via DATABASE_URL"]
    async fn duplicate_review_is_rejected_as_conflict() {
        let pool = test_pool().await;
        let dept = insert_department(&pool, &format!("dept-{}", Uuid::new_v4()), None)
            .await
            .unwrap();
        let employee = make_user(&pool, UserRole::Employee, Some(dept.id)).await;
        let reviewer = make_user(&pool, UserRole::Hod, Some(dept.id)).await;

        let new_review = review_of(&employee, &reviewer, dept.id, 4.5);
        insert_review(&pool, &new_review).await.unwrap();
        let err = insert_review(&pool, &new_review).await.unwrap_err();

        let api_err = ApiError::db(err, "already reviewed for this period");
        assert!(matches!(api_err, ApiError::Conflict(_)));
    }
}
