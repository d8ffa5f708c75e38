use crate::analytics::scoring;
use crate::db::{self, NewReview, ReviewFilter};
use crate::domain::models::{
    AssessmentType, DepartmentNode, Question, Review, ReviewAnswer, User, UserRole,
};
use crate::domain::scope;
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::parse_period_or_current;
use crate::web::session::AuthUser;
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/departments", get(my_departments))
        .route("/employees", get(my_employees))
        .route("/questions", get(review_questions))
        .route("/reviews", get(my_reviews).post(submit_review))
        .route("/dashboard", get(dashboard))
        .with_state(state)
}

fn require_hod(user: &User) -> Result<(), ApiError> {
    if user.role != UserRole::Hod {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

/// Departments this HOD may act on, resolved from explicit membership.
async fn resolve_scope(state: &SharedState, hod_id: Uuid) -> Result<Vec<DepartmentNode>, ApiError> {
    let nodes = db::load_department_nodes(&state.pool).await?;
    let scope_ids: HashSet<Uuid> = scope::resolve_hod_scope(&nodes, hod_id).into_iter().collect();
    Ok(nodes.into_iter().filter(|d| scope_ids.contains(&d.id)).collect())
}

async fn my_departments(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Vec<DepartmentNode>>, ApiError> {
    require_hod(&user)?;
    Ok(Json(resolve_scope(&state, user.id).await?))
}

async fn my_employees(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Vec<User>>, ApiError> {
    require_hod(&user)?;

    let scope_ids: Vec<Uuid> = resolve_scope(&state, user.id)
        .await?
        .into_iter()
        .map(|d| d.id)
        .collect();
    if scope_ids.is_empty() {
        return Ok(Json(Vec::new()));
    }
    Ok(Json(db::list_active_employees(&state.pool, &scope_ids).await?))
}

#[derive(Debug, Deserialize)]
pub struct QuestionsQuery {
    pub department_id: Uuid,
}

async fn review_questions(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Query(query): Query<QuestionsQuery>,
) -> Result<Json<Vec<Question>>, ApiError> {
    require_hod(&user)?;

    let scope_ids: HashSet<Uuid> = resolve_scope(&state, user.id)
        .await?
        .into_iter()
        .map(|d| d.id)
        .collect();
    if !scope_ids.contains(&query.department_id) {
        return Err(ApiError::Forbidden);
    }

    let questions =
        db::active_questions_for(&state.pool, AssessmentType::Review, Some(query.department_id))
            .await?;
    Ok(Json(questions))
}

#[derive(Debug, Deserialize)]
pub struct SubmitReviewPayload {
    pub employee_id: Uuid,
    pub period: Option<String>,
    pub answers: Vec<ReviewAnswer>,
    pub comment: Option<String>,
}

/// Validate an answer set against the active question bank for one
/// department and assessment type. Shared with the self-assessment route.
pub async fn validate_answers(
    state: &SharedState,
    assessment: AssessmentType,
    department_id: Uuid,
    answers: &[ReviewAnswer],
) -> Result<(), ApiError> {
    if answers.is_empty() {
        return Err(ApiError::validation("at least one answer is required"));
    }

    let questions =
        db::active_questions_for(&state.pool, assessment, Some(department_id)).await?;
    let known: HashSet<Uuid> = questions.iter().map(|q| q.id).collect();

    let mut seen: HashSet<Uuid> = HashSet::new();
    for answer in answers {
        if !known.contains(&answer.question_id) {
            return Err(ApiError::validation("answer refers to an unknown question"));
        }
        if !seen.insert(answer.question_id) {
            return Err(ApiError::validation("duplicate answer for a question"));
        }
        if let Some(rating) = answer.rating {
            if !(1..=5).contains(&rating) {
                return Err(ApiError::validation("rating must be between 1 and 5"));
            }
        }
        if answer.rating.is_none() && answer.choice.is_none() && answer.text.is_none() {
            return Err(ApiError::validation("empty answer"));
        }
    }
    Ok(())
}

async fn submit_review(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Json(payload): Json<SubmitReviewPayload>,
) -> Result<Json<Review>, ApiError> {
    require_hod(&user)?;

    if payload.employee_id == user.id {
        return Err(ApiError::validation(
            "use the self-assessment endpoint to rate yourself",
        ));
    }

    let employee = db::find_user_by_id(&state.pool, payload.employee_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| ApiError::validation("employee does not exist"))?;
    let department_id = employee
        .department_id
        .ok_or_else(|| ApiError::validation("employee has no department"))?;

    let scope_ids: HashSet<Uuid> = resolve_scope(&state, user.id)
        .await?
        .into_iter()
        .map(|d| d.id)
        .collect();
    if !scope_ids.contains(&department_id) {
        return Err(ApiError::Forbidden);
    }

    let period = parse_period_or_current(&state, payload.period.as_deref())?;
    validate_answers(&state, AssessmentType::Review, department_id, &payload.answers).await?;

    let overall_score = scoring::overall_from_answers(&payload.answers);
    let review = db::insert_review(
        &state.pool,
        &NewReview {
            employee_id: employee.id,
            reviewer_id: user.id,
            department_id,
            period: period.to_string(),
            answers: serde_json::to_value(&payload.answers)
                .map_err(|e| ApiError::Internal(e.into()))?,
            overall_score,
            comment: payload.comment,
        },
    )
    .await
    .map_err(|e| ApiError::db(e, "you have already reviewed this employee for this period"))?;

    tracing::info!(
        "HOD {} reviewed employee {} for {}",
        user.employee_id,
        employee.employee_id,
        review.period
    );
    Ok(Json(review))
}

#[derive(Debug, Deserialize)]
pub struct ReviewListQuery {
    pub period: Option<String>,
}

async fn my_reviews(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Query(query): Query<ReviewListQuery>,
) -> Result<Json<Vec<Review>>, ApiError> {
    require_hod(&user)?;

    let period = match query.period.as_deref() {
        Some(raw) => Some(
            raw.parse::<crate::domain::period::PeriodKey>()
                .map_err(|_| ApiError::validation("invalid period key"))?
                .to_string(),
        ),
        None => None,
    };

    let reviews = db::list_reviews(
        &state.pool,
        &ReviewFilter {
            period,
            reviewer_id: Some(user.id),
            ..Default::default()
        },
    )
    .await?;
    Ok(Json(reviews))
}

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub period: Option<String>,
}

#[derive(Serialize)]
pub struct EmployeeAverage {
    pub employee_id: Uuid,
    pub name: String,
    pub average_score: f64,
    pub review_count: usize,
}

#[derive(Serialize)]
pub struct HodDashboard {
    pub success: bool,
    pub period: String,
    pub department_average: Option<f64>,
    pub employees: Vec<EmployeeAverage>,
}

async fn dashboard(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<HodDashboard>, ApiError> {
    require_hod(&user)?;

    let period = parse_period_or_current(&state, query.period.as_deref())?;
    let scope_ids: Vec<Uuid> = resolve_scope(&state, user.id)
        .await?
        .into_iter()
        .map(|d| d.id)
        .collect();
    if scope_ids.is_empty() {
        return Ok(Json(HodDashboard {
            success: true,
            period: period.to_string(),
            department_average: None,
            employees: Vec::new(),
        }));
    }

    let reviews = db::list_reviews(
        &state.pool,
        &ReviewFilter {
            period: Some(period.to_string()),
            department_ids: Some(scope_ids.clone()),
            ..Default::default()
        },
    )
    .await?;

    let employees = db::list_active_employees(&state.pool, &scope_ids).await?;
    let names: HashMap<Uuid, String> =
        employees.into_iter().map(|u| (u.id, u.name)).collect();

    let averages = scoring::per_employee_averages(&reviews);
    let counts: HashMap<Uuid, usize> = reviews
        .iter()
        .filter(|r| !r.is_self_assessment())
        .fold(HashMap::new(), |mut acc, r| {
            *acc.entry(r.employee_id).or_insert(0) += 1;
            acc
        });

    let mut entries: Vec<EmployeeAverage> = averages
        .into_iter()
        .map(|(employee_id, average_score)| EmployeeAverage {
            employee_id,
            name: names
                .get(&employee_id)
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string()),
            average_score,
            review_count: counts.get(&employee_id).copied().unwrap_or(0),
        })
        .collect();
    entries.sort_by(|a, b| {
        b.average_score
            .partial_cmp(&a.average_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });

    Ok(Json(HodDashboard {
        success: true,
        period: period.to_string(),
        department_average: scoring::average_of_averages(&reviews),
        employees: entries,
    }))
}
