use crate::analytics::scoring;
use crate::db::{self, NewReview, ReviewFilter};
use crate::domain::models::{AssessmentType, Question, Review, ReviewAnswer};
use crate::domain::period::PeriodKey;
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::hod::validate_answers;
use crate::web::parse_period_or_current;
use crate::web::session::AuthUser;
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/questions", get(self_assessment_questions))
        .route("/self-assessment", post(submit_self_assessment))
        .route("/reviews", get(received_reviews))
        .route("/summary", get(summary))
        .with_state(state)
}

async fn self_assessment_questions(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Vec<Question>>, ApiError> {
    let questions = db::active_questions_for(
        &state.pool,
        AssessmentType::SelfAssessment,
        user.department_id,
    )
    .await?;
    Ok(Json(questions))
}

#[derive(Debug, Deserialize)]
pub struct SelfAssessmentPayload {
    pub period: Option<String>,
    pub answers: Vec<ReviewAnswer>,
    pub comment: Option<String>,
}

async fn submit_self_assessment(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Json(payload): Json<SelfAssessmentPayload>,
) -> Result<Json<Review>, ApiError> {
    let department_id = user
        .department_id
        .ok_or_else(|| ApiError::validation("you are not assigned to a department"))?;

    let period = parse_period_or_current(&state, payload.period.as_deref())?;
    validate_answers(
        &state,
        AssessmentType::SelfAssessment,
        department_id,
        &payload.answers,
    )
    .await?;

    let overall_score = scoring::overall_from_answers(&payload.answers);
    let review = db::insert_review(
        &state.pool,
        &NewReview {
            employee_id: user.id,
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
    .map_err(|e| {
        ApiError::db(e, "you have already submitted a self-assessment for this period")
    })?;

    tracing::info!(
        "Employee {} submitted a self-assessment for {}",
        user.employee_id,
        review.period
    );
    Ok(Json(review))
}

/// A review as shown to its subject: the reviewer identity is withheld for
/// managerial reviews.
#[derive(Serialize)]
pub struct ReceivedReview {
    pub id: Uuid,
    pub period: String,
    pub is_self_assessment: bool,
    pub answers: serde_json::Value,
    pub overall_score: Option<f64>,
    pub score: Option<f64>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Review> for ReceivedReview {
    fn from(review: Review) -> Self {
        let is_self_assessment = review.is_self_assessment();
        ReceivedReview {
            id: review.id,
            period: review.period,
            is_self_assessment,
            answers: review.answers,
            overall_score: review.overall_score,
            score: review.score,
            comment: review.comment,
            created_at: review.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReceivedQuery {
    pub period: Option<String>,
}

async fn received_reviews(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Query(query): Query<ReceivedQuery>,
) -> Result<Json<Vec<ReceivedReview>>, ApiError> {
    let period = match query.period.as_deref() {
        Some(raw) => Some(
            raw.parse::<PeriodKey>()
                .map_err(|_| ApiError::validation("invalid period key"))?
                .to_string(),
        ),
        None => None,
    };

    let reviews = db::list_reviews(
        &state.pool,
        &ReviewFilter {
            period,
            employee_id: Some(user.id),
            ..Default::default()
        },
    )
    .await?;
    Ok(Json(reviews.into_iter().map(ReceivedReview::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub periods: Option<usize>,
}

#[derive(Serialize)]
pub struct PeriodSummary {
    pub period: String,
    pub average_score: Option<f64>,
    pub review_count: i64,
}

#[derive(Serialize)]
pub struct EmployeeSummary {
    pub success: bool,
    pub periods: Vec<PeriodSummary>,
}

async fn summary(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<EmployeeSummary>, ApiError> {
    let window = query.periods.unwrap_or(6).clamp(1, 24);
    let current = PeriodKey::current(state.period_mode, Utc::now());
    let keys: Vec<String> = current.last_n(window).iter().map(|k| k.to_string()).collect();

    let rows = db::period_averages(&state.pool, &keys, Some(user.id), None).await?;

    let periods = keys
        .iter()
        .map(|key| {
            let row = rows.iter().find(|r| &r.period == key);
            PeriodSummary {
                period: key.clone(),
                average_score: row.map(|r| r.average_score),
                review_count: row.map(|r| r.review_count).unwrap_or(0),
            }
        })
        .collect();

    Ok(Json(EmployeeSummary {
        success: true,
        periods,
    }))
}
