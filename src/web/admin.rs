use crate::analytics::ranking::{self, DepartmentRanking};
use crate::db::{self, NewUser, QuestionInput, ReviewFilter, UserUpdate};
use crate::domain::models::{
    AssessmentType, Department, HodLevel, InputType, Question, QuestionCategory, Review, User,
    UserRole,
};
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::parse_period_or_current;
use crate::web::session::AuthUser;
use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2,
};
use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", put(update_user))
        .route("/users/:id/deactivate", post(deactivate_user))
        .route("/users/:id/reactivate", post(reactivate_user))
        .route("/users/:id/reset-password", post(reset_password))
        .route("/departments", get(list_departments).post(create_department))
        .route("/departments/:id", put(update_department))
        .route("/departments/:id/deactivate", post(deactivate_department))
        .route("/departments/:id/hods", post(assign_hod))
        .route("/departments/:id/hods/:user_id", delete(unassign_hod))
        .route("/questions", get(list_questions).post(create_question))
        .route("/questions/:id", put(update_question))
        .route("/questions/:id/deactivate", post(deactivate_question))
        .route("/dashboard", get(dashboard))
        .with_state(state)
}

fn require_admin(user: &User) -> Result<(), ApiError> {
    if user.role != UserRole::Admin {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

fn is_valid_employee_id(employee_id: &str) -> bool {
    !employee_id.is_empty()
        && employee_id.len() <= 32
        && employee_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    if password.len() < 6 {
        return Err(ApiError::validation("password must be at least 6 characters"));
    }
    let salt = SaltString::generate(OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("failed to hash password: {}", e)))?
        .to_string())
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateUserPayload {
    pub employee_id: String,
    pub name: String,
    pub password: String,
    pub role: Option<UserRole>,
    pub department_id: Option<Uuid>,
    pub hod_level: Option<HodLevel>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserPayload {
    pub name: String,
    pub role: UserRole,
    pub department_id: Option<Uuid>,
    pub hod_level: Option<HodLevel>,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordPayload {
    pub password: String,
}

async fn list_users(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Vec<User>>, ApiError> {
    require_admin(&user)?;

    let mut users = db::list_users(&state.pool).await?;
    users.sort_by_key(|u| (!u.is_active, u.created_at));
    Ok(Json(users))
}

async fn create_user(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Json(payload): Json<CreateUserPayload>,
) -> Result<Json<User>, ApiError> {
    require_admin(&user)?;

    let employee_id = payload.employee_id.trim().to_string();
    if !is_valid_employee_id(&employee_id) {
        return Err(ApiError::validation("invalid employee id"));
    }
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::validation("name is required"));
    }

    let role = payload.role.unwrap_or(UserRole::Employee);
    if role != UserRole::Hod && payload.hod_level.is_some() {
        return Err(ApiError::validation("hod_level only applies to HOD users"));
    }
    if let Some(department_id) = payload.department_id {
        check_department_active(&state, department_id).await?;
    }

    let hash = hash_password(&payload.password)?;
    let created = db::insert_user(
        &state.pool,
        &NewUser {
            employee_id,
            name,
            hash,
            role,
            department_id: payload.department_id,
            hod_level: payload.hod_level,
        },
    )
    .await
    .map_err(|e| ApiError::db(e, "employee id already exists"))?;

    Ok(Json(created))
}

async fn update_user(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Path(target_id): Path<Uuid>,
    Json(payload): Json<UpdateUserPayload>,
) -> Result<Json<User>, ApiError> {
    require_admin(&user)?;

    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::validation("name is required"));
    }
    if payload.role != UserRole::Hod && payload.hod_level.is_some() {
        return Err(ApiError::validation("hod_level only applies to HOD users"));
    }
    if let Some(department_id) = payload.department_id {
        check_department_active(&state, department_id).await?;
    }

    let updated = db::update_user(
        &state.pool,
        target_id,
        &UserUpdate {
            name,
            role: payload.role,
            department_id: payload.department_id,
            hod_level: payload.hod_level,
        },
    )
    .await?
    .ok_or(ApiError::NotFound)?;

    Ok(Json(updated))
}

async fn deactivate_user(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Path(target_id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    require_admin(&user)?;

    if user.id == target_id {
        return Err(ApiError::validation("cannot deactivate your own account"));
    }

    let updated = db::set_user_active(&state.pool, target_id, false)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(updated))
}

async fn reactivate_user(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Path(target_id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    require_admin(&user)?;

    let updated = db::set_user_active(&state.pool, target_id, true)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(updated))
}

async fn reset_password(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Path(target_id): Path<Uuid>,
    Json(payload): Json<ResetPasswordPayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_admin(&user)?;

    let hash = hash_password(&payload.password)?;
    if !db::update_user_hash(&state.pool, target_id, &hash).await? {
        return Err(ApiError::NotFound);
    }
    Ok(Json(serde_json::json!({ "success": true })))
}

// ---------------------------------------------------------------------------
// Departments
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct DepartmentPayload {
    pub name: String,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct AssignHodPayload {
    pub user_id: Uuid,
}

async fn check_department_active(state: &SharedState, id: Uuid) -> Result<Department, ApiError> {
    let department = db::find_department(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::validation("department does not exist"))?;
    if !department.is_active {
        return Err(ApiError::validation("department is inactive"));
    }
    Ok(department)
}

async fn list_departments(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Vec<Department>>, ApiError> {
    require_admin(&user)?;
    Ok(Json(db::list_departments(&state.pool).await?))
}

async fn create_department(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Json(payload): Json<DepartmentPayload>,
) -> Result<Json<Department>, ApiError> {
    require_admin(&user)?;

    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::validation("department name is required"));
    }
    if let Some(parent_id) = payload.parent_id {
        check_department_active(&state, parent_id).await?;
    }

    let created = db::insert_department(&state.pool, &name, payload.parent_id)
        .await
        .map_err(|e| ApiError::db(e, "a department with this name already exists here"))?;
    Ok(Json(created))
}

async fn update_department(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DepartmentPayload>,
) -> Result<Json<Department>, ApiError> {
    require_admin(&user)?;

    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::validation("department name is required"));
    }
    if let Some(parent_id) = payload.parent_id {
        if parent_id == id {
            return Err(ApiError::validation("department cannot be its own parent"));
        }
        check_department_active(&state, parent_id).await?;
    }

    let updated = db::update_department(&state.pool, id, &name, payload.parent_id)
        .await
        .map_err(|e| ApiError::db(e, "a department with this name already exists here"))?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(updated))
}

async fn deactivate_department(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Department>, ApiError> {
    require_admin(&user)?;

    let updated = db::set_department_active(&state.pool, id, false)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(updated))
}

async fn assign_hod(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignHodPayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_admin(&user)?;

    check_department_active(&state, id).await?;
    let target = db::find_user_by_id(&state.pool, payload.user_id)
        .await?
        .ok_or_else(|| ApiError::validation("user does not exist"))?;
    if target.role != UserRole::Hod {
        return Err(ApiError::validation("user is not an HOD"));
    }
    if !target.is_active {
        return Err(ApiError::validation("user is inactive"));
    }

    db::add_department_hod(&state.pool, id, payload.user_id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

async fn unassign_hod(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_admin(&user)?;

    if !db::remove_department_hod(&state.pool, id, user_id).await? {
        return Err(ApiError::NotFound);
    }
    Ok(Json(serde_json::json!({ "success": true })))
}

// ---------------------------------------------------------------------------
// Questions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct QuestionPayload {
    pub text: String,
    pub category: Option<QuestionCategory>,
    pub assessment: AssessmentType,
    pub input: Option<InputType>,
    pub choices: Option<Vec<String>>,
    pub department_id: Option<Uuid>,
}

impl QuestionPayload {
    fn into_input(self) -> Result<QuestionInput, ApiError> {
        let text = self.text.trim().to_string();
        if text.is_empty() {
            return Err(ApiError::validation("question text is required"));
        }
        let input = self.input.unwrap_or(InputType::Rating);
        let choices = match (&input, self.choices) {
            (InputType::Choice, Some(choices)) if !choices.is_empty() => {
                Some(serde_json::json!(choices))
            }
            (InputType::Choice, _) => {
                return Err(ApiError::validation(
                    "choice questions need a non-empty choice list",
                ))
            }
            (_, _) => None,
        };
        Ok(QuestionInput {
            text,
            category: self.category.unwrap_or(QuestionCategory::General),
            assessment: self.assessment,
            input,
            choices,
            department_id: self.department_id,
        })
    }
}

async fn list_questions(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Vec<Question>>, ApiError> {
    require_admin(&user)?;
    Ok(Json(db::list_questions(&state.pool).await?))
}

async fn create_question(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Json(payload): Json<QuestionPayload>,
) -> Result<Json<Question>, ApiError> {
    require_admin(&user)?;

    if let Some(department_id) = payload.department_id {
        check_department_active(&state, department_id).await?;
    }
    let input = payload.into_input()?;
    Ok(Json(db::insert_question(&state.pool, &input).await?))
}

async fn update_question(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<QuestionPayload>,
) -> Result<Json<Question>, ApiError> {
    require_admin(&user)?;

    if let Some(department_id) = payload.department_id {
        check_department_active(&state, department_id).await?;
    }
    let input = payload.into_input()?;
    let updated = db::update_question(&state.pool, id, &input)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(updated))
}

async fn deactivate_question(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Question>, ApiError> {
    require_admin(&user)?;

    let updated = db::set_question_active(&state.pool, id, false)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(updated))
}

// ---------------------------------------------------------------------------
// Company dashboard
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub period: Option<String>,
}

#[derive(Serialize)]
pub struct CompanyDashboard {
    pub success: bool,
    pub period: String,
    pub rankings: Vec<DepartmentRanking>,
    pub total_reviews: usize,
}

async fn dashboard(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<CompanyDashboard>, ApiError> {
    require_admin(&user)?;

    let period = parse_period_or_current(&state, query.period.as_deref())?;

    let reviews = db::list_reviews(
        &state.pool,
        &ReviewFilter {
            period: Some(period.to_string()),
            ..Default::default()
        },
    )
    .await?;

    let departments = db::list_departments(&state.pool).await?;
    let names: HashMap<Uuid, String> =
        departments.into_iter().map(|d| (d.id, d.name)).collect();

    let total_reviews = reviews.len();
    let mut by_department: HashMap<Uuid, Vec<Review>> = HashMap::new();
    for review in reviews {
        by_department.entry(review.department_id).or_default().push(review);
    }

    let rankings = ranking::rank_departments(&names, &by_department);

    Ok(Json(CompanyDashboard {
        success: true,
        period: period.to_string(),
        rankings,
        total_reviews,
    }))
}
