use crate::analytics::ranking::{self, DepartmentRanking};
use crate::analytics::scoring;
use crate::db::{self, ReviewFilter};
use crate::domain::models::{Review, User, UserRole};
use crate::domain::period::PeriodKey;
use crate::domain::scope;
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::parse_period_or_current;
use crate::web::session::AuthUser;
use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/trends", get(trends))
        .route("/rankings", get(rankings))
        .route("/export/reviews.csv", get(export_reviews))
        .with_state(state)
}

async fn hod_scope_ids(state: &SharedState, hod_id: Uuid) -> Result<Vec<Uuid>, ApiError> {
    let nodes = db::load_department_nodes(&state.pool).await?;
    Ok(scope::resolve_hod_scope(&nodes, hod_id))
}

// ---------------------------------------------------------------------------
// Trends
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct TrendsQuery {
    pub periods: Option<usize>,
    pub department_id: Option<Uuid>,
    pub employee_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct TrendPoint {
    pub period: String,
    pub average_score: Option<f64>,
    pub review_count: i64,
}

#[derive(Serialize)]
pub struct TrendSeries {
    pub success: bool,
    pub points: Vec<TrendPoint>,
}

/// Per-period average effective score, scoped by role: employees see only
/// themselves, HODs their resolved departments, admins anything.
async fn trends(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Query(query): Query<TrendsQuery>,
) -> Result<Json<TrendSeries>, ApiError> {
    let window = query.periods.unwrap_or(6).clamp(1, 24);
    let current = PeriodKey::current(state.period_mode, Utc::now());
    let keys: Vec<String> = current.last_n(window).iter().map(|k| k.to_string()).collect();

    let (employee_id, department_ids) = match user.role {
        UserRole::Admin => (query.employee_id, query.department_id.map(|d| vec![d])),
        UserRole::Hod => {
            let scope_ids = hod_scope_ids(&state, user.id).await?;
            let departments = match query.department_id {
                Some(dept) => {
                    if !scope_ids.contains(&dept) {
                        return Err(ApiError::Forbidden);
                    }
                    vec![dept]
                }
                None => scope_ids.clone(),
            };
            if let Some(employee_id) = query.employee_id {
                let employee = db::find_user_by_id(&state.pool, employee_id)
                    .await?
                    .ok_or(ApiError::NotFound)?;
                match employee.department_id {
                    Some(dept) if scope_ids.contains(&dept) => {}
                    _ => return Err(ApiError::Forbidden),
                }
            }
            (query.employee_id, Some(departments))
        }
        UserRole::Employee => {
            if query.employee_id.is_some_and(|id| id != user.id)
                || query.department_id.is_some()
            {
                return Err(ApiError::Forbidden);
            }
            (Some(user.id), None)
        }
    };

    let rows =
        db::period_averages(&state.pool, &keys, employee_id, department_ids.as_deref()).await?;

    let points = keys
        .iter()
        .map(|key| {
            let row = rows.iter().find(|r| &r.period == key);
            TrendPoint {
                period: key.clone(),
                average_score: row.map(|r| r.average_score),
                review_count: row.map(|r| r.review_count).unwrap_or(0),
            }
        })
        .collect();

    Ok(Json(TrendSeries {
        success: true,
        points,
    }))
}

// ---------------------------------------------------------------------------
// Rankings
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RankingsQuery {
    pub period: Option<String>,
}

#[derive(Serialize)]
pub struct RankingsResponse {
    pub success: bool,
    pub period: String,
    pub rankings: Vec<DepartmentRanking>,
}

async fn rankings(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Query(query): Query<RankingsQuery>,
) -> Result<Json<RankingsResponse>, ApiError> {
    if user.role != UserRole::Admin {
        return Err(ApiError::Forbidden);
    }

    let period = parse_period_or_current(&state, query.period.as_deref())?;
    let reviews = db::list_reviews(
        &state.pool,
        &ReviewFilter {
            period: Some(period.to_string()),
            ..Default::default()
        },
    )
    .await?;

    let names: HashMap<Uuid, String> = db::list_departments(&state.pool)
        .await?
        .into_iter()
        .map(|d| (d.id, d.name))
        .collect();

    let mut by_department: HashMap<Uuid, Vec<Review>> = HashMap::new();
    for review in reviews {
        by_department.entry(review.department_id).or_default().push(review);
    }

    Ok(Json(RankingsResponse {
        success: true,
        period: period.to_string(),
        rankings: ranking::rank_departments(&names, &by_department),
    }))
}

// ---------------------------------------------------------------------------
// CSV export
// ---------------------------------------------------------------------------

pub const EXPORT_HEADER: &str = "employee_id,employee_name,reviewer_id,reviewer_name,department,\
period,overall_score,score,effective_score,comment,created_at";

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub period: Option<String>,
    pub department_id: Option<Uuid>,
}

fn csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn format_optional_score(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_default()
}

fn review_row(
    review: &Review,
    users: &HashMap<Uuid, User>,
    departments: &HashMap<Uuid, String>,
) -> String {
    let lookup = |id: Uuid| -> (String, String) {
        users
            .get(&id)
            .map(|u| (u.employee_id.clone(), u.name.clone()))
            .unwrap_or_else(|| (id.to_string(), "Unknown".to_string()))
    };
    let (employee_id, employee_name) = lookup(review.employee_id);
    let (reviewer_id, reviewer_name) = lookup(review.reviewer_id);
    let department = departments
        .get(&review.department_id)
        .cloned()
        .unwrap_or_else(|| "Unknown".to_string());

    [
        employee_id,
        employee_name,
        reviewer_id,
        reviewer_name,
        department,
        review.period.clone(),
        format_optional_score(review.overall_score),
        format_optional_score(review.score),
        format!("{:.2}", scoring::review_score(review)),
        review.comment.clone().unwrap_or_default(),
        review.created_at.to_rfc3339(),
    ]
    .iter()
    .map(|field| csv_field(field))
    .collect::<Vec<_>>()
    .join(",")
}

pub fn render_export(
    reviews: &[Review],
    users: &HashMap<Uuid, User>,
    departments: &HashMap<Uuid, String>,
) -> String {
    let mut out = String::from(EXPORT_HEADER);
    out.push('\n');
    for review in reviews {
        out.push_str(&review_row(review, users, departments));
        out.push('\n');
    }
    out
}

async fn export_reviews(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let period = parse_period_or_current(&state, query.period.as_deref())?;

    let department_ids = match user.role {
        UserRole::Admin => query.department_id.map(|d| vec![d]),
        UserRole::Hod => {
            let scope_ids = hod_scope_ids(&state, user.id).await?;
            match query.department_id {
                Some(dept) => {
                    if !scope_ids.contains(&dept) {
                        return Err(ApiError::Forbidden);
                    }
                    Some(vec![dept])
                }
                None => Some(scope_ids),
            }
        }
        UserRole::Employee => return Err(ApiError::Forbidden),
    };

    // An HOD with an empty scope exports an empty file, not everything.
    if matches!(&department_ids, Some(ids) if ids.is_empty()) {
        let body = format!("{}\n", EXPORT_HEADER);
        return Ok(csv_response(&period, body));
    }

    let reviews = db::list_reviews(
        &state.pool,
        &ReviewFilter {
            period: Some(period.to_string()),
            department_ids,
            ..Default::default()
        },
    )
    .await?;

    let users: HashMap<Uuid, User> = db::list_users(&state.pool)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();
    let departments: HashMap<Uuid, String> = db::list_departments(&state.pool)
        .await?
        .into_iter()
        .map(|d| (d.id, d.name))
        .collect();

    let body = render_export(&reviews, &users, &departments);
    Ok(csv_response(&period, body))
}

fn csv_response(period: &PeriodKey, body: String) -> impl IntoResponse {
    let filename = format!("reviews-{}.csv", period.to_string().replace(' ', "-"));
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::UserRole;
    use chrono::TimeZone;

    fn user(name: &str, employee_id: &str) -> User {
        User {
            id: Uuid::new_v4(),
            employee_id: employee_id.to_string(),
            name: name.to_string(),
            hash: String::new(),
            role: UserRole::Employee,
            department_id: None,
            hod_level: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn review(employee: &User, reviewer: &User, department_id: Uuid, comment: &str) -> Review {
        let created = Utc.with_ymd_and_hms(2025, 2, 1, 9, 0, 0).unwrap();
        Review {
            id: Uuid::new_v4(),
            employee_id: employee.id,
            reviewer_id: reviewer.id,
            department_id,
            period: "Q1 2025".to_string(),
            answers: serde_json::json!([]),
            overall_score: Some(4.5),
            score: None,
            comment: Some(comment.to_string()),
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn quotes_are_escaped_by_doubling() {
        assert_eq!(csv_field("plain"), "\"plain\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field(""), "\"\"");
    }

    #[test]
    fn one_row_per_review_plus_header() {
        let dept = Uuid::new_v4();
        let alice = user("Alice", "E001");
        let hod = user("Helen", "H001");

        let reviews = vec![
            review(&alice, &hod, dept, "steady"),
            review(&alice, &hod, dept, "has \"quoted\" remark"),
        ];
        let users: HashMap<Uuid, User> = [(alice.id, alice.clone()), (hod.id, hod.clone())].into();
        let departments: HashMap<Uuid, String> = [(dept, "Engineering".to_string())].into();

        let csv = render_export(&reviews, &users, &departments);
        let lines: Vec<&str> = csv.trim_end().lines().collect();
        assert_eq!(lines.len(), reviews.len() + 1);
        assert_eq!(lines[0], EXPORT_HEADER);
        assert!(lines[1].starts_with("\"E001\",\"Alice\",\"H001\",\"Helen\",\"Engineering\""));
        assert!(lines[2].contains("\"has \"\"quoted\"\" remark\""));
    }

    #[test]
    fn row_values_match_source_fields() {
        let dept = Uuid::new_v4();
        let alice = user("Alice", "E001");
        let hod = user("Helen", "H001");
        let r = review(&alice, &hod, dept, "steady");

        let users: HashMap<Uuid, User> = [(alice.id, alice), (hod.id, hod)].into();
        let departments: HashMap<Uuid, String> = [(dept, "Engineering".to_string())].into();

        let row = review_row(&r, &users, &departments);
        assert!(row.contains("\"Q1 2025\""));
        assert!(row.contains("\"4.50\""));
        assert!(row.contains(&format!("\"{}\"", r.created_at.to_rfc3339())));
    }
}
