use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Hod,
    Employee,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "hod_level", rename_all = "UPPERCASE")]
#[serde(rename_all = "lowercase")]
pub enum HodLevel {
    Higher,
    Lower,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "question_category", rename_all = "UPPERCASE")]
#[serde(rename_all = "lowercase")]
pub enum QuestionCategory {
    Technical,
    Communication,
    Leadership,
    Delivery,
    General,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "assessment_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "snake_case")]
pub enum AssessmentType {
    Review,
    SelfAssessment,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "input_type", rename_all = "UPPERCASE")]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Rating,
    Choice,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub employee_id: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub hash: String,
    pub role: UserRole,
    pub department_id: Option<Uuid>,
    pub hod_level: Option<HodLevel>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Department {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Department row joined with its explicit HOD membership, the shape
/// scope resolution works over.
#[derive(Debug, Clone, Serialize)]
pub struct DepartmentNode {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub hod_ids: Vec<Uuid>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Question {
    pub id: Uuid,
    pub text: String,
    pub category: QuestionCategory,
    pub assessment: AssessmentType,
    pub input: InputType,
    pub choices: Option<serde_json::Value>,
    pub department_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One answered question inside a review, stored in the JSONB `answers`
/// column. Exactly one of `rating`/`choice`/`text` is set depending on the
/// question's input type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewAnswer {
    pub question_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Review {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub reviewer_id: Uuid,
    pub department_id: Uuid,
    pub period: String,
    pub answers: serde_json::Value,
    pub overall_score: Option<f64>,
    pub score: Option<f64>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Review {
    pub fn is_self_assessment(&self) -> bool {
        self.employee_id == self.reviewer_id
    }
}
