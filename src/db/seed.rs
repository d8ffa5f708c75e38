use crate::db::{self, NewUser, QuestionInput};
use crate::domain::models::{AssessmentType, InputType, QuestionCategory, UserRole};
use anyhow::Result;
use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2,
};
use sqlx::PgPool;

pub async fn seed_all(pool: &PgPool) -> Result<()> {
    seed_admin(pool).await?;
    seed_questions(pool).await?;
    Ok(())
}

/// Create the bootstrap admin from ADMIN_EMPLOYEE_ID / ADMIN_PASSWORD.
/// Idempotent: skipped when the employee id is already taken.
async fn seed_admin(pool: &PgPool) -> Result<()> {
    let employee_id =
        std::env::var("ADMIN_EMPLOYEE_ID").unwrap_or_else(|_| "admin".to_string());
    let password = std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string());

    if db::find_user_by_employee_id_any(pool, &employee_id)
        .await?
        .is_some()
    {
        return Ok(());
    }

    let salt = SaltString::generate(rand_core::OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash admin password: {}", e))?
        .to_string();

    db::insert_user(
        pool,
        &NewUser {
            employee_id: employee_id.clone(),
            name: "Administrator".to_string(),
            hash,
            role: UserRole::Admin,
            department_id: None,
            hod_level: None,
        },
    )
    .await?;

    tracing::info!("Seeded default admin account '{}'", employee_id);
    Ok(())
}

async fn seed_questions(pool: &PgPool) -> Result<()> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions")
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        return Ok(());
    }

    let bank: Vec<(&str, QuestionCategory, AssessmentType)> = vec![
        (
            "Quality of delivered work this period",
            QuestionCategory::Technical,
            AssessmentType::Review,
        ),
        (
            "Meets deadlines and commitments",
            QuestionCategory::Delivery,
            AssessmentType::Review,
        ),
        (
            "Communicates clearly with the team",
            QuestionCategory::Communication,
            AssessmentType::Review,
        ),
        (
            "Takes ownership and initiative",
            QuestionCategory::Leadership,
            AssessmentType::Review,
        ),
        (
            "Overall contribution this period",
            QuestionCategory::General,
            AssessmentType::Review,
        ),
        (
            "How would you rate your own output this period?",
            QuestionCategory::General,
            AssessmentType::SelfAssessment,
        ),
        (
            "How effective was your collaboration with colleagues?",
            QuestionCategory::Communication,
            AssessmentType::SelfAssessment,
        ),
        (
            "How well did you manage your priorities?",
            QuestionCategory::Delivery,
            AssessmentType::SelfAssessment,
        ),
    ];

    for (text, category, assessment) in bank {
        db::insert_question(
            pool,
            &QuestionInput {
                text: text.to_string(),
                category,
                assessment,
                input: InputType::Rating,
                choices: None,
                department_id: None,
            },
        )
        .await?;
    }

    tracing::info!("Seeded starter question bank");
    Ok(())
}
