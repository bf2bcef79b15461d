use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A learner account on the progress service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub student_id: String,
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
    pub total_score: u32,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

/// Input for creating an account. Every field is required and the first three
/// must be unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupInput {
    pub username: String,
    pub student_id: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

/// Reply to signup and login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub username: String,
    pub total_score: u32,
    pub labs_completed: u32,
}

/// The bearer token the console holds for a signed-in learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub token: String,
    pub username: String,
}

impl From<&AuthResponse> for Identity {
    fn from(auth: &AuthResponse) -> Self {
        Self {
            token: auth.token.clone(),
            username: auth.user.username.clone(),
        }
    }
}
