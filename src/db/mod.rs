mod schema;

use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::labs::{self, Difficulty};
use crate::models::*;

pub struct Database {
    conn: std::sync::Arc<std::sync::Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self::wrap(conn))
    }

    pub fn open_memory() -> Result<Self> {
        Ok(Self::wrap(Connection::open_in_memory()?))
    }

    fn wrap(conn: Connection) -> Self {
        Self {
            conn: std::sync::Arc::new(std::sync::Mutex::new(conn)),
        }
    }

    /// Apply pending migrations and sync the lab catalogue from the registry.
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)?;
        for lab in labs::REGISTRY.iter().map(LabInfo::from) {
            conn.execute(
                "INSERT INTO labs (id, slug, title, difficulty, points, total_steps)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    slug = excluded.slug, title = excluded.title, difficulty = excluded.difficulty,
                    points = excluded.points, total_steps = excluded.total_steps",
                (
                    lab.id,
                    &lab.slug,
                    &lab.title,
                    lab.difficulty.as_str(),
                    lab.points,
                    lab.total_steps,
                ),
            )?;
        }
        Ok(())
    }

    // ============================================================
    // Labs
    // ============================================================

    pub fn get_labs(&self) -> Result<Vec<LabInfo>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, slug, title, difficulty, points, total_steps FROM labs ORDER BY id",
        )?;

        let labs = stmt
            .query_map([], lab_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(labs)
    }

    pub fn get_lab(&self, id: u32) -> Result<Option<LabInfo>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let lab = conn
            .query_row(
                "SELECT id, slug, title, difficulty, points, total_steps FROM labs WHERE id = ?",
                [id],
                lab_from_row,
            )
            .optional()?;
        Ok(lab)
    }

    // ============================================================
    // Users & tokens
    // ============================================================

    pub fn create_user(&self, input: SignupInput) -> Result<User> {
        let username = input.username.trim().to_string();
        let student_id = input.student_id.trim().to_string();
        let email = input.email.trim().to_lowercase();
        if username.is_empty() || student_id.is_empty() || email.is_empty() || input.password.is_empty()
        {
            anyhow::bail!("username, student_id, email and password are required");
        }

        let conn = self.conn.lock().expect("database lock poisoned");
        for (column, value) in [
            ("username", &username),
            ("student_id", &student_id),
            ("email", &email),
        ] {
            let taken: bool = conn.query_row(
                &format!("SELECT EXISTS(SELECT 1 FROM users WHERE {} = ?)", column),
                [value],
                |row| row.get(0),
            )?;
            if taken {
                anyhow::bail!("{} already exists", column);
            }
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO users (id, username, student_id, email, password_hash, created_at, last_active)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            (
                id.to_string(),
                &username,
                &student_id,
                &email,
                hash_password(&input.password),
                now.to_rfc3339(),
                now.to_rfc3339(),
            ),
        )?;

        tracing::info!(username = %username, "user registered");
        Ok(User {
            id,
            username,
            student_id,
            email,
            is_admin: false,
            total_score: 0,
            created_at: now,
            last_active: now,
        })
    }

    /// Check credentials. `None` for an unknown user or a wrong password.
    pub fn verify_login(&self, input: &LoginInput) -> Result<Option<User>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let stored: Option<(String, String)> = conn
            .query_row(
                "SELECT id, password_hash FROM users WHERE username = ?",
                [input.username.trim()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((id, hash)) = stored else {
            return Ok(None);
        };
        if !verify_password(&hash, &input.password) {
            return Ok(None);
        }
        drop(conn);
        self.get_user(parse_uuid(id))
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let user = conn
            .query_row(
                "SELECT id, username, student_id, email, is_admin, total_score, created_at, last_active
                 FROM users WHERE id = ?",
                [id.to_string()],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn create_token(&self, user_id: Uuid) -> Result<String> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let token = Uuid::new_v4().simple().to_string();
        conn.execute(
            "INSERT INTO auth_tokens (token, user_id, created_at) VALUES (?, ?, ?)",
            (&token, user_id.to_string(), Utc::now().to_rfc3339()),
        )?;
        Ok(token)
    }

    /// Resolve a bearer token and touch the user's `last_active`.
    pub fn user_for_token(&self, token: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let user = conn
            .query_row(
                "SELECT u.id, u.username, u.student_id, u.email, u.is_admin, u.total_score,
                        u.created_at, u.last_active
                 FROM auth_tokens t JOIN users u ON u.id = t.user_id
                 WHERE t.token = ?",
                [token],
                user_from_row,
            )
            .optional()?;

        if let Some(user) = &user {
            conn.execute(
                "UPDATE users SET last_active = ? WHERE id = ?",
                (Utc::now().to_rfc3339(), user.id.to_string()),
            )?;
        }
        Ok(user)
    }

    pub fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT u.username, u.total_score,
                    (SELECT COUNT(*) FROM solves s WHERE s.user_id = u.id)
             FROM users u
             ORDER BY u.total_score DESC, u.created_at
             LIMIT ?",
        )?;

        let rows = stmt
            .query_map([limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, u32>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .zip(1..)
            .map(|((username, total_score, labs_completed), rank)| LeaderboardEntry {
                rank,
                username,
                total_score,
                labs_completed,
            })
            .collect())
    }

    // ============================================================
    // Progress
    // ============================================================

    pub fn get_progress(&self, user_id: Uuid) -> Result<ProgressSnapshot> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT lab_id, completed_steps, completed_at FROM lab_progress
             WHERE user_id = ? ORDER BY lab_id",
        )?;

        let rows = stmt
            .query_map([user_id.to_string()], |row| {
                Ok(LabProgress {
                    lab_id: row.get(0)?,
                    completed_steps: LabProgress::parse_steps(&row.get::<_, String>(1)?),
                    completed_at: row.get::<_, Option<String>>(2)?.map(parse_datetime),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let total_score: u32 = conn.query_row(
            "SELECT total_score FROM users WHERE id = ?",
            [user_id.to_string()],
            |row| row.get(0),
        )?;

        let mut snapshot = ProgressSnapshot {
            total_score,
            ..Default::default()
        };
        for progress in rows {
            if progress.is_complete() {
                snapshot.mark_lab_complete(progress.lab_id);
            }
            snapshot.progress.insert(progress.lab_id, progress);
        }
        Ok(snapshot)
    }

    /// Union one step into the user's progress for a lab.
    ///
    /// The write that fills the lab sets `completed_at`, records the solve and
    /// adds the lab's points, all once.
    pub fn record_step(&self, user_id: Uuid, input: RecordStepInput) -> Result<RecordStepResponse> {
        let meta = labs::meta(input.lab_id)
            .ok_or_else(|| anyhow::anyhow!("unknown lab {}", input.lab_id))?;
        if input.step_id == 0 || input.step_id > meta.total_steps {
            anyhow::bail!("unknown step {} for lab {}", input.step_id, input.lab_id);
        }

        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;
        let now = Utc::now();

        let existing: Option<(String, Option<String>)> = tx
            .query_row(
                "SELECT completed_steps, completed_at FROM lab_progress
                 WHERE user_id = ? AND lab_id = ?",
                (user_id.to_string(), input.lab_id),
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let mut progress = LabProgress::new(input.lab_id);
        if let Some((steps, completed_at)) = existing {
            progress.completed_steps = LabProgress::parse_steps(&steps);
            progress.completed_at = completed_at.map(parse_datetime);
        }
        progress.insert(input.step_id);

        let mut lab_completed = false;
        if progress.completed_at.is_none() && progress.completed_steps.len() >= meta.total_steps as usize {
            progress.completed_at = Some(now);
            let solved = tx.execute(
                "INSERT OR IGNORE INTO solves (user_id, lab_id, solved_at) VALUES (?, ?, ?)",
                (user_id.to_string(), input.lab_id, now.to_rfc3339()),
            )?;
            if solved > 0 {
                tx.execute(
                    "UPDATE users SET total_score = total_score + ? WHERE id = ?",
                    (meta.points, user_id.to_string()),
                )?;
                lab_completed = true;
            }
        }

        tx.execute(
            "INSERT INTO lab_progress (user_id, lab_id, completed_steps, completed_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(user_id, lab_id) DO UPDATE SET
                completed_steps = excluded.completed_steps,
                completed_at = excluded.completed_at,
                updated_at = excluded.updated_at",
            (
                user_id.to_string(),
                input.lab_id,
                progress.steps_column(),
                progress.completed_at.map(|at| at.to_rfc3339()),
                now.to_rfc3339(),
            ),
        )?;

        let new_total_score: u32 = tx.query_row(
            "SELECT total_score FROM users WHERE id = ?",
            [user_id.to_string()],
            |row| row.get(0),
        )?;
        tx.commit()?;

        if lab_completed {
            tracing::info!(user = %user_id, lab = input.lab_id, score = new_total_score, "lab solved");
        }
        Ok(RecordStepResponse {
            lab_progress: progress,
            lab_completed,
            new_total_score,
        })
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

fn lab_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LabInfo> {
    Ok(LabInfo {
        id: row.get(0)?,
        slug: row.get(1)?,
        title: row.get(2)?,
        difficulty: Difficulty::from_str(&row.get::<_, String>(3)?)
            .unwrap_or(Difficulty::Beginner),
        points: row.get(4)?,
        total_steps: row.get(5)?,
    })
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: parse_uuid(row.get::<_, String>(0)?),
        username: row.get(1)?,
        student_id: row.get(2)?,
        email: row.get(3)?,
        is_admin: row.get::<_, i32>(4)? != 0,
        total_score: row.get(5)?,
        created_at: parse_datetime(row.get::<_, String>(6)?),
        last_active: parse_datetime(row.get::<_, String>(7)?),
    })
}

/// `salt$sha256(salt || password)`, hex encoded.
fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    format!("{}${}", salt, digest(&salt, password))
}

fn verify_password(stored: &str, password: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, hash)) => digest(salt, password) == hash,
        None => false,
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
