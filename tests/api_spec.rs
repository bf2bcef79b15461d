use axum::http::StatusCode;
use axum_test::TestServer;
use cyberlab::api::{create_router, SecurityConfig};
use cyberlab::db::Database;
use cyberlab::models::*;

fn setup() -> TestServer {
    setup_with(SecurityConfig::disabled())
}

fn setup_with(security: SecurityConfig) -> TestServer {
    let db = Database::open_memory().expect("Failed to create database");
    db.migrate().expect("Failed to migrate");
    let app = create_router(db, security);
    TestServer::new(app).expect("Failed to create test server")
}

fn signup_input(username: &str) -> SignupInput {
    SignupInput {
        username: username.to_string(),
        student_id: format!("{}-sid", username),
        email: format!("{}@uni.edu", username),
        password: "hunter2".to_string(),
    }
}

async fn signup(server: &TestServer, username: &str) -> AuthResponse {
    server
        .post("/api/auth/signup")
        .json(&signup_input(username))
        .await
        .json::<AuthResponse>()
}

fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

mod health {
    use super::*;

    #[tokio::test]
    async fn reports_ok() {
        let server = setup();
        let response = server.get("/health").await;
        response.assert_status_ok();
        response.assert_json(&serde_json::json!({ "status": "ok" }));
    }
}

mod labs {
    use super::*;

    #[tokio::test]
    async fn lists_the_catalogue() {
        let server = setup();
        let labs: Vec<LabInfo> = server.get("/api/labs").await.json();
        assert_eq!(labs.len(), 5);
        assert_eq!(labs[1].slug, "lab02");
        assert_eq!(labs[1].total_steps, 10);
    }

    #[tokio::test]
    async fn gets_one_lab_or_404() {
        let server = setup();

        let lab: LabInfo = server.get("/api/labs/5").await.json();
        assert_eq!(lab.points, 250);

        server
            .get("/api/labs/99")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}

mod auth {
    use super::*;

    #[tokio::test]
    async fn signup_returns_201_with_token() {
        let server = setup();
        let response = server
            .post("/api/auth/signup")
            .json(&signup_input("nour"))
            .await;

        response.assert_status(StatusCode::CREATED);
        let auth: AuthResponse = response.json();
        assert!(!auth.token.is_empty());
        assert_eq!(auth.user.username, "nour");
    }

    #[tokio::test]
    async fn duplicate_signup_is_a_conflict() {
        let server = setup();
        signup(&server, "nour").await;

        server
            .post("/api/auth/signup")
            .json(&signup_input("nour"))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn blank_signup_is_a_bad_request() {
        let server = setup();
        let mut input = signup_input("nour");
        input.password = String::new();

        server
            .post("/api/auth/signup")
            .json(&input)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn login_checks_the_password() {
        let server = setup();
        signup(&server, "nour").await;

        let ok = server
            .post("/api/auth/login")
            .json(&LoginInput {
                username: "nour".into(),
                password: "hunter2".into(),
            })
            .await;
        ok.assert_status_ok();
        assert_eq!(ok.json::<AuthResponse>().user.username, "nour");

        server
            .post("/api/auth/login")
            .json(&LoginInput {
                username: "nour".into(),
                password: "wrong".into(),
            })
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn me_requires_a_valid_bearer_token() {
        let server = setup();
        let auth = signup(&server, "nour").await;

        server
            .get("/api/auth/me")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .get("/api/auth/me")
            .add_header("Authorization", "Token abc")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .get("/api/auth/me")
            .add_header("Authorization", bearer("not-a-token"))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        let me: MeResponse = server
            .get("/api/auth/me")
            .add_header("Authorization", bearer(&auth.token))
            .await
            .json();
        assert_eq!(me.user.id, auth.user.id);
    }

    #[tokio::test]
    async fn auth_routes_are_rate_limited_per_ip() {
        let server = setup_with(SecurityConfig::with_auth_rate_limit(2));
        let login = LoginInput {
            username: "ghost".into(),
            password: "x".into(),
        };

        for _ in 0..2 {
            server
                .post("/api/auth/login")
                .json(&login)
                .await
                .assert_status(StatusCode::UNAUTHORIZED);
        }
        server
            .post("/api/auth/login")
            .json(&login)
            .await
            .assert_status(StatusCode::TOO_MANY_REQUESTS);

        // A different client is tracked separately.
        server
            .post("/api/auth/login")
            .add_header("X-Forwarded-For", "203.0.113.5")
            .json(&login)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        // Catalogue routes are not limited.
        server.get("/api/labs").await.assert_status_ok();
    }
}

mod progress {
    use super::*;

    #[tokio::test]
    async fn requires_auth() {
        let server = setup();
        server
            .get("/api/progress")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .post("/api/progress")
            .json(&RecordStepInput {
                lab_id: 1,
                step_id: 1,
            })
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn records_steps_and_completion() {
        let server = setup();
        let auth = signup(&server, "nour").await;

        let mut completions = 0;
        let mut last_score = 0;
        for step_id in 1..=9 {
            let response: RecordStepResponse = server
                .post("/api/progress")
                .add_header("Authorization", bearer(&auth.token))
                .json(&RecordStepInput { lab_id: 1, step_id })
                .await
                .json();
            if response.lab_completed {
                completions += 1;
                assert_eq!(step_id, 9);
            }
            last_score = response.new_total_score;
        }
        assert_eq!(completions, 1);
        assert_eq!(last_score, 100);

        let snapshot: ProgressSnapshot = server
            .get("/api/progress")
            .add_header("Authorization", bearer(&auth.token))
            .await
            .json();
        assert_eq!(snapshot.completed_labs, vec![1]);
        assert_eq!(snapshot.total_score, 100);
        assert_eq!(snapshot.completed_count(1), 9);
    }

    #[tokio::test]
    async fn unknown_step_is_a_bad_request() {
        let server = setup();
        let auth = signup(&server, "nour").await;

        server
            .post("/api/progress")
            .add_header("Authorization", bearer(&auth.token))
            .json(&RecordStepInput {
                lab_id: 2,
                step_id: 11,
            })
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}

mod leaderboard {
    use super::*;

    #[tokio::test]
    async fn ranks_players_by_score() {
        let server = setup();
        let slow = signup(&server, "slow").await;
        let fast = signup(&server, "fast").await;

        for step_id in 1..=9 {
            server
                .post("/api/progress")
                .add_header("Authorization", bearer(&fast.token))
                .json(&RecordStepInput { lab_id: 1, step_id })
                .await
                .assert_status_ok();
        }
        server
            .post("/api/progress")
            .add_header("Authorization", bearer(&slow.token))
            .json(&RecordStepInput {
                lab_id: 1,
                step_id: 1,
            })
            .await
            .assert_status_ok();

        let board: Vec<LeaderboardEntry> = server.get("/api/leaderboard").await.json();
        assert_eq!(board[0].username, "fast");
        assert_eq!(board[0].total_score, 100);
        assert_eq!(board[1].username, "slow");
        assert_eq!(board[1].rank, 2);
    }
}
