use cyberlab::api::{create_router, SecurityConfig};
use cyberlab::client::{ClientError, ProgressClient};
use cyberlab::db::Database;
use cyberlab::models::*;
use cyberlab::progress::{LocalCache, ProgressStore, ReloadSource};

/// Start the progress service on an ephemeral port and return its base URL.
async fn spawn_service() -> String {
    let db = Database::open_memory().expect("Failed to create database");
    db.migrate().expect("Failed to migrate");
    let app = create_router(db, SecurityConfig::disabled());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("bound address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server crashed");
    });
    format!("http://{}", addr)
}

/// A URL nothing is listening on.
async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("bound address");
    drop(listener);
    format!("http://{}", addr)
}

async fn signed_up(url: &str, username: &str) -> Identity {
    let auth = ProgressClient::new(url)
        .signup(&SignupInput {
            username: username.to_string(),
            student_id: format!("{}-sid", username),
            email: format!("{}@uni.edu", username),
            password: "hunter2".to_string(),
        })
        .await
        .expect("signup");
    Identity::from(&auth)
}

async fn record_and_sync(store: &ProgressStore, lab_id: u32, step_id: u32) -> bool {
    let outcome = store.record_step(lab_id, step_id).expect("valid step");
    if let Some(sync) = outcome.sync {
        sync.await.expect("sync task panicked");
    }
    outcome.lab_completed
}

mod client {
    use super::*;

    #[tokio::test]
    async fn maps_error_statuses() {
        let url = spawn_service().await;
        let client = ProgressClient::new(&url);
        signed_up(&url, "nour").await;

        let dup = client
            .signup(&SignupInput {
                username: "nour".into(),
                student_id: "x".into(),
                email: "x@uni.edu".into(),
                password: "pw".into(),
            })
            .await;
        assert!(matches!(dup, Err(ClientError::Conflict(_))));

        let bad_login = client
            .login(&LoginInput {
                username: "nour".into(),
                password: "nope".into(),
            })
            .await;
        assert!(matches!(bad_login, Err(ClientError::Unauthorized(_))));

        assert!(matches!(
            client.fetch_progress().await,
            Err(ClientError::NoIdentity)
        ));
    }

    #[tokio::test]
    async fn round_trips_auth_and_progress() {
        let url = spawn_service().await;
        let identity = signed_up(&url, "nour").await;
        let client = ProgressClient::new(&url).with_token(&identity.token);

        assert_eq!(client.me().await.expect("me").username, "nour");
        assert_eq!(client.labs().await.expect("labs").len(), 5);

        let written = client
            .record_step(RecordStepInput {
                lab_id: 3,
                step_id: 4,
            })
            .await
            .expect("record");
        assert_eq!(written.lab_progress.completed_steps, vec![4]);

        let snapshot = client.fetch_progress().await.expect("fetch");
        assert_eq!(snapshot.completed_count(3), 1);

        let board = client.leaderboard().await.expect("leaderboard");
        assert_eq!(board[0].username, "nour");
    }

    #[tokio::test]
    async fn unreachable_service_is_an_http_error() {
        let client = ProgressClient::new(dead_url().await).with_token("t");
        assert!(matches!(
            client.fetch_progress().await,
            Err(ClientError::Http(_))
        ));
    }
}

mod store {
    use super::*;

    #[tokio::test]
    async fn syncs_steps_and_adopts_the_server_score() {
        let url = spawn_service().await;
        let identity = signed_up(&url, "nour").await;
        let store = ProgressStore::new(
            LocalCache::open_memory().expect("cache"),
            ProgressClient::new(&url),
        );
        store.set_identity(Some(identity.clone())).await;

        let mut completions = 0;
        for step in 1..=9 {
            if record_and_sync(&store, 1, step).await {
                completions += 1;
            }
        }

        assert_eq!(completions, 1);
        assert_eq!(store.total_score(), 100);
        assert!(store.is_unlocked(2));

        let remote = ProgressClient::new(&url)
            .with_token(&identity.token)
            .fetch_progress()
            .await
            .expect("fetch");
        assert_eq!(remote.completed_count(1), 9);
        assert_eq!(remote.total_score, 100);
        assert_eq!(remote.completed_labs, vec![1]);
    }

    #[tokio::test]
    async fn keeps_local_state_when_the_service_is_down() {
        let cache = LocalCache::open_memory().expect("cache");
        cache
            .set_identity(Some(&Identity {
                token: "stale".into(),
                username: "nour".into(),
            }))
            .expect("identity");
        let store = ProgressStore::new(cache, ProgressClient::new(dead_url().await));

        let outcome = store.record_step(2, 3).expect("valid step");
        let sync = outcome.sync.expect("identity present, so a sync is attempted");
        sync.await.expect("sync task panicked");

        assert_eq!(store.lab_progress(2).completed_steps, vec![3]);
        assert_eq!(store.reload().await, ReloadSource::Local);
        assert_eq!(store.lab_progress(2).completed_steps, vec![3]);
    }

    #[tokio::test]
    async fn reload_signs_out_a_rejected_token_but_keeps_progress() {
        let url = spawn_service().await;
        let cache = LocalCache::open_memory().expect("cache");
        cache
            .set_identity(Some(&Identity {
                token: "revoked".into(),
                username: "nour".into(),
            }))
            .expect("identity");
        cache.set_lab_steps(1, &[1, 2]).expect("write");
        let store = ProgressStore::new(cache.clone(), ProgressClient::new(&url));

        assert_eq!(store.reload().await, ReloadSource::Local);

        assert!(!store.has_identity());
        assert_eq!(cache.identity().expect("read"), None);
        assert_eq!(store.lab_progress(1).completed_steps, vec![1, 2]);

        for step in 1..=9 {
            let outcome = store.record_step(1, step).expect("valid step");
            assert!(outcome.sync.is_none());
        }
        assert!(!store.is_unlocked(2));
    }

    #[tokio::test]
    async fn rejected_push_signs_out() {
        let url = spawn_service().await;
        let cache = LocalCache::open_memory().expect("cache");
        cache
            .set_identity(Some(&Identity {
                token: "revoked".into(),
                username: "nour".into(),
            }))
            .expect("identity");
        let store = ProgressStore::new(cache.clone(), ProgressClient::new(&url));

        let outcome = store.record_step(1, 1).expect("valid step");
        outcome
            .sync
            .expect("identity present, so a sync is attempted")
            .await
            .expect("sync task panicked");

        assert!(!store.has_identity());
        assert_eq!(cache.identity().expect("read"), None);
        assert_eq!(store.lab_progress(1).completed_steps, vec![1]);
    }

    #[tokio::test]
    async fn reload_replaces_local_progress_wholesale() {
        let url = spawn_service().await;
        let identity = signed_up(&url, "nour").await;
        let cache = LocalCache::open_memory().expect("cache");
        let store = ProgressStore::new(cache.clone(), ProgressClient::new(&url));
        store.set_identity(Some(identity)).await;

        record_and_sync(&store, 1, 1).await;
        // An offline completion the server never heard about.
        cache.set_lab_steps(3, &[1, 2]).expect("write");

        assert_eq!(store.reload().await, ReloadSource::Remote);
        assert_eq!(store.lab_progress(1).completed_steps, vec![1]);
        assert!(store.lab_progress(3).completed_steps.is_empty());
        assert_eq!(cache.lab_steps(3).expect("read"), None);
    }

    #[tokio::test]
    async fn reset_is_local_only() {
        let url = spawn_service().await;
        let identity = signed_up(&url, "nour").await;
        let store = ProgressStore::new(
            LocalCache::open_memory().expect("cache"),
            ProgressClient::new(&url),
        );
        store.set_identity(Some(identity)).await;
        record_and_sync(&store, 1, 4).await;

        store.reset_lab(1);
        assert!(store.lab_progress(1).completed_steps.is_empty());

        // The server still has it, so the next reload brings it back.
        store.reload().await;
        assert_eq!(store.lab_progress(1).completed_steps, vec![4]);
    }

    #[tokio::test]
    async fn logout_forgets_identity_and_progress() {
        let url = spawn_service().await;
        let identity = signed_up(&url, "nour").await;
        let cache = LocalCache::open_memory().expect("cache");
        let store = ProgressStore::new(cache.clone(), ProgressClient::new(&url));
        store.set_identity(Some(identity)).await;
        record_and_sync(&store, 1, 1).await;

        store.set_identity(None).await;

        assert!(!store.has_identity());
        assert!(store.snapshot().progress.is_empty());
        assert_eq!(cache.identity().expect("read"), None);
        assert_eq!(cache.lab_steps(1).expect("read"), None);
    }

    #[tokio::test]
    async fn local_progress_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("local.db");
        let url = dead_url().await;

        {
            let store = ProgressStore::new(
                LocalCache::open(path.clone()).expect("cache"),
                ProgressClient::new(&url),
            );
            for step in 1..=9 {
                store.record_step(1, step).expect("valid step");
            }
            store.record_step(2, 5).expect("valid step");
        }

        let reopened = ProgressStore::new(
            LocalCache::open(path).expect("cache"),
            ProgressClient::new(&url),
        );
        assert_eq!(reopened.lab_progress(1).completed_steps.len(), 9);
        assert!(reopened.lab_progress(1).completed_at.is_some());
        assert_eq!(reopened.lab_progress(2).completed_steps, vec![5]);
        assert_eq!(reopened.total_score(), 100);
        // Complete, but nobody is signed in.
        assert!(!reopened.is_unlocked(2));
    }
}
