use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use nail_studio::api::{ApiClient, ApiError, DesignApi};
use nail_studio::gallery::{
    FAVORITE_FAILED_MESSAGE, GalleryError, GalleryState, SortMode,
};
use nail_studio::generation::{IMAGE_GENERATION_MODELS, generate_all};
use nail_studio::results::{ResultsView, SaveState};
use nail_studio::session::{SessionProvider, SessionUser};
use nail_studio::test_support::spawn_mock_backend;
use nail_studio::wizard::{PICK_BASE_COLOR, SelectOutcome, Wizard};
use serde_json::json;

const TIMEOUT: Duration = Duration::from_secs(5);

fn signed_in_client(base_url: &str, token: &str) -> (SessionProvider, ApiClient) {
    let session = SessionProvider::new();
    session.sign_in(SessionUser::with_token("tester", token));
    let api = ApiClient::new(base_url, session.handle(), TIMEOUT).expect("valid base URL");
    (session, api)
}

async fn serve(router: Router) -> Option<String> {
    let listener = match tokio::net::TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(error) if error.kind() == std::io::ErrorKind::PermissionDenied => return None,
        Err(error) => panic!("ephemeral port should be available for bind: {error}"),
    };
    let addr = listener.local_addr().expect("listener has local address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Some(format!("http://{addr}"))
}

#[tokio::test]
async fn wizard_generate_save_and_gallery_round_trip() {
    let Some(base_url) = spawn_mock_backend().await else {
        eprintln!("skipping: local TCP bind is not permitted in this environment");
        return;
    };
    let (_session, api) = signed_in_client(&base_url, "token-a");

    let mut wizard = Wizard::new();
    for value in ["medium", "almond", "ombre"] {
        assert!(matches!(
            wizard.select(value).expect("valid option"),
            SelectOutcome::Advanced { .. }
        ));
    }
    wizard.select(PICK_BASE_COLOR).expect("picker opens");
    wizard.set_color_draft("#aabbcc").expect("valid draft");
    wizard.confirm_color().expect("picker open");
    let SelectOutcome::ReadyToSubmit(selections) = wizard.select("rich").expect("valid option")
    else {
        panic!("last step should submit");
    };

    let outcome = generate_all(&api, &selections, &IMAGE_GENERATION_MODELS).await;
    let result = wizard.finish_submission(outcome).expect("generation succeeds").clone();
    assert_eq!(result.image_urls.len(), IMAGE_GENERATION_MODELS.len());
    assert!(result.image_urls[0].contains("stabilityai-sdxl-turbo-free"));

    let mut results = ResultsView::new(result, selections.describe());
    let saved = results.save(&api, 0).await.expect("save succeeds");
    assert_eq!(
        results.images()[0].save_state,
        SaveState::Saved {
            design_id: saved.id.clone()
        }
    );
    assert!(saved.prompt.contains("base color #aabbcc"));
    results.save(&api, 1).await.expect("second save succeeds");

    let mut state = GalleryState::load(&api).await;
    let gallery = state.gallery_mut().expect("gallery loads");
    assert_eq!(gallery.len(), 2);

    gallery
        .toggle_favorite(&api, &saved.id)
        .await
        .expect("favorite toggles");
    let favorites = gallery.sorted(SortMode::Favorites);
    assert_eq!(favorites[0].id, saved.id);
    assert!(favorites[0].is_favorite);

    gallery.delete(&api, &saved.id).await.expect("delete succeeds");
    assert_eq!(gallery.len(), 1);

    let reloaded = api.my_designs().await.expect("list succeeds");
    assert_eq!(reloaded.len(), 1);
    assert!(reloaded.iter().all(|design| design.id != saved.id));
}

#[tokio::test]
async fn designs_are_scoped_to_the_bearer_token() {
    let Some(base_url) = spawn_mock_backend().await else {
        eprintln!("skipping: local TCP bind is not permitted in this environment");
        return;
    };
    let (_a_session, alice) = signed_in_client(&base_url, "alice");
    let (_b_session, bob) = signed_in_client(&base_url, "bob");

    alice
        .save_design(nail_studio::api::SaveDesignRequest {
            prompt: "nail art design: short length".to_owned(),
            temporary_image_url: "https://img/1.png".to_owned(),
        })
        .await
        .expect("save succeeds");

    assert_eq!(alice.my_designs().await.expect("list").len(), 1);
    assert!(bob.my_designs().await.expect("list").is_empty());
}

#[tokio::test]
async fn signed_out_session_never_reaches_protected_routes() {
    let Some(base_url) = spawn_mock_backend().await else {
        eprintln!("skipping: local TCP bind is not permitted in this environment");
        return;
    };
    let session = SessionProvider::from_token(None);
    let api = ApiClient::new(&base_url, session.handle(), TIMEOUT).expect("valid base URL");

    let error = api.my_designs().await.expect_err("signed out");
    assert!(matches!(error, ApiError::Unauthenticated));

    let fact = api.fun_fact().await.expect("fun facts are public");
    assert!(!fact.text.is_empty());
}

#[tokio::test]
async fn favorite_on_unknown_design_rolls_back_with_message() {
    let Some(base_url) = spawn_mock_backend().await else {
        eprintln!("skipping: local TCP bind is not permitted in this environment");
        return;
    };
    let (_session, api) = signed_in_client(&base_url, "token-b");

    let error = api
        .toggle_favorite("design-missing")
        .await
        .expect_err("unknown design");
    assert_eq!(error.status(), Some(StatusCode::NOT_FOUND));
    assert_eq!(error.to_string(), "Design not found");

    let mut gallery = nail_studio::gallery::Gallery::new(vec![nail_studio::api::DesignRecord {
        id: "design-missing".to_owned(),
        image_url: "https://img/x.png".to_owned(),
        prompt: "ghost".to_owned(),
        is_favorite: false,
        created_at: chrono::Utc::now(),
    }]);
    let error = gallery
        .toggle_favorite(&api, "design-missing")
        .await
        .expect_err("backend rejects toggle");
    assert!(matches!(error, GalleryError::FavoriteRolledBack { .. }));
    assert_eq!(error.to_string(), FAVORITE_FAILED_MESSAGE);
    assert!(!gallery.items()[0].record.is_favorite);
}

#[tokio::test]
async fn json_error_body_surfaces_its_message_verbatim() {
    let router = Router::new().route(
        "/api/my-designs",
        get(|| async { (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))) }),
    );
    let Some(base_url) = serve(router).await else {
        eprintln!("skipping: local TCP bind is not permitted in this environment");
        return;
    };
    let (_session, api) = signed_in_client(&base_url, "token");

    let error = api.my_designs().await.expect_err("404");
    assert_eq!(error.status(), Some(StatusCode::NOT_FOUND));
    assert_eq!(error.to_string(), "not found");
}

#[tokio::test]
async fn unparseable_error_body_surfaces_fallback_message() {
    let router = Router::new().route(
        "/api/my-designs",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "<html>upstream exploded</html>") }),
    );
    let Some(base_url) = serve(router).await else {
        eprintln!("skipping: local TCP bind is not permitted in this environment");
        return;
    };
    let (_session, api) = signed_in_client(&base_url, "token");

    let error = api.my_designs().await.expect_err("500");
    assert_eq!(error.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    assert_eq!(
        error.to_string(),
        nail_studio::api::client::UNPARSEABLE_ERROR_MESSAGE
    );

    let state = GalleryState::load(&api).await;
    assert_eq!(
        state,
        GalleryState::Failed {
            message: nail_studio::api::client::UNPARSEABLE_ERROR_MESSAGE.to_owned()
        }
    );
}

#[tokio::test]
async fn generation_failure_returns_wizard_to_last_step() {
    let router = Router::new().route(
        "/api/generate",
        axum::routing::post(|| async {
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "model overloaded" })),
            )
        }),
    );
    let Some(base_url) = serve(router).await else {
        eprintln!("skipping: local TCP bind is not permitted in this environment");
        return;
    };
    let (_session, api) = signed_in_client(&base_url, "token");

    let mut wizard = Wizard::new();
    for value in ["short", "square", "french"] {
        wizard.select(value).expect("valid option");
    }
    let SelectOutcome::ReadyToSubmit(selections) = wizard.select("balanced").expect("valid")
    else {
        panic!("last step should submit");
    };

    let outcome = generate_all(&api, &selections, &IMAGE_GENERATION_MODELS).await;
    let error = wizard.finish_submission(outcome).expect_err("backend fails");
    assert_eq!(error.to_string(), "Generation Failed: model overloaded");
    assert_eq!(wizard.selections(), &selections);
    assert!(!wizard.is_submitting());
}
