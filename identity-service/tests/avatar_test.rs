mod common;

use axum::http::StatusCode;
use common::TestApp;
use identity_service::models::UserKey;
use identity_service::services::RecordStore;

const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const PNG_DATA_URI: &str = "data:image/png;base64,iVBORw0KGgo=";

#[tokio::test]
async fn png_upload_is_stored_and_linked() {
    let app = TestApp::spawn().await;
    let cookie = app.login("app-built-in", "built-in", "admin", "123").await;

    let res = app
        .post_form(
            "/api/upload-avatar",
            &[("avatarfile", PNG_DATA_URI)],
            Some(&cookie),
        )
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "ok", "{}", res.body);

    let written = std::fs::read(app.avatar_dir.path().join("built-in").join("admin.png"))
        .expect("avatar written to storage");
    assert_eq!(written, PNG_HEADER);

    let user = app
        .store
        .get_user(&UserKey::new("built-in", "admin"))
        .await
        .unwrap()
        .unwrap();
    assert!(
        user.avatar
            .starts_with("http://cdn.test/avatars/built-in/admin.png?time="),
        "unexpected avatar url {}",
        user.avatar
    );
}

#[tokio::test]
async fn non_png_data_uri_is_rejected() {
    let app = TestApp::spawn().await;
    let cookie = app.login("app-built-in", "built-in", "admin", "123").await;

    let res = app
        .post_form(
            "/api/upload-avatar",
            &[("avatarfile", "data:image/jpeg;base64,/9j/4AAQ")],
            Some(&cookie),
        )
        .await;

    assert_eq!(res.body["status"], "error");
    assert_eq!(res.msg(), "File encoding error");
    assert!(!app.avatar_dir.path().join("built-in").exists());

    let user = app
        .store
        .get_user(&UserKey::new("built-in", "admin"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.avatar, "https://casbin.org/img/casbin.svg");
}

#[tokio::test]
async fn upload_requires_a_session() {
    let app = TestApp::spawn().await;

    let res = app
        .post_form("/api/upload-avatar", &[("avatarfile", PNG_DATA_URI)], None)
        .await;

    assert_eq!(res.msg(), "Please sign in first");
}

#[tokio::test]
async fn missing_form_field_is_a_bad_request() {
    let app = TestApp::spawn().await;
    let cookie = app.login("app-built-in", "built-in", "admin", "123").await;

    let res = app
        .post_form("/api/upload-avatar", &[("other", "x")], Some(&cookie))
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}
