mod common;

use common::{setup, PASSWORD};
use core_lib::domain::user::Role;
use http::StatusCode;
use serde_json::{json, Value};

fn member_form(email: &str, tenant_id: Option<&str>, role: &str) -> Value {
    json!({
        "email": email,
        "password": PASSWORD,
        "confirm_password": PASSWORD,
        "full_name": "Sam Seller",
        "tenant_id": tenant_id,
        "role": role
    })
}

#[tokio::test]
async fn tenant_admin_adds_a_member_who_can_sign_in() {
    let app = setup();
    app.seed_tenant("acme").await;
    app.seed_user("owner@acme.test", Role::Admin, Some("acme")).await;
    let owner = app.sign_in("owner@acme.test").await;

    let response = app
        .server
        .post("/api/auth/sign-up")
        .authorization_bearer(&owner)
        .json(&member_form("Sam@Acme.test", None, "manager"))
        .await;
    response.assert_status(StatusCode::CREATED);
    let profile: Value = response.json();
    assert_eq!(profile["email"], "sam@acme.test");
    assert_eq!(profile["tenant_id"], "acme");
    assert_eq!(profile["role"], "manager");

    let response = app
        .server
        .post("/api/auth/sign-in")
        .json(&json!({"email": "sam@acme.test", "password": PASSWORD}))
        .await;
    response.assert_status_ok();
    let session: Value = response.json();
    let token = session["token"].as_str().unwrap();
    assert_eq!(token.len(), 48);
    assert_eq!(session["context"]["active_tenant"], "acme");

    let me: Value = app.server.get("/api/auth/me").authorization_bearer(token).await.json();
    assert_eq!(me["email"], "sam@acme.test");
    assert_eq!(me["role"], "manager");
}

#[tokio::test]
async fn nobody_joins_a_tenant_they_do_not_administer() {
    let app = setup();
    app.seed_tenant("acme").await;
    app.seed_conversation("acme", "Secret Customer", 1).await;
    let outsider = app.staff_session("globex").await;
    app.seed_user("owner@globex.test", Role::Admin, Some("globex")).await;
    let globex_owner = app.sign_in("owner@globex.test").await;

    let anonymous = app
        .server
        .post("/api/auth/sign-up")
        .json(&member_form("attacker@evil.test", Some("acme"), "admin"))
        .await;
    anonymous.assert_status(StatusCode::UNAUTHORIZED);

    app.server
        .post("/api/auth/sign-up")
        .authorization_bearer(&outsider)
        .json(&member_form("attacker@evil.test", Some("globex"), "staff"))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.server
        .post("/api/auth/sign-up")
        .authorization_bearer(&globex_owner)
        .json(&member_form("attacker@evil.test", Some("acme"), "staff"))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.server
        .post("/api/auth/sign-up")
        .authorization_bearer(&globex_owner)
        .json(&member_form("second@globex.test", None, "admin"))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.server
        .post("/api/auth/sign-up")
        .authorization_bearer(&globex_owner)
        .json(&member_form("root@evil.test", None, "master_admin"))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    app.server
        .post("/api/auth/sign-in")
        .json(&json!({"email": "attacker@evil.test", "password": PASSWORD}))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn sign_up_rejects_bad_forms() {
    let app = setup();
    app.seed_tenant("acme").await;
    app.seed_user("owner@acme.test", Role::Admin, Some("acme")).await;
    let owner = app.sign_in("owner@acme.test").await;

    let response = app
        .server
        .post("/api/auth/sign-up")
        .authorization_bearer(&owner)
        .json(&json!({
            "email": "staff@acme.test",
            "password": PASSWORD,
            "confirm_password": "different-1",
            "full_name": null,
            "tenant_id": null
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = app
        .server
        .post("/api/auth/sign-up")
        .authorization_bearer(&owner)
        .json(&json!({
            "email": "not-an-email",
            "password": PASSWORD,
            "confirm_password": PASSWORD,
            "full_name": null,
            "tenant_id": null
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = setup();
    app.staff_session("acme").await;

    let response = app
        .server
        .post("/api/auth/sign-in")
        .json(&json!({"email": "staff@acme.test", "password": "wrong-pass-1"}))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error"]["title"], "Not signed in");
}

#[tokio::test]
async fn protected_routes_need_a_live_session() {
    let app = setup();
    app.server
        .get("/api/conversations")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    app.server
        .get("/api/conversations")
        .authorization_bearer("not-a-session")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let token = app.staff_session("acme").await;
    app.server
        .post("/api/auth/sign-out")
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    app.server
        .get("/api/auth/me")
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn suspended_tenants_cannot_sign_in() {
    let app = setup();
    app.staff_session("acme").await;
    let admin = app.master_admin_session().await;

    app.server
        .post("/api/admin/tenants/acme/suspend")
        .authorization_bearer(&admin)
        .await
        .assert_status_ok();

    let response = app
        .server
        .post("/api/auth/sign-in")
        .json(&json!({"email": "staff@acme.test", "password": PASSWORD}))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn suspension_cuts_off_existing_sessions() {
    let app = setup();
    let staff = app.staff_session("acme").await;
    let admin = app.master_admin_session().await;
    app.server
        .get("/api/conversations")
        .authorization_bearer(&staff)
        .await
        .assert_status_ok();

    app.server
        .post("/api/admin/tenants/acme/suspend")
        .authorization_bearer(&admin)
        .await
        .assert_status_ok();

    let response = app.server.get("/api/conversations").authorization_bearer(&staff).await;
    response.assert_status(StatusCode::FORBIDDEN);
    app.server
        .patch("/api/tenant/settings")
        .authorization_bearer(&staff)
        .json(&json!({"company_name": "Still here"}))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.server
        .get("/api/admin/tenants")
        .authorization_bearer(&admin)
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn malformed_json_gets_the_error_body() {
    let app = setup();
    let response = app
        .server
        .post("/api/auth/sign-in")
        .content_type("application/json")
        .bytes("{not json".into())
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["title"], "Invalid request");
}

#[tokio::test]
async fn unknown_routes_are_json_404s() {
    let app = setup();
    let response = app.server.get("/api/nothing-here").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"]["title"], "Not found");
}
