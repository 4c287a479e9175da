mod common;

use common::{setup, PASSWORD};
use core_lib::domain::user::Role;
use http::StatusCode;
use serde_json::{json, Value};

fn tenant_form() -> Value {
    json!({
        "company_name": "Acme Inc.",
        "industry": "retail",
        "plan": "professional",
        "brand_color": "#ff6600",
        "admin_email": "owner@acme.test",
        "admin_password": PASSWORD,
        "confirm_password": PASSWORD,
        "admin_name": "Olive Owner"
    })
}

#[tokio::test]
async fn master_admin_onboards_a_tenant_whose_admin_can_sign_in() {
    let app = setup();
    let admin = app.master_admin_session().await;

    let response = app
        .server
        .post("/api/admin/tenants")
        .authorization_bearer(&admin)
        .json(&tenant_form())
        .await;
    response.assert_status(StatusCode::CREATED);
    let report: Value = response.json();
    let tenant_id = report["tenant_id"].as_str().unwrap().to_string();
    assert!(tenant_id.starts_with("acme-inc-"));
    assert_eq!(report["steps"].as_array().unwrap().len(), 4);
    assert_eq!(report["config"]["brand_color"], "#ff6600");

    let tenants: Vec<Value> = app
        .server
        .get("/api/admin/tenants")
        .authorization_bearer(&admin)
        .await
        .json();
    assert_eq!(tenants.len(), 1);
    assert_eq!(tenants[0]["tenant_id"], tenant_id.as_str());

    let owner = app.sign_in("owner@acme.test").await;
    let me: Value = app.server.get("/api/auth/me").authorization_bearer(&owner).await.json();
    assert_eq!(me["active_tenant"], tenant_id.as_str());
    assert_eq!(me["role"], "admin");
}

#[tokio::test]
async fn invalid_tenant_forms_are_rejected() {
    let app = setup();
    let admin = app.master_admin_session().await;
    let mut form = tenant_form();
    form["company_name"] = json!("  ");

    app.server
        .post("/api/admin/tenants")
        .authorization_bearer(&admin)
        .json(&form)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn platform_routes_are_for_master_admins_only() {
    let app = setup();
    let staff = app.staff_session("acme").await;

    app.server
        .get("/api/admin/tenants")
        .authorization_bearer(&staff)
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.server
        .post("/api/admin/tenants")
        .authorization_bearer(&staff)
        .json(&tenant_form())
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.server
        .post("/api/admin/tenants/acme/suspend")
        .authorization_bearer(&staff)
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.server
        .post("/api/admin/impersonate")
        .authorization_bearer(&staff)
        .json(&json!({"tenant_id": "acme"}))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn impersonation_switches_the_active_tenant() {
    let app = setup();
    app.seed_tenant("acme").await;
    app.seed_conversation("acme", "Maria Lopez", 1).await;
    let admin = app.master_admin_session().await;

    let before: Vec<Value> = app
        .server
        .get("/api/conversations")
        .authorization_bearer(&admin)
        .await
        .json();
    assert!(before.is_empty());
    app.server
        .post("/api/deals")
        .authorization_bearer(&admin)
        .json(&json!({"title": "Nowhere"}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let ctx: Value = app
        .server
        .post("/api/admin/impersonate")
        .authorization_bearer(&admin)
        .json(&json!({"tenant_id": "acme"}))
        .await
        .json();
    assert_eq!(ctx["active_tenant"], "acme");

    let during: Vec<Value> = app
        .server
        .get("/api/conversations")
        .authorization_bearer(&admin)
        .await
        .json();
    assert_eq!(during.len(), 1);

    let ctx: Value = app
        .server
        .delete("/api/admin/impersonate")
        .authorization_bearer(&admin)
        .await
        .json();
    assert!(ctx["active_tenant"].is_null());
}

#[tokio::test]
async fn impersonating_an_unknown_tenant_is_not_found() {
    let app = setup();
    let admin = app.master_admin_session().await;

    app.server
        .post("/api/admin/impersonate")
        .authorization_bearer(&admin)
        .json(&json!({"tenant_id": "ghost"}))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.server
        .post("/api/admin/impersonate")
        .authorization_bearer(&admin)
        .json(&json!({"tenant_id": "bad:id"}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn suspension_is_idempotent() {
    let app = setup();
    app.seed_tenant("acme").await;
    let admin = app.master_admin_session().await;

    for _ in 0..2 {
        let config: Value = app
            .server
            .post("/api/admin/tenants/acme/suspend")
            .authorization_bearer(&admin)
            .await
            .json();
        assert_eq!(config["status"], "suspended");
    }
}

#[tokio::test]
async fn tenant_admins_edit_settings_and_staff_cannot() {
    let app = setup();
    let staff = app.staff_session("acme").await;
    app.seed_user("owner@acme.test", Role::Admin, Some("acme")).await;
    let owner = app.sign_in("owner@acme.test").await;

    let patch = json!({"pipeline_stages": ["Lead", " Demo ", "Won"]});
    app.server
        .patch("/api/tenant/settings")
        .authorization_bearer(&staff)
        .json(&patch)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let config: Value = app
        .server
        .patch("/api/tenant/settings")
        .authorization_bearer(&owner)
        .json(&patch)
        .await
        .json();
    assert_eq!(config["pipeline_stages"], json!(["Lead", "Demo", "Won"]));

    let fetched: Value = app.server.get("/api/tenant").authorization_bearer(&staff).await.json();
    assert_eq!(fetched["pipeline_stages"], json!(["Lead", "Demo", "Won"]));

    app.server
        .patch("/api/tenant/settings")
        .authorization_bearer(&owner)
        .json(&json!({}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn dashboards_summarise_the_tenant() {
    let app = setup();
    let staff = app.staff_session("acme").await;
    app.seed_user("owner@acme.test", Role::Admin, Some("acme")).await;
    let owner = app.sign_in("owner@acme.test").await;
    app.seed_conversation("acme", "Maria Lopez", 2).await;
    app.seed_conversation("acme", "Tom Baker", 3).await;

    let summary: Value = app.server.get("/api/dashboard").authorization_bearer(&staff).await.json();
    assert_eq!(summary["company_name"], "acme Ltd");
    assert_eq!(summary["customer_term"], "Customers");
    assert_eq!(summary["unread_total"], 5);
    assert_eq!(summary["conversations_by_status"]["active"], 2);

    app.server
        .get("/api/hr/dashboard")
        .authorization_bearer(&staff)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let modules = json!({
        "crm": true, "inbox": true, "sales": true, "marketing": true, "hr": true, "voice_ai": false
    });
    app.server
        .patch("/api/tenant/settings")
        .authorization_bearer(&owner)
        .json(&json!({"modules": modules}))
        .await
        .assert_status_ok();

    let hr: Value = app.server.get("/api/hr/dashboard").authorization_bearer(&staff).await.json();
    assert_eq!(hr["headcount"], 2);
    assert_eq!(hr["by_role"]["admin"], 1);
    assert_eq!(hr["by_role"]["staff"], 1);
}

#[tokio::test]
async fn settings_reject_colors_the_wizard_would_reject() {
    let app = setup();
    app.seed_tenant("acme").await;
    app.seed_user("owner@acme.test", Role::Admin, Some("acme")).await;
    let owner = app.sign_in("owner@acme.test").await;

    let response = app
        .server
        .patch("/api/tenant/settings")
        .authorization_bearer(&owner)
        .json(&json!({"brand_color": "blue"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let config: Value = app
        .server
        .patch("/api/tenant/settings")
        .authorization_bearer(&owner)
        .json(&json!({"brand_color": "#0a84ff"}))
        .await
        .json();
    assert_eq!(config["brand_color"], "#0a84ff");
}
