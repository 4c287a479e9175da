//! Hosted backend over HTTP: PostgREST-style tables under `/rest/v1` and the
//! auth API under `/auth/v1`.

use crate::domain::user::UserError;
use crate::store::{as_text, Filter, FilterOp, SelectQuery, Table};
use crate::{AuthIdentity, AuthProvider, CoreError, TableStore};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct RestBackend {
    base_url: String,
    api_key: String,
    client: Client,
}

impl RestBackend {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, CoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, CoreError> {
        let response = builder.send().await.map_err(CoreError::infra)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::CONFLICT => CoreError::AlreadyExists(message),
            StatusCode::NOT_FOUND => CoreError::NotFound(message),
            _ => CoreError::Backend {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn rows(response: Response) -> Result<Vec<Value>, CoreError> {
        match response.json::<Value>().await.map_err(CoreError::infra)? {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            single => Ok(vec![single]),
        }
    }
}

/// PostgREST query parameters for `filters`.
fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|f| {
            let expr = match &f.op {
                FilterOp::Eq(Value::Null) => "is.null".to_string(),
                FilterOp::Eq(value) => format!("eq.{}", as_text(value).unwrap_or_default()),
                FilterOp::Search(term) => format!("ilike.*{}*", term),
            };
            (f.column.clone(), expr)
        })
        .collect()
}

#[async_trait]
impl TableStore for RestBackend {
    async fn select(&self, table: Table, query: &SelectQuery) -> Result<Vec<Value>, CoreError> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(filter_params(&query.filters));
        if let Some(order) = &query.order {
            let direction = if order.descending { "desc" } else { "asc" };
            params.push(("order".to_string(), format!("{}.{}", order.column, direction)));
        }
        if let Some(limit) = query.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        debug!(%table, "GET rows");
        let response = self
            .send(self.authed(self.client.get(self.table_url(table))).query(&params))
            .await?;
        Self::rows(response).await
    }

    async fn insert(&self, table: Table, row: Value) -> Result<Value, CoreError> {
        debug!(%table, "POST row");
        let response = self
            .send(
                self.authed(self.client.post(self.table_url(table)))
                    .header("Prefer", "return=representation")
                    .json(&row),
            )
            .await?;
        Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::Backend {
                status: 200,
                message: format!("Insert into {} returned no row", table),
            })
    }

    async fn update(&self, table: Table, filters: &[Filter], patch: Value) -> Result<Vec<Value>, CoreError> {
        debug!(%table, "PATCH rows");
        let response = self
            .send(
                self.authed(self.client.patch(self.table_url(table)))
                    .query(&filter_params(filters))
                    .header("Prefer", "return=representation")
                    .json(&patch),
            )
            .await?;
        Self::rows(response).await
    }
}

fn identity_from(body: &Value) -> Result<AuthIdentity, CoreError> {
    let user = body.get("user").filter(|u| u.is_object()).unwrap_or(body);
    serde_json::from_value(json!({
        "id": user.get("id").cloned().unwrap_or(Value::Null),
        "email": user.get("email").cloned().unwrap_or(Value::Null),
    }))
    .map_err(|e| CoreError::Deserialization(format!("Unexpected auth response: {}", e)))
}

#[async_trait]
impl AuthProvider for RestBackend {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthIdentity, CoreError> {
        let url = format!("{}/auth/v1/signup", self.base_url);
        let result = self
            .send(
                self.authed(self.client.post(url))
                    .json(&json!({"email": email, "password": password})),
            )
            .await;
        let response = match result {
            Ok(response) => response,
            Err(CoreError::Backend { status: 400 | 422, message })
                if message.to_lowercase().contains("already") =>
            {
                return Err(UserError::AlreadyExists(email.to_string()).into());
            }
            Err(e) => return Err(e),
        };
        let body: Value = response.json().await.map_err(CoreError::infra)?;
        identity_from(&body)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthIdentity, CoreError> {
        let url = format!("{}/auth/v1/token", self.base_url);
        let result = self
            .send(
                self.authed(self.client.post(url))
                    .query(&[("grant_type", "password")])
                    .json(&json!({"email": email, "password": password})),
            )
            .await;
        let response = match result {
            Ok(response) => response,
            Err(CoreError::Backend { status: 400 | 401, .. }) => {
                return Err(UserError::InvalidCredentials.into());
            }
            Err(e) => return Err(e),
        };
        let body: Value = response.json().await.map_err(CoreError::infra)?;
        identity_from(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query, State};
    use axum::http::HeaderMap;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Seen = Arc<Mutex<Vec<(String, Vec<(String, String)>)>>>;

    async fn spawn_backend() -> (String, Seen) {
        let seen: Seen = Arc::default();
        let app = Router::new()
            .route(
                "/rest/v1/{table}",
                get(
                    |State(seen): State<Seen>,
                     Path(table): Path<String>,
                     headers: HeaderMap,
                     Query(params): Query<Vec<(String, String)>>| async move {
                        assert_eq!(headers.get("apikey").unwrap(), "anon-key");
                        seen.lock().unwrap().push((table, params));
                        Json(json!([{"id": "1", "tenant_id": "acme"}]))
                    },
                )
                .post(|Json(row): Json<Value>| async move { Json(json!([row])) })
                .patch(|| async { Json(json!([])) }),
            )
            .route(
                "/auth/v1/token",
                post(|Query(q): Query<HashMap<String, String>>, Json(body): Json<Value>| async move {
                    assert_eq!(q.get("grant_type").map(String::as_str), Some("password"));
                    if body["password"] == "s3cretpass" {
                        Ok(Json(json!({
                            "access_token": "jwt",
                            "user": {"id": "7d0b4a55-6f5e-4a43-9f55-0b3c2a3f4a10", "email": body["email"]}
                        })))
                    } else {
                        Err((axum::http::StatusCode::BAD_REQUEST, "invalid_grant"))
                    }
                }),
            )
            .with_state(seen.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), seen)
    }

    fn backend(url: &str) -> RestBackend {
        RestBackend::new(url, "anon-key", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn select_sends_postgrest_filters() {
        let (url, seen) = spawn_backend().await;
        let rows = backend(&url)
            .select(
                Table::Conversations,
                &SelectQuery::new()
                    .eq("tenant_id", "acme")
                    .search("contact_name", "mar")
                    .order_desc("updated_at")
                    .limit(5),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);

        let calls = seen.lock().unwrap().clone();
        let (table, params) = &calls[0];
        assert_eq!(table, "conversations");
        let params: HashMap<_, _> = params.iter().cloned().collect();
        assert_eq!(params["tenant_id"], "eq.acme");
        assert_eq!(params["contact_name"], "ilike.*mar*");
        assert_eq!(params["order"], "updated_at.desc");
        assert_eq!(params["limit"], "5");
    }

    #[tokio::test]
    async fn insert_returns_representation() {
        let (url, _) = spawn_backend().await;
        let row = backend(&url)
            .insert(Table::Deals, json!({"id": "d1", "tenant_id": "acme"}))
            .await
            .unwrap();
        assert_eq!(row["id"], "d1");
    }

    #[tokio::test]
    async fn sign_in_maps_bad_credentials() {
        let (url, _) = spawn_backend().await;
        let backend = backend(&url);
        let identity = backend.sign_in("a@b.co", "s3cretpass").await.unwrap();
        assert_eq!(identity.email, "a@b.co");

        let err = backend.sign_in("a@b.co", "wrong").await.unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn unreachable_backend_is_infrastructure_error() {
        let err = backend("http://127.0.0.1:9")
            .select(Table::Deals, &SelectQuery::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Infrastructure(_)));
    }
}
