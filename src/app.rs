use std::net::SocketAddr;
use std::path::Path;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware, Router,
};
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::rate_limit::limit_general;
use crate::state::AppState;
use crate::{auth, contact, health};

const BODY_LIMIT: usize = 10 * 1024 * 1024;

pub fn build_app(state: AppState) -> Router {
    let api = Router::new()
        .merge(auth::router())
        .merge(contact::router())
        .merge(health::health_routes())
        .layer(middleware::from_fn_with_state(state.clone(), limit_general));

    let static_dir = Path::new(&state.config.static_dir);
    let spa = ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html")));

    Router::new()
        .nest("/api", api)
        .fallback_service(spa)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors_layer(state.config.frontend_url.as_deref()))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

fn cors_layer(frontend_url: Option<&str>) -> CorsLayer {
    let Some(url) = frontend_url else {
        return CorsLayer::permissive();
    };
    match HeaderValue::from_str(url) {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        Err(e) => {
            tracing::warn!(error = %e, url, "FRONTEND_URL is not a valid origin; using permissive CORS");
            CorsLayer::permissive()
        }
    }
}

pub async fn serve(app: Router, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("SIGINT received, shutting down"),
        _ = terminate => tracing::info!("SIGTERM received, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_config, test_state};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
        let res = app.clone().oneshot(req).await.expect("infallible");
        let status = res.status();
        let headers = res.headers().clone();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, headers, body)
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_with_token(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut req = Request::get(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        req.body(Body::empty()).unwrap()
    }

    fn app() -> Router {
        build_app(test_state(test_config()).0)
    }

    #[tokio::test]
    async fn signup_verify_conflict_and_login_scenarios() {
        let app = app();

        let (status, _, body) = send(
            &app,
            post("/api/auth/signup", json!({"email": "a@x.com", "password": "secret1", "name": "Ann"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let token = body["token"].as_str().expect("token").to_owned();
        assert!(body["user"].get("password_hash").is_none());

        let (status, _, body) = send(&app, get_with_token("/api/auth/verify", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["email"], "a@x.com");
        assert_eq!(body["user"]["name"], "Ann");
        assert!(body["user"]["id"].is_i64());

        let (status, _, _) = send(
            &app,
            post("/api/auth/signup", json!({"email": "a@x.com", "password": "other2", "name": "Bob"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _, body) = send(
            &app,
            post("/api/auth/login", json!({"email": "a@x.com", "password": "wrong"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid credentials");

        let (status, _, body) = send(
            &app,
            post("/api/auth/login", json!({"email": "a@x.com", "password": "secret1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["name"], "Ann");
    }

    #[tokio::test]
    async fn signup_validation_is_bad_request() {
        let (status, _, body) = send(
            &app(),
            post("/api/auth/signup", json!({"email": "a@x.com", "password": "123", "name": "Ann"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["field"], "password");
    }

    #[tokio::test]
    async fn mistyped_or_malformed_bodies_are_validation_errors() {
        let app = app();

        let (status, headers, body) = send(
            &app,
            post("/api/auth/signup", json!({"email": 5, "password": "secret1", "name": "Ann"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(body["message"], "Invalid request body");

        let (status, _, body) = send(&app, post("/api/contact", json!({"message": 42}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());

        let req = Request::post("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"email\": "))
            .unwrap();
        let (status, _, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Malformed JSON body");

        let req = Request::post("/api/auth/login")
            .body(Body::from(json!({"email": "a@x.com", "password": "x"}).to_string()))
            .unwrap();
        let (status, _, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Expected a JSON request body");
    }

    #[tokio::test]
    async fn verify_distinguishes_missing_invalid_and_gone() {
        let (state, store) = test_state(test_config());
        let app = build_app(state.clone());

        let (status, _, _) = send(&app, get_with_token("/api/auth/verify", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _, body) = send(&app, get_with_token("/api/auth/verify", Some("abc.def.ghi"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Invalid or expired token");

        let (_, _, body) = send(
            &app,
            post("/api/auth/signup", json!({"email": "g@x.com", "password": "secret1", "name": "Gone"})),
        )
        .await;
        let token = body["token"].as_str().expect("token").to_owned();
        let id = body["user"]["id"].as_i64().expect("id");
        store.remove_user(id);

        let (status, _, _) = send(&app, get_with_token("/api/auth/verify", Some(&token))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn logout_requires_token_and_acknowledges() {
        let app = app();
        let (status, _, _) = send(
            &app,
            Request::post("/api/auth/logout").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (_, _, body) = send(
            &app,
            post("/api/auth/signup", json!({"email": "a@x.com", "password": "secret1", "name": "Ann"})),
        )
        .await;
        let token = body["token"].as_str().expect("token").to_owned();

        let req = Request::post("/api/auth/logout")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Logout successful");

        // Stateless tokens stay valid until they expire.
        let (status, _, _) = send(&app, get_with_token("/api/auth/verify", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn contact_submit_and_list() {
        let app = app();

        let (status, _, body) = send(
            &app,
            post("/api/contact", json!({"name": "Al", "email": "al@x.com", "message": "short"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["field"], "message");

        let (status, _, body) = send(
            &app,
            post(
                "/api/contact",
                json!({"name": "Al", "email": "al@x.com", "message": "this message is long enough"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["id"].is_i64());
        assert!(body["created_at"].is_string());

        let (status, _, body) = send(&app, get_with_token("/api/contact", None)).await;
        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().expect("array");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["message"], "this message is long enough");
    }

    #[tokio::test]
    async fn contact_list_can_require_auth() {
        let mut config = test_config();
        config.contact_list_requires_auth = true;
        let (state, _) = test_state(config);
        let token = state.jwt.sign(1, "a@x.com").expect("sign");
        let app = build_app(state);

        let (status, _, _) = send(&app, get_with_token("/api/contact", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _, _) = send(&app, get_with_token("/api/contact", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn auth_routes_are_rate_limited_per_caller() {
        let mut config = test_config();
        config.rate_limit.auth = 2;
        let app = build_app(test_state(config).0);

        let login = |ip: &str| {
            let peer: SocketAddr = format!("{ip}:40000").parse().expect("addr");
            Request::post("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .extension(axum::extract::ConnectInfo(peer))
                .body(Body::from(json!({"email": "a@x.com", "password": "secret1"}).to_string()))
                .unwrap()
        };

        for _ in 0..2 {
            let (status, _, _) = send(&app, login("198.51.100.1")).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }
        let (status, headers, _) = send(&app, login("198.51.100.1")).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(headers.contains_key(header::RETRY_AFTER));

        let (status, _, _) = send(&app, login("198.51.100.2")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn health_reports_database_state() {
        let (state, store) = test_state(test_config());
        let app = build_app(state);

        let (status, _, body) = send(&app, get_with_token("/api/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "OK");
        assert!(body["dbTime"].is_string());

        let (status, _, body) = send(&app, get_with_token("/api/health/db", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["userCount"], 0);

        store.go_offline();
        let (status, _, body) = send(&app, get_with_token("/api/health", None)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "ERROR");
        assert_eq!(body["database"], "Disconnected");
    }

    #[tokio::test]
    async fn store_failures_surface_as_generic_500() {
        let (state, store) = test_state(test_config());
        let app = build_app(state);
        store.go_offline();

        let (status, _, body) = send(&app, get_with_token("/api/contact", None)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
    }

    #[tokio::test]
    async fn responses_carry_security_headers() {
        let (_, headers, _) = send(&app(), get_with_token("/api/health", None)).await;
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
    }
}
