// REST surface against in-memory backends.
mod common;

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode, header},
    };
    use common_api::{
        adapters::{AppState, router},
        core::{
            Backend, Service, ServiceOptions,
            models::{Asset, Entity, Project, VideocheckConfig},
        },
        utils::GracefulShutdown,
    };
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt; // for oneshot

    use super::common::{MemoryStore, RecordingSink, connectors};

    const TOKEN: &str = "s3cret";

    fn asset(id: i64) -> Asset {
        Asset {
            id,
            name: format!("controller-{id}"),
            service_desk_parent_id: 1,
            changed: "2024-01-01T00:00:00Z".into(),
            service_desk_id: 100 + id,
        }
    }

    fn project(id: i64, db_type: i32) -> Project {
        Project {
            id,
            name: format!("project-{id}"),
            type_id: 1,
            type_name: "retail".into(),
            parent_id: 0,
            manager_id: 1,
            manager_name: "Ann".into(),
            is_enabled: true,
            ip: "10.0.0.1".into(),
            port: 1433,
            db_name: "CM".into(),
            login: "sa".into(),
            password: "pw".into(),
            db_type,
        }
    }

    fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore {
            assets: (1..=3).map(asset).collect(),
            projects: vec![project(42, 10)],
            entities: vec![Entity {
                id: "E1".into(),
                description: "entity one".into(),
            }],
            ..Default::default()
        })
    }

    struct App {
        router: Router,
        store: Arc<MemoryStore>,
        _shutdown: GracefulShutdown,
    }

    async fn app(down: &[Backend]) -> App {
        let store = store();
        let shutdown = GracefulShutdown::new();
        let service = Service::start(
            connectors(store.clone(), down),
            Arc::new(RecordingSink::default()),
            ServiceOptions::default(),
            &shutdown,
        )
        .await;
        let state = AppState::new(Arc::new(service)).with_token(Some(TOKEN));
        App {
            router: router(state),
            store,
            _shutdown: shutdown,
        }
    }

    async fn send(app: &App, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
        let response = app.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, headers, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
            .body(Body::empty())
            .unwrap()
    }

    fn with_json(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_assets_list_and_paging() {
        let app = app(&[]).await;
        let (status, headers, body) = send(&app, get("/v2/assets?offset=1&limit=1")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers.contains_key("x-request-id"));
        assert_eq!(body["data"][0]["id"], 2);
        assert_eq!(
            body["resultset"],
            json!({"count": 1, "offset": 1, "limit": 1, "total": 3})
        );

        let (status, _, body) = send(&app, get("/v2/assets?offset=-5&limit=abc")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["resultset"]["offset"], 0);
        assert_eq!(body["resultset"]["limit"], 10);
    }

    #[tokio::test]
    async fn test_secured_route_requires_token() {
        let app = app(&[]).await;
        let request = Request::builder()
            .uri("/v2/assets")
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], 400);

        let request = Request::builder()
            .uri("/v2/assets")
            .header(header::AUTHORIZATION, "Bearer wrong")
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_public_routes_need_no_token() {
        let app = app(&[]).await;
        let request = Request::builder()
            .uri("/v2/entities/E1")
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["description"], "entity one");
    }

    #[tokio::test]
    async fn test_not_ready_backend_answers_503() {
        let app = app(&[Backend::Assets]).await;
        let (status, _, body) = send(&app, get("/v2/assets")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], 503);
        assert!(
            body["error"]["message"]
                .as_str()
                .unwrap()
                .contains("temporarily unavailable")
        );

        // Other backends keep serving.
        let (status, _, _) = send(&app, get("/v2/projects")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_empty_list_is_404_except_projects() {
        let app = app(&[]).await;
        let (status, _, body) = send(&app, get("/v2/videochecks/configs")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["message"], "videocheck configs not found");

        let (status, _, body) = send(&app, get("/v2/projects?active=false")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!([]));
        assert_eq!(body["resultset"]["total"], 0);
    }

    #[tokio::test]
    async fn test_project_key_with_db_type() {
        let app = app(&[]).await;
        let (status, _, body) = send(&app, get("/v2/projects/42:10")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["db_type"], 10);

        let (status, _, _) = send(&app, get("/v2/projects/42%3A10")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _, _) = send(&app, get("/v2/projects/42:3")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, body) = send(&app, get("/v2/projects/42:7")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"]["message"],
            "dbType wrong format, allow only 1,2,3,4,10"
        );
    }

    #[tokio::test]
    async fn test_videocheck_lifecycle() {
        let app = app(&[]).await;

        let (status, _, _) = send(
            &app,
            with_json("POST", "/v2/videochecks/configs", json!({"localCam": true})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, headers, body) = send(
            &app,
            with_json(
                "POST",
                "/v2/videochecks/configs",
                json!({"projectId": 7, "localCam": true, "options": "{}"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(headers[header::LOCATION], "/v2/videochecks/configs/7");
        assert_eq!(body["code"], 201);

        let (status, headers, _) = send(
            &app,
            with_json(
                "PUT",
                "/v2/videochecks/configs/7",
                json!({"projectId": 999, "localServer": true}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::LOCATION], "/v2/videochecks/configs/7");
        let stored = app.store.videochecks.lock().unwrap().clone();
        assert_eq!(
            stored,
            vec![VideocheckConfig {
                project_id: 7,
                local_server: true,
                ..Default::default()
            }]
        );

        let public = Request::builder()
            .uri("/v2/videochecks/configs/7")
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(&app, public).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["localServer"], true);

        let delete = Request::builder()
            .method("DELETE")
            .uri("/v2/videochecks/configs/7")
            .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(&app, delete).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "delete 1 records");

        let delete_again = Request::builder()
            .method("DELETE")
            .uri("/v2/videochecks/configs/7")
            .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = send(&app, delete_again).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_json_is_400() {
        let app = app(&[]).await;
        let request = Request::builder()
            .method("PUT")
            .uri("/v2/tasks/15/comment")
            .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], 400);
    }

    #[tokio::test]
    async fn test_task_comment_reaches_service_desk() {
        let app = app(&[]).await;
        let (status, _, body) = send(
            &app,
            with_json("PUT", "/v2/tasks/15/comment", json!({"comment": "checked"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "success");
        assert_eq!(
            app.store.comments.lock().unwrap().clone(),
            vec![("15".to_string(), "checked".to_string())]
        );
    }

    #[tokio::test]
    async fn test_health_reflects_readiness() {
        let app = app(&[]).await;
        let (status, _, body) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["healthy"], true);

        let degraded = self::app(&[Backend::ServiceDesk]).await;
        let (status, _, body) = send(&degraded, get("/health")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(
            body["last_error"]
                .as_str()
                .unwrap()
                .contains("service_desk_api")
        );
    }
}
