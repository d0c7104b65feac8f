use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use preview_core::SessionEvent;
use preview_proto::protocol::{Command, SessionView};
use preview_proto::state::ViewStore;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info};

#[derive(Clone)]
struct HttpState {
    view: Arc<ViewStore>,
    event_tx: mpsc::Sender<SessionEvent>,
}

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

#[derive(Deserialize)]
struct ActivateBody {
    title: String,
}

pub fn router(view: Arc<ViewStore>, event_tx: mpsc::Sender<SessionEvent>) -> Router {
    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/search", post(search))
        .route("/api/activate", post(activate))
        .route("/api/toggle", post(toggle))
        .route("/api/seek/:ms", post(seek))
        .with_state(HttpState { view, event_tx })
}

pub fn start_server(
    bind_address: String,
    port: u16,
    view: Arc<ViewStore>,
    event_tx: mpsc::Sender<SessionEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = router(view, event_tx);

        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("HTTP API server listening on http://{}", addr);

        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    })
}

async fn forward(state: &HttpState, cmd: Command) -> StatusCode {
    info!("HTTP API: {:?}", cmd);
    if state.event_tx.send(SessionEvent::Command(cmd)).await.is_err() {
        error!("HTTP API: session is gone");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::ACCEPTED
}

async fn get_state(State(state): State<HttpState>) -> Json<SessionView> {
    Json(state.view.get_state().await)
}

async fn search(State(state): State<HttpState>, Query(params): Query<SearchParams>) -> StatusCode {
    forward(&state, Command::Search { query: params.q }).await
}

async fn activate(State(state): State<HttpState>, Json(body): Json<ActivateBody>) -> StatusCode {
    forward(&state, Command::Activate { title: body.title }).await
}

async fn toggle(State(state): State<HttpState>) -> StatusCode {
    forward(&state, Command::ToggleTransport).await
}

async fn seek(State(state): State<HttpState>, Path(ms): Path<u64>) -> StatusCode {
    forward(&state, Command::Seek { position_ms: ms }).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use tower::ServiceExt;

    fn setup() -> (Router, mpsc::Receiver<SessionEvent>) {
        let view = Arc::new(ViewStore::new());
        let (tx, rx) = mpsc::channel(8);
        (router(view, tx), rx)
    }

    async fn next_command(rx: &mut mpsc::Receiver<SessionEvent>) -> Command {
        match rx.recv().await {
            Some(SessionEvent::Command(cmd)) => cmd,
            other => panic!("expected a command, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_state_returns_view() {
        let (app, _rx) = setup();
        let resp = app
            .oneshot(Request::get("/api/state").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let view: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(view["transport"], "Play");
        assert_eq!(view["busy"], false);
    }

    #[tokio::test]
    async fn test_search_forwards_query() {
        let (app, mut rx) = setup();
        let resp = app
            .oneshot(
                Request::post("/api/search?q=Daft%20Punk")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(
            next_command(&mut rx).await,
            Command::Search {
                query: "Daft Punk".into()
            }
        );
    }

    #[tokio::test]
    async fn test_activate_takes_json_title() {
        let (app, mut rx) = setup();
        let resp = app
            .oneshot(
                Request::post("/api/activate")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"title":"Digital Love"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(
            next_command(&mut rx).await,
            Command::Activate {
                title: "Digital Love".into()
            }
        );
    }

    #[tokio::test]
    async fn test_seek_and_toggle() {
        let (app, mut rx) = setup();
        let resp = app
            .clone()
            .oneshot(Request::post("/api/seek/12000").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(
            next_command(&mut rx).await,
            Command::Seek { position_ms: 12_000 }
        );

        app.oneshot(Request::post("/api/toggle").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(next_command(&mut rx).await, Command::ToggleTransport);
    }

    #[tokio::test]
    async fn test_closed_session_is_unavailable() {
        let (app, rx) = setup();
        drop(rx);
        let resp = app
            .oneshot(Request::post("/api/toggle").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
