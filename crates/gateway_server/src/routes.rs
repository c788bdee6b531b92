//! Rotas HTTP do gateway.
//!
//! Mesmas rotas e formatos JSON que o cliente web já consome. As chamadas à
//! serial rodam em `spawn_blocking` com limite de tempo por requisição.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use gateway_core::{Gateway, GatewayError, LinkError, parse_index};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

const SERIAL_NOT_INITIALIZED: &str = "Serial port not initialized";

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub request_timeout: Duration,
}

/// Rotas da API, sem arquivos estáticos.
pub fn api(state: AppState) -> Router {
    Router::new()
        .route("/sensors", get(sensors))
        .route("/control/:action", post(control))
        .route("/send-message", post(send_message))
        .route("/messages", get(messages))
        .route("/events", get(events))
        .route("/delete-event", delete(delete_event))
        .with_state(state)
}

/// API + build do cliente web servido em `/`.
pub fn app(state: AppState, static_dir: &str) -> Router {
    api(state)
        .fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
}

// ──────────────────────────────────────────────
// Erros
// ──────────────────────────────────────────────

/// Falha de uma rota que fala com o controlador.
enum ApiError {
    Gateway(GatewayError),
    Timeout,
    Task(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Gateway(GatewayError::Link(LinkError::Unavailable(_))) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                SERIAL_NOT_INITIALIZED.to_string(),
            ),
            ApiError::Gateway(GatewayError::Parse(e)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Invalid sensor data received: {}", e.raw()),
            ),
            ApiError::Gateway(GatewayError::InvalidMessage(reason)) => {
                (StatusCode::BAD_REQUEST, reason)
            }
            ApiError::Gateway(GatewayError::Link(e)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Serial communication failed: {e}"))
            }
            ApiError::Timeout => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error reading sensor data".to_string(),
            ),
            ApiError::Task(e) => {
                error!("Tarefa da serial abortou: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Roda uma operação bloqueante do gateway com o limite de tempo da
/// requisição. O read em andamento não é interrompido se o limite expirar.
async fn run_blocking<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Gateway) -> Result<T, GatewayError> + Send + 'static,
{
    let gateway = Arc::clone(&state.gateway);
    let task = tokio::task::spawn_blocking(move || op(&gateway));
    match tokio::time::timeout(state.request_timeout, task).await {
        Ok(Ok(result)) => result.map_err(|e| {
            warn!("{e}");
            ApiError::Gateway(e)
        }),
        Ok(Err(join)) => Err(ApiError::Task(join.to_string())),
        Err(_) => {
            warn!("Requisição à serial excedeu {:?}", state.request_timeout);
            Err(ApiError::Timeout)
        }
    }
}

fn status_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "status": "error", "message": message }))).into_response()
}

// ──────────────────────────────────────────────
// Handlers
// ──────────────────────────────────────────────

async fn sensors(State(state): State<AppState>) -> Result<Response, ApiError> {
    let reading = run_blocking(&state, |gateway| gateway.fetch_sensor_reading()).await?;
    Ok(Json(reading).into_response())
}

async fn control(
    Path(action): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    if !state.gateway.is_link_connected() {
        return Err(ApiError::Gateway(GatewayError::Link(LinkError::Unavailable(
            SERIAL_NOT_INITIALIZED.into(),
        ))));
    }

    let on = match action.as_str() {
        "on" => true,
        "off" => false,
        _ => {
            return Ok((
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid action" })),
            )
                .into_response());
        }
    };

    run_blocking(&state, move |gateway| gateway.set_actuator(on)).await?;
    Ok(Json(json!({ "status": "success", "action": action })).into_response())
}

#[derive(Debug, Deserialize)]
struct SendMessage {
    message: Option<String>,
}

async fn send_message(
    State(state): State<AppState>,
    Json(body): Json<SendMessage>,
) -> Result<Response, ApiError> {
    let Some(message) = body.message.filter(|m| !m.is_empty()) else {
        return Ok(status_error(StatusCode::BAD_REQUEST, "No message provided"));
    };

    let text = message.clone();
    match run_blocking(&state, move |gateway| gateway.post_operator_message(&text)).await {
        Ok(()) => Ok(Json(json!({ "status": "success", "message": message })).into_response()),
        Err(ApiError::Gateway(GatewayError::InvalidMessage(reason))) => {
            Ok(status_error(StatusCode::BAD_REQUEST, &reason))
        }
        Err(e) => Err(e),
    }
}

async fn messages(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "messages": state.gateway.list_messages() }))
}

async fn events(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "events": state.gateway.list_events() }))
}

#[derive(Debug, Deserialize)]
struct DeleteEventQuery {
    index: Option<String>,
}

async fn delete_event(
    State(state): State<AppState>,
    Query(query): Query<DeleteEventQuery>,
) -> Response {
    let deleted = query
        .index
        .as_deref()
        .ok_or(())
        .and_then(|raw| parse_index(raw).map_err(|_| ()))
        .and_then(|index| state.gateway.delete_event(index).map(|_| index).map_err(|_| ()));

    match deleted {
        Ok(index) => Json(json!({ "status": "success", "index": index })).into_response(),
        Err(()) => status_error(StatusCode::BAD_REQUEST, "Invalid event index"),
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request};
    use crate::notifier::BackgroundNotifier;
    use gateway_core::{AlertEvaluator, DeviceLink, LogNotifier, Notifier, NotifyError, Port};
    use std::collections::VecDeque;
    use std::io::{self, Read, Write};
    use std::sync::Mutex;
    use tower::ServiceExt;

    /// Porta que responde `R` com a próxima linha da fila.
    #[derive(Clone, Default)]
    struct QueuePort {
        replies: Arc<Mutex<VecDeque<u8>>>,
        script: Arc<Mutex<VecDeque<String>>>,
        written: Arc<Mutex<Vec<u8>>>,
    }

    impl Read for QueuePort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let mut replies = self.replies.lock().unwrap();
            match replies.pop_front() {
                Some(b) if !buf.is_empty() => {
                    buf[0] = b;
                    Ok(1)
                }
                _ => Err(io::Error::new(io::ErrorKind::TimedOut, "timeout")),
            }
        }
    }

    impl Write for QueuePort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.lock().unwrap().extend_from_slice(buf);
            if buf == b"R" {
                if let Some(line) = self.script.lock().unwrap().pop_front() {
                    self.replies.lock().unwrap().extend(line.into_bytes());
                }
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Port for QueuePort {}

    fn state_with(link: DeviceLink) -> AppState {
        let evaluator = AlertEvaluator::new(30.0, Box::new(LogNotifier));
        AppState {
            gateway: Arc::new(Gateway::new(link, evaluator, 10)),
            request_timeout: Duration::from_secs(2),
        }
    }

    /// Controlador que trava na leitura além do limite da requisição.
    struct StallingPort;

    impl Read for StallingPort {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            std::thread::sleep(Duration::from_millis(500));
            Err(io::Error::new(io::ErrorKind::TimedOut, "timeout"))
        }
    }

    impl Write for StallingPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Port for StallingPort {}

    /// Webhook lento.
    struct SlowNotifier;

    impl Notifier for SlowNotifier {
        fn notify(&self, _reason: &str) -> Result<(), NotifyError> {
            std::thread::sleep(Duration::from_millis(400));
            Ok(())
        }
    }

    fn connected(lines: &[&str]) -> (AppState, QueuePort) {
        let port = QueuePort::default();
        port.script
            .lock()
            .unwrap()
            .extend(lines.iter().map(|l| format!("{l}\n")));
        (state_with(DeviceLink::from_port("fake", port.clone())), port)
    }

    async fn call(
        state: &AppState,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = api(state.clone())
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn sensors_returns_reading_and_records_flood() {
        let (state, _) = connected(&["22.5,60.1,31.8"]);

        let (status, body) = call(&state, Method::GET, "/sensors", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["temperature"], 22.5);
        assert_eq!(body["humidity"], 60.1);
        assert_eq!(body["waterLevel"], 31.8);

        let (_, events) = call(&state, Method::GET, "/events", None).await;
        assert_eq!(events["events"][0]["event"], "Flood detected");
    }

    #[tokio::test]
    async fn slow_notification_does_not_fail_the_fetch() {
        let port = QueuePort::default();
        port.script.lock().unwrap().push_back("22.5,60.1,31.8\n".into());
        let notifier = BackgroundNotifier::spawn(Box::new(SlowNotifier)).unwrap();
        let evaluator = AlertEvaluator::new(30.0, Box::new(notifier));
        let link = DeviceLink::from_port("fake", port);
        let state = AppState {
            gateway: Arc::new(Gateway::new(link, evaluator, 10)),
            request_timeout: Duration::from_millis(100),
        };

        let (status, body) = call(&state, Method::GET, "/sensors", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["waterLevel"], 31.8);
        assert_eq!(state.gateway.list_events().len(), 1);
    }

    #[tokio::test]
    async fn stalled_serial_read_hits_request_timeout() {
        let mut state = state_with(DeviceLink::from_port("fake", StallingPort));
        state.request_timeout = Duration::from_millis(100);

        let (status, body) = call(&state, Method::GET, "/sensors", None).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Error reading sensor data");
        assert!(state.gateway.list_events().is_empty());
        assert!(state.gateway.list_messages().is_empty());
    }

    #[tokio::test]
    async fn sensors_reports_invalid_data() {
        let (state, _) = connected(&["abc,60.1,31.8"]);
        let (status, body) = call(&state, Method::GET, "/sensors", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Invalid sensor data received: abc,60.1,31.8");
    }

    #[tokio::test]
    async fn disconnected_link_is_reported() {
        let state = state_with(DeviceLink::disconnected("COM3 ausente"));
        let (status, body) = call(&state, Method::GET, "/sensors", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], SERIAL_NOT_INITIALIZED);

        let (status, _) = call(&state, Method::POST, "/control/on", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn control_maps_actions_to_commands() {
        let (state, port) = connected(&[]);

        let (status, body) = call(&state, Method::POST, "/control/on", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "success", "action": "on" }));

        call(&state, Method::POST, "/control/off", None).await;
        let (status, body) = call(&state, Method::POST, "/control/toggle", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid action");

        assert_eq!(port.written.lock().unwrap().as_slice(), b"AS");
    }

    #[tokio::test]
    async fn send_message_mirrors_and_lists() {
        let (state, port) = connected(&[]);

        let (status, body) = call(
            &state,
            Method::POST,
            "/send-message",
            Some(json!({ "message": "Oi" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "success", "message": "Oi" }));
        assert_eq!(port.written.lock().unwrap().as_slice(), b"UOi\n");

        let (_, body) = call(&state, Method::GET, "/messages", None).await;
        assert_eq!(body, json!({ "messages": ["Oi"] }));

        let (status, body) = call(&state, Method::POST, "/send-message", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "No message provided");
    }

    #[tokio::test]
    async fn delete_event_validates_index() {
        let (state, _) = connected(&["20,50,35", "20,50,36"]);
        call(&state, Method::GET, "/sensors", None).await;
        call(&state, Method::GET, "/sensors", None).await;

        let invalid = [
            "/delete-event",
            "/delete-event?index=-1",
            "/delete-event?index=x",
            "/delete-event?index=2",
        ];
        for bad in invalid {
            let (status, body) = call(&state, Method::DELETE, bad, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{bad}");
            assert_eq!(body["message"], "Invalid event index");
        }

        let (status, body) = call(&state, Method::DELETE, "/delete-event?index=0", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["index"], 0);

        let (_, body) = call(&state, Method::GET, "/events", None).await;
        assert_eq!(body["events"].as_array().unwrap().len(), 1);
    }
}
