//! In-process stand-in for the remote `/v1/mass` service.

use std::sync::Arc;
use std::time::Duration;

use axum::body::to_bytes;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::Router;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

type Responder = dyn Fn(&RecordedRequest, usize) -> (StatusCode, String) + Send + Sync;

pub struct MockRemote {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: JoinHandle<()>,
}

impl MockRemote {
    /// Server answering 201 to everything.
    pub async fn accepting() -> Self {
        Self::start(|_, _| (StatusCode::CREATED, String::new())).await
    }

    /// `respond` receives each request and its zero-based arrival index.
    pub async fn start<F>(respond: F) -> Self
    where
        F: Fn(&RecordedRequest, usize) -> (StatusCode, String) + Send + Sync + 'static,
    {
        Self::start_with_delay(Duration::ZERO, respond).await
    }

    /// Like [`MockRemote::start`], holding every response for `delay`.
    pub async fn start_with_delay<F>(delay: Duration, respond: F) -> Self
    where
        F: Fn(&RecordedRequest, usize) -> (StatusCode, String) + Send + Sync + 'static,
    {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let responder: Arc<Responder> = Arc::new(respond);

        let recorded = Arc::clone(&requests);
        let router = Router::new().fallback(move |request: Request| {
            let recorded = Arc::clone(&recorded);
            let responder = Arc::clone(&responder);
            async move {
                let (parts, body) = request.into_parts();
                let bytes = to_bytes(body, usize::MAX).await.unwrap_or_default();
                let request = RecordedRequest {
                    method: parts.method.to_string(),
                    path: parts.uri.path().to_string(),
                    authorization: parts
                        .headers
                        .get("authorization")
                        .and_then(|value| value.to_str().ok())
                        .map(str::to_string),
                    body: serde_json::from_slice(&bytes).ok(),
                };

                let index = {
                    let mut recorded = recorded.lock().await;
                    recorded.push(request.clone());
                    recorded.len() - 1
                };
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                responder(&request, index)
            }
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
            handle,
        }
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().await.clone()
    }
}

impl Drop for MockRemote {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
