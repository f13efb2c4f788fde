/*!
server.rs - HTTP surface.

Every method and path lands in a single fallback handler so the request
decoder owns routing:

  HEAD *                 -> 404
  GET  /base64/<token>   -> run tool, 200 application/octet-stream
  GET  /cmd/<command>    -> run tool, 200 application/octet-stream
  anything else          -> 404

A 404 always carries `Connection: close` and an empty body. hyper gives each
connection its own task, so a tool that hangs only stalls its own client.
*/

use axum::{
    Router,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::net::TcpListener;
use tracing::{Instrument, debug, error, info, warn};

use super::runner::{self, RunError};
use super::tools::{self, ToolFamily};
use super::{ProxyError, request};
use crate::resolver::Resolver;
use crate::utils::request_id;

pub const SERVER_NAME: &str = "LiveProxy";

/// Shared, read-mostly state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<Resolver>,
    pub families: Arc<[ToolFamily]>,
    pub timeout: Option<Duration>,
}

impl AppState {
    pub fn new(families: Vec<ToolFamily>, timeout: Option<Duration>) -> Self {
        Self {
            resolver: Arc::new(Resolver::new()),
            families: families.into(),
            timeout,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new().fallback(handle).with_state(state)
}

/// Serve until `shutdown` resolves. The listener closes first; requests
/// already in flight run to completion.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}

async fn handle(
    State(state): State<AppState>,
    ConnectInfo(client): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if method != Method::GET {
        return not_found();
    }

    let span = tracing::info_span!("request", id = %request_id(SystemTime::now()));
    async move {
        let agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("???");
        info!("User-Agent: {agent}");
        info!("Client: {client}");

        let target = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| uri.path());

        match proxy(&state, target).await {
            Ok(body) => stream_ok(body),
            Err(err) => {
                match &err {
                    ProxyError::Decode(request::DecodeError::UnknownRoute(_)) => {
                        debug!("{err}")
                    }
                    ProxyError::Run(RunError::TimedOut { .. }) => warn!("{err}"),
                    _ => error!("{err}"),
                }
                not_found()
            }
        }
    }
    .instrument(span)
    .await
}

/// Decode, resolve, classify, run. Returns the tool's stdout verbatim.
async fn proxy(state: &AppState, target: &str) -> Result<Vec<u8>, ProxyError> {
    let mut list = request::parse_target(target)?;

    let program = state
        .resolver
        .resolve(list.program())
        .ok_or_else(|| ProxyError::ProgramNotFound(list.program().to_string()))?;
    debug!(cached = state.resolver.len(), "Video-Software: {}", program.display());

    let family = tools::classify(&state.families, &program)
        .ok_or_else(|| ProxyError::UnknownTool(program.clone()))?;
    list.args.extend(family.args.iter().cloned());
    debug!(family = %family.name, encoding = ?list.encoding, "arglist: {:?}", list.args);

    let captured = runner::run(&program, list.rest(), state.timeout).await?;
    if !captured.status.success() {
        // Reported, but whatever reached stdout is still served.
        warn!(
            status = %captured.status,
            bytes = captured.stdout.len(),
            "tool exited unsuccessfully"
        );
    }
    Ok(captured.stdout)
}

fn stream_ok(body: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::SERVER, SERVER_NAME),
            (header::CONTENT_TYPE, "application/octet-stream"),
        ],
        body,
    )
        .into_response()
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        [
            (header::SERVER, SERVER_NAME),
            (header::CONTENT_TYPE, "text/html"),
            (header::CONNECTION, "close"),
        ],
    )
        .into_response()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::proxy::request::{encode_base64, encode_cmd};
    use crate::proxy::tools::builtin_families;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tokio::sync::oneshot;
    use tokio::task::JoinHandle;

    struct TestServer {
        addr: SocketAddr,
        state: AppState,
        stop: Option<oneshot::Sender<()>>,
        task: JoinHandle<std::io::Result<()>>,
    }

    impl TestServer {
        async fn start(timeout: Option<Duration>) -> Self {
            let state = AppState::new(builtin_families().unwrap(), timeout);
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let (tx, rx) = oneshot::channel::<()>();
            let task = tokio::spawn(serve(listener, state.clone(), async move {
                let _ = rx.await;
            }));
            Self {
                addr,
                state,
                stop: Some(tx),
                task,
            }
        }

        fn url(&self, path: &str) -> String {
            format!("http://{}{}", self.addr, path)
        }

        async fn shutdown(mut self) {
            if let Some(tx) = self.stop.take() {
                let _ = tx.send(());
            }
            self.task.await.unwrap().unwrap();
        }
    }

    /// Write an executable shell script named `name` into `dir`.
    fn fake_tool(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_str().unwrap().to_string()
    }

    fn assert_not_found(resp: &reqwest::Response) {
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
        assert_eq!(resp.headers()["content-type"], "text/html");
        assert_eq!(resp.headers()["server"], SERVER_NAME);
        assert_eq!(resp.headers()["connection"], "close");
    }

    #[tokio::test]
    async fn head_is_always_404() {
        let server = TestServer::start(None).await;
        let client = reqwest::Client::new();
        for path in ["/", "/cmd/yt-dlp%20x", "/base64/eXQtZGxwIHg="] {
            let resp = client.head(server.url(path)).send().await.unwrap();
            assert_not_found(&resp);
            assert!(resp.bytes().await.unwrap().is_empty());
        }
        server.shutdown().await;
    }

    #[tokio::test]
    async fn other_methods_and_paths_are_404() {
        let server = TestServer::start(None).await;
        let client = reqwest::Client::new();

        let resp = client.get(server.url("/index.html")).send().await.unwrap();
        assert_not_found(&resp);
        assert!(resp.bytes().await.unwrap().is_empty());

        let resp = client.post(server.url("/cmd/yt-dlp%20x")).send().await.unwrap();
        assert_not_found(&resp);
        server.shutdown().await;
    }

    #[tokio::test]
    async fn malformed_base64_is_404() {
        let server = TestServer::start(None).await;
        let resp = reqwest::get(server.url("/base64/@@@invalid/")).await.unwrap();
        assert_not_found(&resp);
        assert!(server.state.resolver.is_empty(), "nothing resolved");
        server.shutdown().await;
    }

    #[tokio::test]
    async fn unrecognized_tool_is_404() {
        let server = TestServer::start(None).await;
        let resp = reqwest::get(server.url("/cmd/echo%20hello/")).await.unwrap();
        assert_not_found(&resp);
        assert!(
            matches!(server.state.resolver.cached("echo"), Some(Some(_))),
            "echo exists; it is only the family that is unknown"
        );
        server.shutdown().await;
    }

    #[tokio::test]
    async fn missing_program_is_404_and_cached() {
        let server = TestServer::start(None).await;
        let name = "liveproxy-missing-streamlink";
        let resp = reqwest::get(server.url(&encode_base64(&format!("{name} https://x.test"))))
            .await
            .unwrap();
        assert_not_found(&resp);
        assert_eq!(server.state.resolver.cached(name), Some(None));
        server.shutdown().await;
    }

    #[tokio::test]
    async fn streamlink_output_is_relayed_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let tool = fake_tool(
            dir.path(),
            "streamlink",
            r#"printf '\377\000\001'; printf '%s\n' "$@""#,
        );

        let server = TestServer::start(None).await;
        let resp = reqwest::get(server.url(&encode_cmd(&format!(
            "{tool} 'https://example.com/live now' best"
        ))))
        .await
        .unwrap();

        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(resp.headers()["content-type"], "application/octet-stream");
        assert_eq!(resp.headers()["server"], SERVER_NAME);
        let body = resp.bytes().await.unwrap();
        let mut expected = vec![0xff, 0x00, 0x01];
        expected.extend_from_slice(b"https://example.com/live now\nbest\n--stdout\n--loglevel\nnone\n");
        assert_eq!(body.as_ref(), expected.as_slice());
        server.shutdown().await;
    }

    #[tokio::test]
    async fn youtube_dl_family_gets_stdout_flags() {
        let dir = tempfile::tempdir().unwrap();
        let tool = fake_tool(dir.path(), "yt-dlp", r#"printf '%s\n' "$@""#);

        let server = TestServer::start(None).await;
        let resp = reqwest::get(server.url(&encode_base64(&format!(
            "{tool} https://video.test/watch?v=abc"
        ))))
        .await
        .unwrap();

        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(
            resp.text().await.unwrap(),
            "https://video.test/watch?v=abc\n-o\n-\n"
        );
        server.shutdown().await;
    }

    #[tokio::test]
    async fn failing_tool_still_serves_its_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let tool = fake_tool(dir.path(), "youtube-dl", "printf partial; exit 3");

        let server = TestServer::start(None).await;
        let resp = reqwest::get(server.url(&encode_cmd(&format!("{tool} u"))))
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(resp.text().await.unwrap(), "partial");
        server.shutdown().await;
    }

    #[tokio::test]
    async fn spawn_failure_is_404() {
        let dir = tempfile::tempdir().unwrap();
        // Executable, so it resolves; the interpreter is missing, so exec fails.
        let path = dir.path().join("streamlink");
        std::fs::write(&path, "#!/nonexistent/liveproxy-interpreter\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        let server = TestServer::start(None).await;
        let resp = reqwest::get(server.url(&encode_cmd(&format!("{} u", path.display()))))
            .await
            .unwrap();
        assert_not_found(&resp);
        server.shutdown().await;
    }

    #[tokio::test]
    async fn timed_out_tool_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let tool = fake_tool(dir.path(), "yt-dlp", "sleep 30");

        let server = TestServer::start(Some(Duration::from_millis(300))).await;
        let resp = reqwest::get(server.url(&encode_cmd(&format!("{tool} u"))))
            .await
            .unwrap();
        assert_not_found(&resp);
        server.shutdown().await;
    }

    #[tokio::test]
    async fn slow_tool_does_not_block_other_clients() {
        let dir = tempfile::tempdir().unwrap();
        let slow = fake_tool(dir.path(), "streamlink", "sleep 2; printf slow");
        let fast = fake_tool(dir.path(), "yt-dlp", "printf fast");

        let server = TestServer::start(None).await;
        let slow_req = tokio::spawn(reqwest::get(server.url(&encode_cmd(&slow))));
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = std::time::Instant::now();
        let resp = reqwest::get(server.url(&encode_cmd(&fast))).await.unwrap();
        assert_eq!(resp.text().await.unwrap(), "fast");
        assert!(started.elapsed() < Duration::from_secs(2));

        let slow_resp = slow_req.await.unwrap().unwrap();
        assert_eq!(slow_resp.text().await.unwrap(), "slow");
        server.shutdown().await;
    }

    #[tokio::test]
    async fn concurrent_first_lookups_share_one_cache_entry() {
        let dir = tempfile::tempdir().unwrap();
        let tool = fake_tool(dir.path(), "yt-dlp", "printf ok");

        let server = TestServer::start(None).await;
        let url = server.url(&encode_cmd(&format!("{tool} u")));
        let (a, b) = tokio::join!(reqwest::get(url.clone()), reqwest::get(url));

        for resp in [a.unwrap(), b.unwrap()] {
            assert_eq!(resp.status(), reqwest::StatusCode::OK);
            assert_eq!(resp.text().await.unwrap(), "ok");
        }
        assert_eq!(server.state.resolver.len(), 1);
        assert!(matches!(server.state.resolver.cached(&tool), Some(Some(_))));
        server.shutdown().await;
    }
}
