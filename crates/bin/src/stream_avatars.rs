//! Stream Avatars - presence overlay server with embedded frontend.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use engine::{
    register_assets, run_presence_loop, run_render_loop, Config, HttpSource, Presence, Store,
};
use futures_util::{SinkExt, StreamExt};
use protocol::Frame;
use rust_embed::RustEmbed;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

// Overlay page, script and base stylesheet
#[derive(RustEmbed)]
#[folder = "web"]
struct Assets;

#[derive(Clone)]
struct AppState {
    presence: Presence,
    frame_tx: broadcast::Sender<Arc<Frame>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,engine=debug")),
        )
        .init();

    info!("Stream Avatars v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load()?;
    config.apply_mount_file(Path::new("mount.json"))?;
    info!("Loaded configuration");
    info!("  Channel: {}", config.roster.twitch_user);
    info!("  Roster: {}", config.roster.snapshot_url());
    info!("  Manifest: {}", config.assets.avatars_url);
    info!("  Bot mode: {}", config.choices.bot);

    let source = HttpSource::new(&config)?;
    let mut store = Store::new(&config);
    let registry = register_assets(source.client(), &config.assets.avatars_url, &mut store).await;
    if registry.is_empty() {
        warn!("No avatar variants registered, chatters will not be shown");
    }

    let presence = Presence {
        store: store.shared(),
        registry,
        stage: config.stage,
        bot: config.choices.bot,
    };

    let (frame_tx, _) = broadcast::channel::<Arc<Frame>>(8);

    let poll_interval = Duration::from_secs(config.roster.poll_interval_secs.max(1));
    tokio::spawn(run_presence_loop(presence.clone(), source, poll_interval));
    tokio::spawn(run_render_loop(
        presence.clone(),
        frame_tx.clone(),
        config.server.frame_interval_ms,
    ));

    let state = AppState { presence, frame_tx };

    let app = Router::new()
        .route("/ws", get(websocket_handler))
        .route("/api/frame", get(frame_handler))
        .route("/", get(serve_index))
        .route("/index.html", get(serve_index))
        .nest_service("/avatars", ServeDir::new(&config.server.asset_dir))
        .fallback(static_handler)
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state);

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Overlay running on http://{}", addr);
    info!("Frame WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

/// Current frame as JSON, for polling overlays and debugging.
async fn frame_handler(State(state): State<AppState>) -> Json<Frame> {
    Json(state.presence.frame().await)
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    info!("Overlay connection from {}", addr);
    ws.on_upgrade(move |socket| handle_websocket(socket, addr, state))
}

async fn handle_websocket(socket: WebSocket, addr: SocketAddr, state: AppState) {
    let frame_rx = state.frame_tx.subscribe();
    let first = state.presence.frame().await;

    if let Err(e) = forward_frames(socket, addr, first, frame_rx).await {
        error!("Connection error from {}: {}", addr, e);
    }
    info!("Overlay {} disconnected", addr);
}

/// Push frames to one overlay until either side hangs up.
async fn forward_frames(
    socket: WebSocket,
    addr: SocketAddr,
    first: Frame,
    mut frame_rx: broadcast::Receiver<Arc<Frame>>,
) -> anyhow::Result<()> {
    let (mut write, mut read) = socket.split();

    write
        .send(Message::Text(serde_json::to_string(&first)?.into()))
        .await?;

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!("WebSocket error from {}: {}", addr, e);
                        break;
                    }
                    // Overlays never talk back
                    Some(Ok(_)) => {}
                }
            }
            frame = frame_rx.recv() => {
                match frame {
                    Ok(frame) => {
                        let text = serde_json::to_string(frame.as_ref())?;
                        write.send(Message::Text(text.into())).await?;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("Overlay {} lagged, skipped {} frames", addr, skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    Ok(())
}

async fn serve_index(headers: HeaderMap) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|h| h.to_str().ok())
        .map(|proto| if proto.eq_ignore_ascii_case("https") { "wss" } else { "ws" })
        .unwrap_or("ws");

    let socket_url = match host {
        Some(host) => format!("{}://{}/ws", scheme, host.trim_end_matches('/')),
        None => "/ws".to_string(),
    };

    let Some(content) = Assets::get("index.html") else {
        return not_found("index.html");
    };
    let page = String::from_utf8_lossy(&content.data).replace(
        "// STREAM_AVATARS_SOCKET_INJECT_POINT",
        &format!("window.STREAM_AVATARS_SOCKET = '{}';", socket_url),
    );

    (
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        page,
    )
        .into_response()
}

async fn static_handler(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');

    match Assets::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            (
                [(header::CONTENT_TYPE, mime.as_ref().to_string())],
                content.data.into_owned(),
            )
                .into_response()
        }
        None => not_found(path),
    }
}

fn not_found(path: &str) -> Response {
    warn!("Static file not found: {}", path);
    (StatusCode::NOT_FOUND, "404 Not Found").into_response()
}
