//! Streaming sub-connection owned by an exchange profile.
//!
//! A [`Websocket`] holds the endpoint, enabled flag and proxy for one
//! exchange. [`Websocket::connect`] spawns a reader task that forwards text
//! frames to the returned channel, answers pings, and exits on close, error
//! or [`Websocket::shutdown`].
//!
//! Reconnection is left to the caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{client_async_tls, connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{Error, Result};

type Stream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CHANNEL_CAPACITY: usize = 1024;

struct ReaderTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Websocket settings and connection state for one exchange.
pub struct Websocket {
    exchange: String,
    url: RwLock<String>,
    enabled: AtomicBool,
    proxy: RwLock<Option<Url>>,
    connected: Arc<AtomicBool>,
    task: Mutex<Option<ReaderTask>>,
}

impl std::fmt::Debug for Websocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Websocket")
            .field("exchange", &self.exchange)
            .field("url", &*self.url.read())
            .field("enabled", &self.is_enabled())
            .field("proxy", &*self.proxy.read())
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl Websocket {
    pub fn new(exchange: impl Into<String>, url: impl Into<String>, enabled: bool) -> Self {
        Self {
            exchange: exchange.into(),
            url: RwLock::new(url.into()),
            enabled: AtomicBool::new(enabled),
            proxy: RwLock::new(None),
            connected: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn url(&self) -> String {
        self.url.read().clone()
    }

    pub fn set_url(&self, url: impl Into<String>) {
        *self.url.write() = url.into();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn proxy(&self) -> Option<Url> {
        self.proxy.read().clone()
    }

    /// Check that `proxy` could be installed, without installing it.
    ///
    /// Only plain `http` proxies are accepted (tunnelled with `CONNECT`).
    /// Re-setting the current address is an error.
    pub fn validate_proxy(&self, proxy: &Url) -> Result<()> {
        if proxy.scheme() != "http" {
            return Err(Error::Proxy(format!(
                "{}: unsupported websocket proxy scheme {}",
                self.exchange,
                proxy.scheme()
            )));
        }
        if proxy.host_str().is_none() {
            return Err(Error::Proxy(format!(
                "{}: websocket proxy {proxy} has no host",
                self.exchange
            )));
        }
        if self.proxy.read().as_ref() == Some(proxy) {
            return Err(Error::Proxy(format!(
                "{}: websocket proxy is already set to {proxy}",
                self.exchange
            )));
        }
        Ok(())
    }

    /// Validate and install `proxy`. Takes effect on the next connect.
    pub fn set_proxy_address(&self, proxy: Url) -> Result<()> {
        self.validate_proxy(&proxy)?;
        *self.proxy.write() = Some(proxy);
        Ok(())
    }

    /// Install a proxy already checked with [`Websocket::validate_proxy`].
    pub(crate) fn commit_proxy(&self, proxy: Url) {
        *self.proxy.write() = Some(proxy);
    }

    /// Open the connection and start the reader task.
    ///
    /// Text frames arrive on the returned channel. The channel closes when
    /// the connection ends.
    pub async fn connect(&self) -> Result<mpsc::Receiver<String>> {
        if !self.is_enabled() {
            return Err(Error::Connection(format!(
                "{}: websocket is disabled",
                self.exchange
            )));
        }
        // Claimed before the handshake so only one caller can be connecting.
        if self
            .connected
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::Connection(format!(
                "{}: websocket already connected",
                self.exchange
            )));
        }

        let url = self.url();
        info!(exchange = %self.exchange, url = %url, "connecting websocket");
        let handshake = match self.proxy() {
            Some(proxy) => connect_via_proxy(&url, &proxy).await,
            None => connect_async(url.as_str())
                .await
                .map(|(stream, _)| stream)
                .map_err(Error::from),
        };
        let stream = match handshake {
            Ok(stream) => stream,
            Err(err) => {
                self.connected.store(false, Ordering::SeqCst);
                return Err(err);
            }
        };
        info!(exchange = %self.exchange, "websocket connected");

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(read_loop(
            self.exchange.clone(),
            stream,
            tx,
            shutdown_rx,
            Arc::clone(&self.connected),
        ));

        if let Some(previous) = self.task.lock().replace(ReaderTask {
            shutdown: shutdown_tx,
            handle,
        }) {
            previous.handle.abort();
        }
        Ok(rx)
    }

    /// Stop the reader task and wait for it to finish.
    pub async fn shutdown(&self) {
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.shutdown.send(true);
            if let Err(e) = task.handle.await {
                warn!(exchange = %self.exchange, error = %e, "websocket reader task failed");
            }
        }
        self.connected.store(false, Ordering::SeqCst);
    }
}

async fn read_loop(
    exchange: String,
    mut ws: Stream,
    tx: mpsc::Sender<String>,
    mut shutdown: watch::Receiver<bool>,
    connected: Arc<AtomicBool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                debug!(exchange = %exchange, "websocket shutdown requested");
                let _ = ws.close(None).await;
                break;
            }
            frame = ws.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if tx.send(text).await.is_err() {
                        debug!(exchange = %exchange, "websocket receiver dropped");
                        break;
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = ws.send(Message::Pong(data)).await {
                        error!(exchange = %exchange, error = %e, "failed to answer ping");
                        break;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(exchange = %exchange, frame = ?frame, "websocket closed by server");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!(exchange = %exchange, error = %e, "websocket error");
                    break;
                }
                None => break,
            }
        }
    }
    connected.store(false, Ordering::SeqCst);
}

/// Open a `CONNECT` tunnel through an HTTP proxy, then run the websocket
/// handshake (with TLS for `wss`) over it.
async fn connect_via_proxy(target: &str, proxy: &Url) -> Result<Stream> {
    let target_url = Url::parse(target)?;
    let host = target_url
        .host_str()
        .ok_or_else(|| Error::Connection(format!("websocket url {target} has no host")))?;
    let port = target_url
        .port_or_known_default()
        .ok_or_else(|| Error::Connection(format!("websocket url {target} has no port")))?;
    let proxy_host = proxy
        .host_str()
        .ok_or_else(|| Error::Proxy(format!("proxy {proxy} has no host")))?;
    let proxy_port = proxy.port_or_known_default().unwrap_or(80);

    let mut tcp = TcpStream::connect((proxy_host, proxy_port)).await?;
    let request = format!("CONNECT {host}:{port} HTTP/1.1\r\nHost: {host}:{port}\r\n\r\n");
    tcp.write_all(request.as_bytes()).await?;

    let mut head = Vec::with_capacity(256);
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if tcp.read(&mut byte).await? == 0 {
            return Err(Error::Proxy(format!("proxy {proxy} closed during CONNECT")));
        }
        head.push(byte[0]);
        if head.len() > 8192 {
            return Err(Error::Proxy(format!("proxy {proxy} sent an oversized reply")));
        }
    }
    let status_line = String::from_utf8_lossy(&head);
    let ok = status_line
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        == Some("200");
    if !ok {
        return Err(Error::Proxy(format!(
            "proxy {proxy} refused CONNECT: {}",
            status_line.lines().next().unwrap_or_default()
        )));
    }

    let (stream, _) = client_async_tls(target, tcp).await?;
    Ok(stream)
}
