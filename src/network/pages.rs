//! Result Pages
//!
//! The WebSocket endpoint shares its listener with two static HTML pages.
//! The request head is peeked before the handshake: upgrade requests go on
//! to the WebSocket layer, plain GETs are answered here.

use std::io::{self, ErrorKind};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Page shown to the winner of a round.
pub const WON_PAGE: &str = include_str!("../../pages/won.html");

/// Page shown to the loser of a round.
pub const LOST_PAGE: &str = include_str!("../../pages/lost.html");

/// Largest request head inspected before deferring to the WebSocket layer.
const HEAD_LIMIT: usize = 4096;

/// Pause between peeks while the request head is still arriving.
const PEEK_RETRY: Duration = Duration::from_millis(5);

/// Where an incoming request should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// WebSocket upgrade; hand the untouched stream to the handshake.
    WebSocket,
    /// Static page.
    Page {
        /// Bytes of request head to consume before answering.
        head_len: usize,
        /// Page to send.
        body: &'static str,
    },
    /// Plain HTTP for an unknown path.
    NotFound {
        /// Bytes of request head to consume before answering.
        head_len: usize,
    },
}

/// Peek at the request head on `stream` and decide its route.
///
/// Callers bound this with a timeout; a client that never finishes its
/// request head would otherwise keep the peek loop alive.
pub async fn classify(stream: &TcpStream) -> io::Result<Route> {
    let mut buf = vec![0u8; HEAD_LIMIT];
    loop {
        let n = stream.peek(&mut buf).await?;
        if n == 0 {
            return Err(io::Error::new(ErrorKind::UnexpectedEof, "closed before request head"));
        }
        if let Some(head_len) = head_end(&buf[..n]) {
            return Ok(route_request(&buf[..head_len]));
        }
        if n == buf.len() {
            return Ok(Route::WebSocket);
        }
        tokio::time::sleep(PEEK_RETRY).await;
    }
}

/// Answer a non-WebSocket route and close the stream.
pub async fn serve(mut stream: TcpStream, route: Route) -> io::Result<()> {
    let (head_len, status, body) = match route {
        Route::WebSocket => return Ok(()),
        Route::Page { head_len, body } => (head_len, "200 OK", body),
        Route::NotFound { head_len } => (head_len, "404 Not Found", "Not Found"),
    };

    let mut head = vec![0u8; head_len];
    stream.read_exact(&mut head).await?;

    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    debug!("Served HTTP {}", status);
    Ok(())
}

/// Length of the request head including its blank-line terminator.
fn head_end(bytes: &[u8]) -> Option<usize> {
    bytes.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}

/// Route a complete request head.
fn route_request(head: &[u8]) -> Route {
    let head_len = head.len();
    let text = String::from_utf8_lossy(head);
    let mut lines = text.split("\r\n");

    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();

    let is_upgrade = lines.any(|line| {
        line.split_once(':').is_some_and(|(name, value)| {
            name.trim().eq_ignore_ascii_case("upgrade")
                && value.trim().to_ascii_lowercase().contains("websocket")
        })
    });
    if is_upgrade {
        return Route::WebSocket;
    }

    let path = target.split('?').next().unwrap_or_default();
    match (method, path) {
        ("GET", "/gameover/won") => Route::Page { head_len, body: WON_PAGE },
        ("GET", "/gameover/lost") => Route::Page { head_len, body: LOST_PAGE },
        _ => Route::NotFound { head_len },
    }
}
