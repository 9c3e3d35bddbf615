// HTTP/1.1 server over TCP or TLS with a bounded graceful drain
use std::io::BufRead;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;

use crate::config::Srv;
use crate::context::Context;
use crate::error::ServerError;
use crate::http::{HttpRequest, HttpResponse, Limits, ReadResult};
use crate::modules::Pipeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Created,
    Listening,
    Draining,
    Stopped,
}

/// Outcome of a drain: connections that finished on their own versus
/// connections still open at the deadline and closed by force.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub drained: usize,
    pub abandoned: usize,
}

struct Shared {
    pipe: Pipeline,
    limits: Limits,
    idle_timeout: Duration,
    read_timeout: Duration,
    write_timeout: Duration,
    handshake_timeout: Duration,
    tcp_keepalive: Duration,
    max_connections: usize,
}

pub struct Server {
    cfg: Srv,
    shared: Arc<Shared>,
    state: Mutex<State>,
    shutdown_tx: watch::Sender<Option<Duration>>,
    accept_task: Mutex<Option<JoinHandle<DrainReport>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(g) => g,
        Err(poisoned) => {
            crate::log::warn("server: lock recovered after panic");
            poisoned.into_inner()
        }
    }
}

impl Server {
    pub fn new(c: Srv, p: Pipeline) -> Self {
        let shared = Arc::new(Shared {
            pipe: p,
            limits: Limits::from_config(&c),
            idle_timeout: Duration::from_secs(c.idle_timeout),
            read_timeout: Duration::from_secs(c.read_timeout),
            write_timeout: Duration::from_secs(c.write_timeout),
            handshake_timeout: Duration::from_secs(c.handshake_timeout),
            tcp_keepalive: Duration::from_secs(c.tcp_keepalive),
            max_connections: c.max_connections,
        });
        let (shutdown_tx, _) = watch::channel(None);
        Server {
            cfg: c,
            shared,
            state: Mutex::new(State::Created),
            shutdown_tx,
            accept_task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> State {
        *lock(&self.state)
    }

    /// Binds the listener and starts accepting in the background.
    /// Returns the bound address (useful with port 0).
    pub async fn start(&self) -> Result<SocketAddr, ServerError> {
        {
            let mut st = lock(&self.state);
            if *st != State::Created {
                return Err(ServerError::AlreadyStarted);
            }
            *st = State::Listening;
        }
        match self.bind().await {
            Ok((listener, acceptor, addr)) => {
                {
                    // a shutdown may have run while bind was pending
                    let st = lock(&self.state);
                    if *st != State::Listening {
                        crate::log::warn(&format!("dropping listener on {addr}, server is {:?}", *st));
                        return Err(ServerError::StoppedDuringStart);
                    }
                    let rx = self.shutdown_tx.subscribe();
                    let handle = tokio::spawn(accept_loop(listener, acceptor, Arc::clone(&self.shared), rx));
                    *lock(&self.accept_task) = Some(handle);
                }
                let scheme = if self.cfg.debug { "http" } else { "https" };
                crate::log::info(&format!("Listening on {addr} ({scheme})"));
                crate::log::info(&format!(
                    "Admission capacity: {} | Max connections: {}",
                    self.cfg.admission_capacity, self.cfg.max_connections
                ));
                crate::log::separator();
                Ok(addr)
            }
            Err(e) => {
                let mut st = lock(&self.state);
                if *st != State::Listening {
                    crate::log::warn(&format!("bind failed after shutdown: {e}"));
                    return Err(ServerError::StoppedDuringStart);
                }
                *st = State::Created;
                Err(e)
            }
        }
    }

    async fn bind(&self) -> Result<(TcpListener, Option<TlsAcceptor>, SocketAddr), ServerError> {
        let acceptor = if self.cfg.debug {
            None
        } else {
            let tls = load_tls(&self.cfg.tls_cert, &self.cfg.tls_key)?;
            crate::log::info("TLS enabled");
            Some(TlsAcceptor::from(tls))
        };
        let addr = self.cfg.listen_addr.clone();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr: addr.clone(), source })?;
        let local = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;
        Ok((listener, acceptor, local))
    }

    /// Stops accepting, lets in-flight connections finish for up to
    /// `deadline`, then closes whatever is left.
    pub async fn shutdown(&self, deadline: Duration) -> DrainReport {
        let handle = {
            let mut st = lock(&self.state);
            if *st == State::Listening {
                *st = State::Draining;
            }
            lock(&self.accept_task).take()
        };
        let report = match handle {
            Some(h) => {
                self.shutdown_tx.send_replace(Some(deadline));
                match h.await {
                    Ok(r) => r,
                    Err(e) => {
                        crate::log::error(&format!("accept loop failed: {e}"));
                        DrainReport::default()
                    }
                }
            }
            None => DrainReport::default(),
        };
        *lock(&self.state) = State::Stopped;
        report
    }
}

async fn accept_loop(
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
    shared: Arc<Shared>,
    mut shutdown: watch::Receiver<Option<Duration>>,
) -> DrainReport {
    let mut conns: JoinSet<()> = JoinSet::new();

    let deadline = loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break Duration::ZERO;
                }
                if let Some(d) = *shutdown.borrow_and_update() {
                    break d;
                }
            }
            Some(_) = conns.join_next(), if !conns.is_empty() => {}
            res = listener.accept() => {
                let (tcp, peer) = match res {
                    Ok(r) => r,
                    Err(e) => {
                        crate::log::error(&format!("Accept error: {e}"));
                        continue;
                    }
                };
                if conns.len() >= shared.max_connections {
                    reject_overloaded(&tcp, acceptor.is_none());
                    continue;
                }
                let acceptor = acceptor.clone();
                let shared = Arc::clone(&shared);
                let rx = shutdown.clone();
                conns.spawn(async move {
                    let _guard = ConnGuard::new();
                    prepare_socket(&tcp, shared.tcp_keepalive);
                    match acceptor {
                        None => serve(tcp, peer, &shared, rx).await,
                        Some(acc) => match timeout(shared.handshake_timeout, acc.accept(tcp)).await {
                            Ok(Ok(tls)) => serve(tls, peer, &shared, rx).await,
                            Ok(Err(e)) => crate::log::debug(&format!("TLS handshake failed from {peer}: {e}")),
                            Err(_) => crate::log::debug(&format!("TLS handshake timeout from {peer}")),
                        },
                    }
                });
            }
        }
    };
    drop(listener);
    drain(conns, deadline).await
}

async fn drain(mut conns: JoinSet<()>, deadline: Duration) -> DrainReport {
    let in_flight = conns.len();
    crate::log::info(&format!("Draining {in_flight} connection(s), deadline {}ms", deadline.as_millis()));

    let finished = timeout(deadline, async {
        while conns.join_next().await.is_some() {}
    })
    .await;

    let abandoned = conns.len();
    if finished.is_err() && abandoned > 0 {
        crate::log::warn(&format!("Forcing shutdown with {abandoned} active connection(s)"));
        conns.abort_all();
        while conns.join_next().await.is_some() {}
        crate::metrics::add_forced_closes(abandoned as u64);
    } else {
        crate::log::info("All connections drained");
    }
    DrainReport { drained: in_flight - abandoned, abandoned }
}

struct ConnGuard;

impl ConnGuard {
    fn new() -> Self {
        crate::metrics::connection_opened();
        ConnGuard
    }
}

impl Drop for ConnGuard {
    fn drop(&mut self) {
        crate::metrics::connection_closed();
    }
}

fn prepare_socket(tcp: &TcpStream, keepalive: Duration) {
    let _ = tcp.set_nodelay(true);
    let ka = socket2::TcpKeepalive::new().with_time(keepalive);
    if let Err(e) = socket2::SockRef::from(tcp).set_tcp_keepalive(&ka) {
        crate::log::debug(&format!("set keepalive: {e}"));
    }
}

fn reject_overloaded(tcp: &TcpStream, plain: bool) {
    crate::metrics::inc_requests_err();
    crate::log::warn("Connection limit reached, rejecting client");
    if plain {
        let mut resp = HttpResponse::error(503, "Server overloaded");
        resp.set_header("Connection", "close");
        let _ = tcp.try_write(&resp.to_bytes());
    }
}

async fn write_response<S>(s: &mut S, resp: &HttpResponse, limit: Duration) -> bool
where
    S: AsyncWrite + Unpin,
{
    let out = resp.to_bytes();
    match timeout(limit, async {
        s.write_all(&out).await?;
        s.flush().await
    })
    .await
    {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            crate::log::debug(&format!("write failed: {e}"));
            false
        }
        Err(_) => {
            crate::log::debug("write timed out");
            false
        }
    }
}

/// Serves requests on one connection until the peer leaves, a timeout
/// fires, or shutdown begins while the connection is idle.
async fn serve<S>(mut s: S, peer: SocketAddr, sh: &Arc<Shared>, mut shutdown: watch::Receiver<Option<Duration>>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let ip = peer.ip().to_string();
    let mut pending: Vec<u8> = Vec::new();

    loop {
        if shutdown.borrow().is_some() {
            break;
        }

        if pending.is_empty() {
            let mut first = vec![0u8; sh.limits.buffer_size];
            let n = tokio::select! {
                r = timeout(sh.idle_timeout, s.read(&mut first)) => match r {
                    Ok(Ok(n)) if n > 0 => n,
                    _ => break,
                },
                _ = shutdown.changed() => break,
            };
            pending.extend_from_slice(&first[..n]);
        }

        let seed = std::mem::take(&mut pending);
        let message = match timeout(sh.read_timeout, crate::http::read_http_message(&mut s, seed, &sh.limits)).await {
            Err(_) => {
                crate::log::debug(&format!("read timed out from {ip}"));
                break;
            }
            Ok(ReadResult::Closed) => break,
            Ok(ReadResult::Error(e)) => {
                crate::metrics::inc_requests_err();
                if let Some(mut resp) = e.response() {
                    resp.set_header("Connection", "close");
                    write_response(&mut s, &resp, sh.write_timeout).await;
                }
                break;
            }
            Ok(ReadResult::Ok { message, rest }) => {
                pending = rest;
                message
            }
        };

        crate::metrics::inc_requests();
        let mut req = match HttpRequest::parse(&message) {
            Some(r) => r,
            None => {
                crate::metrics::inc_requests_err();
                let mut resp = HttpResponse::error(400, "Bad Request");
                resp.set_header("Connection", "close");
                write_response(&mut s, &resp, sh.write_timeout).await;
                break;
            }
        };

        if matches!(req.method.as_str(), "POST" | "PUT" | "PATCH") && req.get_header("Content-Length").is_none() {
            crate::metrics::inc_requests_err();
            let mut resp = HttpResponse::error(411, "Length Required");
            resp.set_header("Connection", "close");
            write_response(&mut s, &resp, sh.write_timeout).await;
            break;
        }

        crate::log::request(&req.method, &req.path, &ip);
        let wants_keep_alive = req.keep_alive();

        let shared = Arc::clone(sh);
        let remote = peer.to_string();
        let handled = tokio::task::spawn_blocking(move || {
            let mut ctx = Context::new();
            ctx.set("_remote_addr", remote);
            let resp = shared.pipe.handle(&mut req, &mut ctx);
            // the context, and any admission permit in it, drops here
            (resp, ctx.elapsed_ms())
        })
        .await;

        let (mut resp, ms) = match handled {
            Ok(v) => v,
            Err(e) => {
                crate::log::error(&format!("handler panicked: {e}"));
                (HttpResponse::error(500, "Internal Server Error"), 0)
            }
        };

        crate::metrics::record_latency(ms as u64);
        if resp.status_code < 400 {
            crate::metrics::inc_requests_ok();
        } else {
            crate::metrics::inc_requests_err();
        }

        let keep_alive = wants_keep_alive && shutdown.borrow().is_none();
        finalize(&mut resp, keep_alive);
        crate::log::response(resp.status_code, ms);

        if !write_response(&mut s, &resp, sh.write_timeout).await || !keep_alive {
            break;
        }
    }

    let _ = timeout(Duration::from_secs(1), s.shutdown()).await;
}

fn finalize(resp: &mut HttpResponse, keep_alive: bool) {
    let has_body = !matches!(resp.status_code, 100..=199 | 204 | 304);
    if has_body && resp.get_header("Content-Length").is_none() {
        resp.set_header("Content-Length", &resp.body.len().to_string());
    }
    resp.set_header("Connection", if keep_alive { "keep-alive" } else { "close" });
}

/// Builds the TLS server configuration from PEM files on disk.
pub fn load_tls(cert_path: &str, key_path: &str) -> Result<Arc<rustls::ServerConfig>, ServerError> {
    let open = |p: &str| {
        std::fs::File::open(p)
            .map(std::io::BufReader::new)
            .map_err(|e| ServerError::TlsConfig(format!("open {p}: {e}")))
    };
    tls_from_pem(&mut open(cert_path)?, &mut open(key_path)?)
}

pub fn tls_from_pem(cert: &mut dyn BufRead, key: &mut dyn BufRead) -> Result<Arc<rustls::ServerConfig>, ServerError> {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let certs = load_certs(cert)?;
    let key = load_private_key(key)?;

    let mut config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| ServerError::TlsConfig(e.to_string()))?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    config.session_storage = rustls::server::ServerSessionMemoryCache::new(2048);
    Ok(Arc::new(config))
}

fn load_certs(r: &mut dyn BufRead) -> Result<Vec<rustls::pki_types::CertificateDer<'static>>, ServerError> {
    let mut certs = Vec::new();
    loop {
        match rustls_pemfile::read_one(r) {
            Ok(Some(rustls_pemfile::Item::X509Certificate(cert))) => certs.push(cert),
            Ok(None) => break,
            Ok(Some(_)) => continue,
            Err(e) => return Err(ServerError::TlsConfig(format!("parse certificate: {e}"))),
        }
    }
    if certs.is_empty() {
        return Err(ServerError::TlsConfig("no certificates found".into()));
    }
    Ok(certs)
}

fn load_private_key(r: &mut dyn BufRead) -> Result<rustls::pki_types::PrivateKeyDer<'static>, ServerError> {
    loop {
        match rustls_pemfile::read_one(r) {
            Ok(Some(rustls_pemfile::Item::Pkcs1Key(k))) => return Ok(k.into()),
            Ok(Some(rustls_pemfile::Item::Pkcs8Key(k))) => return Ok(k.into()),
            Ok(Some(rustls_pemfile::Item::Sec1Key(k))) => return Ok(k.into()),
            Ok(None) => break,
            Ok(Some(_)) => continue,
            Err(e) => return Err(ServerError::TlsConfig(format!("parse private key: {e}"))),
        }
    }
    Err(ServerError::TlsConfig("no private key found".into()))
}
