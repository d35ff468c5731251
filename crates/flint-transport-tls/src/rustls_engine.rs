use std::io::{self, Read as _, Write as _};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::os::fd::{AsRawFd, RawFd};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use rustls::{ClientConfig, ClientConnection, RootCertStore};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use socket2::{Domain, Protocol, Socket, Type};
use tracing::debug;

use flint_transport::{poller, ConnectStatus, Direction, Readiness};

use crate::{EngineError, TlsConfig, TlsEngine, TlsTransport};

/// 进程级全局 CA 存储。
///
/// # 设计背景（Why）
/// - 多个句柄共享同一组信任锚时，逐句柄携带证书材料既浪费又易漂移；
///   全局存储一次安装、处处生效；
/// - `ArcSwapOption` 提供读无锁、写常数时间的替换语义，运行期更新信任锚
///   不影响已建立的连接（旧连接持有旧 `Arc` 快照）。
static GLOBAL_CA_STORE: ArcSwapOption<RootCertStore> = ArcSwapOption::const_empty();

/// 安装（或替换）进程级全局 CA 存储。
///
/// 仅对安装之后快照配置的连接生效；已取过快照的句柄不受影响。
pub fn install_global_ca_store(store: RootCertStore) {
    GLOBAL_CA_STORE.store(Some(Arc::new(store)));
}

fn global_ca_store() -> Option<Arc<RootCertStore>> {
    GLOBAL_CA_STORE.load_full()
}

/// 引擎内部相位。
///
/// # 不变量
/// - `TcpConnecting` 仅出现在非阻塞建连路径；
/// - `Handshaking`/`Established` 持有的 socket 与 `ClientConnection` 一一
///   对应，提升相位时整体搬移，不存在半初始化状态。
#[derive(Debug, Default)]
enum Phase {
    #[default]
    Idle,
    TcpConnecting {
        socket: Socket,
        conn: Box<ClientConnection>,
    },
    Handshaking {
        sock: TcpStream,
        conn: Box<ClientConnection>,
    },
    Established {
        sock: TcpStream,
        conn: Box<ClientConnection>,
    },
}

/// 基于 `rustls` 的默认引擎。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 为适配器提供一个开箱可用的 [`TlsEngine`] 实现；信任锚来自全局 CA
///   存储或配置中的 PEM 材料，客户端证书可选。
///
/// ## 逻辑（How）
/// - 阻塞建连：`TcpStream::connect_timeout` 后在阻塞 socket 上循环
///   `complete_io` 直至握手完成；
/// - 步进建连：非阻塞 socket 上 `Idle → TcpConnecting → Handshaking →
///   Established` 推进，每步至多一次零超时就绪探测加一次 `complete_io`，
///   `WouldBlock` 即上报“进行中”；
/// - `bytes_available` 来自 `process_new_packets` 的明文计数，适配器据此
///   决定是否跳过外层轮询。
///
/// ## 风险与考量（Trade-offs）
/// - 未配置任何信任锚时信任库为空，握手将因证书校验失败而终止——
///   “引擎默认信任”的语义由调用方通过全局存储显式给出；
/// - 握手完成后 socket 切回阻塞模式，读的时间上限由每次调用的
///   `set_read_timeout` 约束。
#[derive(Debug, Default)]
pub struct RustlsEngine {
    phase: Phase,
}

impl RustlsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// 在 `Handshaking` 相位上推进握手；完成时提升为 `Established`。
    fn drive_handshake(&mut self) -> Result<ConnectStatus, EngineError> {
        let Phase::Handshaking { sock, conn } = &mut self.phase else {
            return Err(EngineError::NotConnected);
        };
        if conn.is_handshaking() {
            match conn.complete_io(sock) {
                Ok(_) => {}
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(ConnectStatus::InProgress);
                }
                Err(err) => return Err(EngineError::Io(err)),
            }
        }
        if conn.is_handshaking() {
            return Ok(ConnectStatus::InProgress);
        }
        sock.set_nonblocking(false)?;
        if let Phase::Handshaking { sock, conn } = std::mem::take(&mut self.phase) {
            debug!("tls handshake complete");
            self.phase = Phase::Established { sock, conn };
        }
        Ok(ConnectStatus::Ready)
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, EngineError> {
    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| EngineError::Config(format!("no address for {host}:{port}")))
}

fn in_progress(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EINPROGRESS) || err.kind() == io::ErrorKind::WouldBlock
}

fn positive(timeout: Duration) -> Duration {
    timeout.max(Duration::from_millis(1))
}

fn new_connection(host: &str, cfg: &TlsConfig) -> Result<Box<ClientConnection>, EngineError> {
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|err| EngineError::Config(format!("invalid server name {host}: {err}")))?;
    let conn = ClientConnection::new(build_client_config(cfg)?, server_name)
        .map_err(|err| EngineError::Handshake(err.to_string()))?;
    Ok(Box::new(conn))
}

fn build_client_config(cfg: &TlsConfig) -> Result<Arc<ClientConfig>, EngineError> {
    let mut roots = RootCertStore::empty();
    if cfg.use_global_ca_store {
        if let Some(store) = global_ca_store() {
            roots = (*store).clone();
        }
    } else if let Some(pem) = &cfg.ca_cert_pem {
        for cert in CertificateDer::pem_slice_iter(pem) {
            let cert =
                cert.map_err(|err| EngineError::Config(format!("bad ca certificate: {err}")))?;
            roots
                .add(cert)
                .map_err(|err| EngineError::Config(format!("rejected ca certificate: {err}")))?;
        }
    }

    let builder = ClientConfig::builder().with_root_certificates(roots);
    let config = match (&cfg.client_cert_pem, &cfg.client_key_pem) {
        (Some(cert_pem), Some(key_pem)) => {
            let chain = CertificateDer::pem_slice_iter(cert_pem)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| EngineError::Config(format!("bad client certificate: {err}")))?;
            let key = PrivateKeyDer::from_pem_slice(key_pem)
                .map_err(|err| EngineError::Config(format!("bad client key: {err}")))?;
            builder
                .with_client_auth_cert(chain, key)
                .map_err(|err| EngineError::Config(format!("client auth rejected: {err}")))?
        }
        _ => builder.with_no_client_auth(),
    };
    Ok(Arc::new(config))
}

impl TlsEngine for RustlsEngine {
    fn connect(&mut self, host: &str, port: u16, cfg: &TlsConfig) -> Result<(), EngineError> {
        let addr = resolve(host, port)?;
        let mut sock = TcpStream::connect_timeout(&addr, positive(cfg.timeout))?;
        // 握手期间的读写都受建连总超时约束。
        sock.set_read_timeout(Some(positive(cfg.timeout)))?;
        sock.set_write_timeout(Some(positive(cfg.timeout)))?;
        let mut conn = new_connection(host, cfg)?;
        while conn.is_handshaking() {
            conn.complete_io(&mut sock)?;
        }
        sock.set_write_timeout(None)?;
        self.phase = Phase::Established { sock, conn };
        Ok(())
    }

    fn connect_step(
        &mut self,
        host: &str,
        port: u16,
        cfg: &TlsConfig,
    ) -> Result<ConnectStatus, EngineError> {
        match std::mem::take(&mut self.phase) {
            Phase::Idle => {
                let addr = resolve(host, port)?;
                let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
                socket.set_nonblocking(true)?;
                let conn = new_connection(host, cfg)?;
                match socket.connect(&addr.into()) {
                    Ok(()) => {
                        self.phase = Phase::Handshaking {
                            sock: socket.into(),
                            conn,
                        };
                        self.drive_handshake()
                    }
                    Err(err) if in_progress(&err) => {
                        self.phase = Phase::TcpConnecting { socket, conn };
                        Ok(ConnectStatus::InProgress)
                    }
                    Err(err) => Err(EngineError::Io(err)),
                }
            }
            Phase::TcpConnecting { socket, conn } => {
                let readiness =
                    poller::wait(socket.as_raw_fd(), Direction::Write, Duration::ZERO)
                        .map_err(|err| EngineError::Protocol(err.to_string()))?;
                match readiness {
                    Readiness::TimedOut => {
                        self.phase = Phase::TcpConnecting { socket, conn };
                        Ok(ConnectStatus::InProgress)
                    }
                    Readiness::Ready => {
                        if let Some(err) = socket.take_error()? {
                            return Err(EngineError::Io(err));
                        }
                        self.phase = Phase::Handshaking {
                            sock: socket.into(),
                            conn,
                        };
                        self.drive_handshake()
                    }
                }
            }
            handshaking @ Phase::Handshaking { .. } => {
                self.phase = handshaking;
                self.drive_handshake()
            }
            established @ Phase::Established { .. } => {
                self.phase = established;
                Ok(ConnectStatus::Ready)
            }
        }
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, EngineError> {
        let Phase::Established { sock, conn } = &mut self.phase else {
            return Err(EngineError::NotConnected);
        };
        sock.set_read_timeout(Some(positive(timeout)))?;
        loop {
            let state = conn
                .process_new_packets()
                .map_err(|err| EngineError::Protocol(err.to_string()))?;
            if state.plaintext_bytes_to_read() > 0 {
                return Ok(conn.reader().read(buf)?);
            }
            if state.peer_has_closed() {
                return Ok(0);
            }
            match conn.read_tls(sock) {
                Ok(0) => return Ok(0),
                Ok(_) => continue,
                Err(err) => return Err(EngineError::Io(err)),
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, EngineError> {
        let Phase::Established { sock, conn } = &mut self.phase else {
            return Err(EngineError::NotConnected);
        };
        let written = conn.writer().write(buf)?;
        while conn.wants_write() {
            conn.write_tls(sock)?;
        }
        Ok(written)
    }

    fn bytes_available(&mut self) -> usize {
        match &mut self.phase {
            Phase::Established { conn, .. } => conn
                .process_new_packets()
                .map(|state| state.plaintext_bytes_to_read())
                .unwrap_or(0),
            _ => 0,
        }
    }

    fn raw_fd(&self) -> Option<RawFd> {
        match &self.phase {
            Phase::Idle => None,
            Phase::TcpConnecting { socket, .. } => Some(socket.as_raw_fd()),
            Phase::Handshaking { sock, .. } | Phase::Established { sock, .. } => {
                Some(sock.as_raw_fd())
            }
        }
    }
}

impl TlsTransport<RustlsEngine> {
    /// 以默认 `rustls` 引擎构造加密后端。
    pub fn new() -> Self {
        Self::with_provider(|| Ok(RustlsEngine::new()))
    }
}

impl Default for TlsTransport<RustlsEngine> {
    fn default() -> Self {
        Self::new()
    }
}
