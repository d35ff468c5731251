use std::io::{Read as _, Write as _};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::os::fd::{AsRawFd, RawFd};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, error, warn};

use flint_transport::{
    poller, ConnectError, ConnectStatus, Direction, Readiness, Transport, TransportError,
};

/// 建连阶段标记。
///
/// # 不变量
/// - `Connecting` 持有的描述符尚未确认可写，也未被提升为 `TcpStream`；
/// - 一旦进入 `Connected`，挂起的 socket 不复存在——提升恰好发生一次。
#[derive(Debug, Default)]
enum ConnState {
    #[default]
    Init,
    Connecting {
        socket: Socket,
        host: String,
        port: u16,
    },
    Connected(TcpStream),
}

/// 明文 TCP 后端。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 给上层一个与加密后端同形的明文通道：同样的建连/读写/轮询/关闭序列，
///   让协议代码在两种链路间零改动切换。
///
/// ## 逻辑（How）
/// - 阻塞建连：解析首个地址后 `TcpStream::connect_timeout`；
/// - 增量建连：`socket2` 非阻塞 connect，`EINPROGRESS` 进入 `Connecting`，
///   之后每步以调用方超时等待写就绪，就绪后检查 `take_error` 再提升为
///   阻塞 `TcpStream`；
/// - 读：先按调用方超时等待读就绪，窗口耗尽不触达 socket；
/// - 写：同样先等写就绪，未就绪直接返回，不做部分写尝试。
///
/// ## 契约（What）
/// - 实现 [`Transport`] 全部操作；`close` 幂等，进行中的建连同样可被关闭；
/// - 读到零字节一律返回 [`TransportError::Closed`]。
#[derive(Debug, Default)]
pub struct TcpTransport {
    state: ConnState,
}

impl TcpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn raw_fd(&self) -> Option<RawFd> {
        match &self.state {
            ConnState::Init => None,
            ConnState::Connecting { socket, .. } => Some(socket.as_raw_fd()),
            ConnState::Connected(stream) => Some(stream.as_raw_fd()),
        }
    }

    fn stream_mut(&mut self) -> Result<&mut TcpStream, TransportError> {
        match &mut self.state {
            ConnState::Connected(stream) => Ok(stream),
            _ => Err(TransportError::NotConnected),
        }
    }

    fn poll(&self, direction: Direction, timeout: Duration) -> Result<Readiness, TransportError> {
        let fd = self.raw_fd().ok_or(TransportError::NotConnected)?;
        poller::wait(fd, direction, timeout)
    }

    /// 把确认可写的非阻塞 socket 提升为阻塞 `TcpStream`。
    fn promote(&mut self, socket: Socket) -> Result<(), TransportError> {
        socket
            .set_nonblocking(false)
            .map_err(|source| TransportError::io("connect", source))?;
        self.state = ConnState::Connected(socket.into());
        Ok(())
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, ConnectError> {
    let mut addrs = (host, port).to_socket_addrs().map_err(|source| ConnectError::Resolve {
        host: host.to_string(),
        port,
        source,
    })?;
    addrs.next().ok_or_else(|| ConnectError::NoAddress {
        host: host.to_string(),
        port,
    })
}

fn in_progress(err: &std::io::Error) -> bool {
    err.raw_os_error() == Some(libc::EINPROGRESS)
        || err.kind() == std::io::ErrorKind::WouldBlock
}

impl Transport for TcpTransport {
    fn connect(&mut self, host: &str, port: u16, timeout: Duration) -> Result<(), TransportError> {
        // 重入时先释放旧通道，保证同一后端始终至多持有一个描述符。
        self.close()?;
        let addr = resolve(host, port)?;
        let stream = TcpStream::connect_timeout(&addr, timeout).map_err(|source| {
            error!(host, port, error = %source, "tcp connect failed");
            ConnectError::Tcp {
                host: host.to_string(),
                port,
                source,
            }
        })?;
        self.state = ConnState::Connected(stream);
        Ok(())
    }

    fn connect_step(
        &mut self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<ConnectStatus, TransportError> {
        match std::mem::take(&mut self.state) {
            ConnState::Init => {
                let addr = resolve(host, port)?;
                let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
                    .map_err(|source| TransportError::io("connect", source))?;
                socket
                    .set_nonblocking(true)
                    .map_err(|source| TransportError::io("connect", source))?;
                match socket.connect(&addr.into()) {
                    Ok(()) => {
                        self.promote(socket)?;
                        Ok(ConnectStatus::Ready)
                    }
                    Err(err) if in_progress(&err) => {
                        self.state = ConnState::Connecting {
                            socket,
                            host: host.to_string(),
                            port,
                        };
                        Ok(ConnectStatus::InProgress)
                    }
                    Err(source) => {
                        error!(host, port, error = %source, "tcp connect failed");
                        Err(ConnectError::Tcp {
                            host: host.to_string(),
                            port,
                            source,
                        }
                        .into())
                    }
                }
            }
            ConnState::Connecting { socket, host, port } => {
                match poller::wait(socket.as_raw_fd(), Direction::Write, timeout)? {
                    Readiness::TimedOut => {
                        self.state = ConnState::Connecting { socket, host, port };
                        Ok(ConnectStatus::InProgress)
                    }
                    Readiness::Ready => {
                        let pending = socket
                            .take_error()
                            .map_err(|source| TransportError::io("connect", source))?;
                        if let Some(source) = pending {
                            error!(host = %host, port, error = %source, "tcp connect failed");
                            return Err(ConnectError::Tcp { host, port, source }.into());
                        }
                        self.promote(socket)?;
                        Ok(ConnectStatus::Ready)
                    }
                }
            }
            connected @ ConnState::Connected(_) => {
                self.state = connected;
                Ok(ConnectStatus::Ready)
            }
        }
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        match self.poll(Direction::Read, timeout)? {
            Readiness::TimedOut => return Err(TransportError::timeout("read", timeout)),
            Readiness::Ready => {}
        }
        let stream = self.stream_mut()?;
        match stream.read(buf) {
            Ok(0) => Err(TransportError::Closed),
            Ok(read) => Ok(read),
            Err(source) => Err(TransportError::io("read", source)),
        }
    }

    fn write(&mut self, buf: &[u8], timeout: Duration) -> Result<usize, TransportError> {
        match self.poll(Direction::Write, timeout)? {
            Readiness::TimedOut => {
                warn!(fd = ?self.raw_fd(), ?timeout, "write poll timed out");
                return Err(TransportError::timeout("write", timeout));
            }
            Readiness::Ready => {}
        }
        let stream = self.stream_mut()?;
        stream
            .write(buf)
            .map_err(|source| TransportError::io("write", source))
    }

    fn poll_read(&self, timeout: Duration) -> Result<Readiness, TransportError> {
        self.poll(Direction::Read, timeout)
    }

    fn poll_write(&self, timeout: Duration) -> Result<Readiness, TransportError> {
        self.poll(Direction::Write, timeout)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        match std::mem::take(&mut self.state) {
            ConnState::Init => {}
            ConnState::Connecting { .. } => {
                debug!("aborting in-flight tcp connect");
            }
            ConnState::Connected(stream) => {
                // 半关闭失败不影响释放：描述符随 stream 一并回收。
                let _ = stream.shutdown(std::net::Shutdown::Both);
            }
        }
        Ok(())
    }
}
