use std::fmt;
use std::io;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, error, trace, warn};

use flint_transport::{
    poller, ConnectError, ConnectStatus, Direction, Readiness, Transport, TransportError,
};

use crate::{EngineError, TlsConfig, TlsEngine};

/// 建连相位标记。
///
/// # 不变量
/// - 引擎对象（`TlsTransport::engine`）为 `Some` 当且仅当相位越过 `Init`；
/// - 相位推进单调：`Init → Connecting`，完成态由引擎报告通道可用而隐式
///   表达；任何终止性失败都把相位复位回 `Init`，句柄保持可重试、可销毁。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum ConnState {
    #[default]
    Init,
    Connecting,
}

/// 引擎提供器：适配器按需（首次建连时）分配引擎对象。
type EngineProvider<E> = Box<dyn FnMut() -> Result<E, EngineError> + Send>;

/// 加密后端适配器。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 在 [`TlsEngine`] 之上补齐传输契约要求的生命周期纪律与就绪门控：
///   引擎对象懒分配、恰好分配一次、恰好释放一次；
/// - 增量建连的“不得重复分配”约束落在这里：`Connecting` 相位的每次步进
///   只复用既有引擎对象。
///
/// ## 逻辑（How）
/// - 首次 `connect`/`connect_step` 把待定配置快照一份（写入超时与
///   非阻塞标志），再通过提供器分配引擎；分配失败即
///   [`ConnectError::Allocation`]，立即传播；
/// - 读路径先询问引擎缓冲字节，有则跳过外层轮询；无则以调用方超时等待
///   读就绪，随后的引擎读使用快照中的内层超时；
/// - 写路径先等写就绪，未就绪直接返回，不触达引擎；
/// - `close` 取走并丢弃引擎（即删除引擎连接对象），幂等。
///
/// ## 契约（What）
/// - 实现 [`Transport`] 全部操作；零字节引擎读规范化为
///   [`TransportError::Closed`]；
/// - 设置器只影响待定配置，首次建连后被忽略（快照只取一次）。
pub struct TlsTransport<E: TlsEngine> {
    provider: EngineProvider<E>,
    engine: Option<E>,
    pending: TlsConfig,
    snapshot: Option<TlsConfig>,
    state: ConnState,
}

impl<E: TlsEngine> TlsTransport<E> {
    /// 以引擎提供器构造适配器；引擎对象推迟到首次建连时分配。
    pub fn with_provider(
        provider: impl FnMut() -> Result<E, EngineError> + Send + 'static,
    ) -> Self {
        Self {
            provider: Box::new(provider),
            engine: None,
            pending: TlsConfig::default(),
            snapshot: None,
            state: ConnState::Init,
        }
    }

    /// 使用进程级全局 CA 存储作为信任锚。
    pub fn enable_global_ca_store(&mut self) {
        self.pending.use_global_ca_store = true;
    }

    /// 设置服务端 CA 证书（PEM），材料被拷入并由适配器独占持有。
    pub fn set_ca_cert(&mut self, pem: impl Into<Bytes>) {
        self.pending.ca_cert_pem = Some(pem.into());
    }

    /// 设置客户端证书（PEM）。
    pub fn set_client_cert(&mut self, pem: impl Into<Bytes>) {
        self.pending.client_cert_pem = Some(pem.into());
    }

    /// 设置客户端私钥（PEM）。
    pub fn set_client_key(&mut self, pem: impl Into<Bytes>) {
        self.pending.client_key_pem = Some(pem.into());
    }

    /// 调整引擎内部单次读调用的时间上限（双超时设计的内层值）。
    pub fn set_read_chunk_timeout(&mut self, timeout: Duration) {
        self.pending.read_chunk_timeout = timeout;
    }

    /// 首次建连时取一次配置快照，此后原样复用。
    fn snapshot_config(&mut self, timeout: Duration, non_blocking: bool) -> TlsConfig {
        match &self.snapshot {
            Some(cfg) => cfg.clone(),
            None => {
                let mut cfg = self.pending.clone();
                cfg.timeout = timeout;
                cfg.non_blocking = non_blocking;
                self.snapshot = Some(cfg.clone());
                cfg
            }
        }
    }

    /// 分配引擎对象并推进到 `Connecting`；已分配时不做任何事。
    fn ensure_engine(&mut self) -> Result<(), TransportError> {
        if self.engine.is_none() {
            let engine = (self.provider)().map_err(|err| ConnectError::Allocation {
                reason: err.to_string(),
            })?;
            self.engine = Some(engine);
            self.state = ConnState::Connecting;
        }
        Ok(())
    }

    /// 终止性建连失败：释放引擎、复位相位，让句柄可重试或销毁。
    fn reset_after_failure(&mut self) {
        self.engine = None;
        self.state = ConnState::Init;
    }

    fn engine_mut(&mut self) -> Result<&mut E, TransportError> {
        self.engine.as_mut().ok_or(TransportError::NotConnected)
    }

    fn engine_fd(&self) -> Result<std::os::fd::RawFd, TransportError> {
        self.engine
            .as_ref()
            .and_then(TlsEngine::raw_fd)
            .ok_or(TransportError::NotConnected)
    }
}

/// 已建立通道上的引擎错误映射。
fn map_engine_io(operation: &'static str, err: EngineError) -> TransportError {
    match err {
        EngineError::Io(source) => TransportError::io(operation, source),
        EngineError::NotConnected => TransportError::NotConnected,
        other => TransportError::io(operation, io::Error::other(other.to_string())),
    }
}

impl<E: TlsEngine> Transport for TlsTransport<E> {
    fn connect(&mut self, host: &str, port: u16, timeout: Duration) -> Result<(), TransportError> {
        let cfg = self.snapshot_config(timeout, false);
        self.ensure_engine()?;
        let engine = self.engine_mut()?;
        if let Err(err) = engine.connect(host, port, &cfg) {
            error!(host, port, error = %err, "failed to open a new tls connection");
            self.reset_after_failure();
            return Err(ConnectError::Handshake {
                host: host.to_string(),
                reason: err.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn connect_step(
        &mut self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<ConnectStatus, TransportError> {
        let cfg = self.snapshot_config(timeout, true);
        // `Connecting` 相位的步进只复用既有引擎对象，绝不重新分配。
        self.ensure_engine()?;
        let engine = self.engine_mut()?;
        match engine.connect_step(host, port, &cfg) {
            Ok(status) => {
                trace!(host, port, ?status, "tls connect step");
                Ok(status)
            }
            Err(err) => {
                error!(host, port, error = %err, "tls connect step failed");
                self.reset_after_failure();
                Err(ConnectError::Handshake {
                    host: host.to_string(),
                    reason: err.to_string(),
                }
                .into())
            }
        }
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        let chunk_timeout = match &self.snapshot {
            Some(cfg) => cfg.read_chunk_timeout,
            None => self.pending.read_chunk_timeout,
        };
        let engine = self.engine.as_mut().ok_or(TransportError::NotConnected)?;
        // 引擎缓冲里已有明文时跳过外层轮询，省掉一次多余的系统调用。
        if engine.bytes_available() == 0 {
            let fd = engine.raw_fd().ok_or(TransportError::NotConnected)?;
            match poller::wait(fd, Direction::Read, timeout)? {
                Readiness::TimedOut => return Err(TransportError::timeout("read", timeout)),
                Readiness::Ready => {}
            }
        }
        let engine = self.engine_mut()?;
        match engine.read(buf, chunk_timeout) {
            Ok(0) => Err(TransportError::Closed),
            Ok(read) => {
                trace!(bytes = read, "tls read");
                Ok(read)
            }
            Err(err) => Err(map_engine_io("read", err)),
        }
    }

    fn write(&mut self, buf: &[u8], timeout: Duration) -> Result<usize, TransportError> {
        let fd = self.engine_fd()?;
        match poller::wait(fd, Direction::Write, timeout)? {
            Readiness::TimedOut => {
                warn!(fd, ?timeout, "write poll timed out");
                return Err(TransportError::timeout("write", timeout));
            }
            Readiness::Ready => {}
        }
        let engine = self.engine_mut()?;
        engine.write(buf).map_err(|err| map_engine_io("write", err))
    }

    fn poll_read(&self, timeout: Duration) -> Result<Readiness, TransportError> {
        poller::wait(self.engine_fd()?, Direction::Read, timeout)
    }

    fn poll_write(&self, timeout: Duration) -> Result<Readiness, TransportError> {
        poller::wait(self.engine_fd()?, Direction::Write, timeout)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        // 引擎连接对象恰好删除一次：取走 Option 后重复 close 是无操作。
        if self.engine.take().is_some() {
            debug!("tls engine released");
        }
        self.state = ConnState::Init;
        Ok(())
    }
}

impl<E: TlsEngine> fmt::Debug for TlsTransport<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsTransport")
            .field("state", &self.state)
            .field("engine", &self.engine)
            .field("snapshot_taken", &self.snapshot.is_some())
            .finish_non_exhaustive()
    }
}
