use std::fmt;
use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

use thiserror::Error;

use flint_transport::ConnectStatus;

use crate::TlsConfig;

/// 引擎层错误分类。
///
/// # 契约说明
/// - `Config`：证书材料或参数非法，发生在建连前的配置解析阶段；
/// - `Handshake`：引擎报告的握手失败；
/// - `Protocol`：已建立通道上的 TLS 协议违例（坏记录、对端行为异常）；
/// - `Io`：底层套接字错误，含超时与 `WouldBlock`；
/// - `NotConnected`：在尚无通道时调用读写的防御性结果。
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid tls configuration: {0}")]
    Config(String),

    #[error("tls handshake failed: {0}")]
    Handshake(String),

    #[error("tls protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("engine has no established channel")]
    NotConnected,
}

/// 外部安全通道引擎必须满足的窄契约。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 适配器不重新实现握手、记录加密与证书校验，只通过本契约消费引擎；
/// - 接口形状对齐原始引擎集：阻塞建连、异步建连步进、带内部超时的读、
///   写、缓冲字节查询、裸描述符暴露；“删除引擎”即 `Drop`。
///
/// ## 契约（What）
/// - `connect`：阻塞完成 TCP 建连与握手，超时取 `cfg.timeout`；
/// - `connect_step`：推进至多一步，单步内最多做一次零超时就绪探测，
///   从不长时间阻塞；以相同参数重复调用是安全的；
/// - `read`：`timeout` 为引擎内部读的时间上限（双超时设计的内层值）；
///   对端有序关闭以 `Ok(0)` 呈现，由适配器统一规范化；
/// - `bytes_available`：已解密待读的缓冲字节数，适配器据此决定是否跳过
///   外层就绪轮询；
/// - `raw_fd`：通道存在前返回 `None`。
pub trait TlsEngine: fmt::Debug + Send {
    fn connect(&mut self, host: &str, port: u16, cfg: &TlsConfig) -> Result<(), EngineError>;

    fn connect_step(
        &mut self,
        host: &str,
        port: u16,
        cfg: &TlsConfig,
    ) -> Result<ConnectStatus, EngineError>;

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, EngineError>;

    fn write(&mut self, buf: &[u8]) -> Result<usize, EngineError>;

    fn bytes_available(&mut self) -> usize;

    fn raw_fd(&self) -> Option<RawFd>;
}
