use std::io;
use std::time::Duration;

use thiserror::Error;

/// 建连阶段的错误分类。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 把“地址解析失败 / TCP 层失败 / 握手失败 / 引擎对象分配失败”拆成
///   可判别的变体，让上层据此决定重试、告警或直接放弃；
/// - `Allocation` 对应原始设计中“上下文或引擎对象分配失败即致命”的约定，
///   立即向调用方传播，不做内部兜底。
///
/// ## 契约（What）
/// - 任一变体返回后，后端都保持可销毁状态：调用方可以安全地 `close` 或
///   直接丢弃句柄；
/// - `Handshake` 由后端在返回前以 `tracing::error!` 记录目标主机，便于
///   诊断（对应原实现的失败日志）。
#[derive(Debug, Error)]
pub enum ConnectError {
    /// 主机名解析失败。
    #[error("failed to resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// 解析成功但没有得到任何可用地址。
    #[error("no address found for {host}:{port}")]
    NoAddress { host: String, port: u16 },

    /// TCP 层建连失败（拒绝、不可达、超时等）。
    #[error("tcp connect to {host}:{port} failed: {source}")]
    Tcp {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// 安全通道引擎报告的握手/建连失败。
    #[error("handshake with {host} failed: {reason}")]
    Handshake { host: String, reason: String },

    /// 引擎连接对象分配失败，视为致命错误。
    #[error("engine allocation failed: {reason}")]
    Allocation { reason: String },
}

/// 传输层统一错误分类。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 对应“分配 / 建连 / 轮询 / 超时 / IO”五类故障域，调用方无需解析底层
///   `io::Error` 即可完成容错决策；
/// - 原始接口以返回值符号区分“超时（0）”与“错误（负值）”，Rust 形态下
///   就绪轮询的超时保留为 [`crate::Readiness::TimedOut`] 取值，而读写路径
///   的窗口耗尽则显式升级为 [`TransportError::Timeout`]。
///
/// ## 契约（What）
/// - [`TransportError::Closed`]：引擎读到零字节的规范化结果——零长度成功读
///   被刻意禁止作为合法返回；
/// - [`TransportError::NotConnected`]：在尚无底层通道时调用读写/轮询的
///   防御性结果，本设计不在此之外阻止调用方误用；
/// - 幂等的重复 `close` 不会产生任何错误。
#[derive(Debug, Error)]
pub enum TransportError {
    /// 建连失败，细分见 [`ConnectError`]。
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// 就绪轮询本身失败（`poll(2)` 返回负值）。
    #[error("readiness poll failed: {source}")]
    Poll {
        #[source]
        source: io::Error,
    },

    /// 操作在给定窗口内未等到就绪。
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// 对端关闭连接（零字节读的规范化）。
    #[error("peer closed the connection")]
    Closed,

    /// 引擎级读写失败。
    #[error("{operation} failed: {source}")]
    Io {
        operation: &'static str,
        #[source]
        source: io::Error,
    },

    /// 底层通道尚未建立。
    #[error("transport is not connected")]
    NotConnected,
}

impl TransportError {
    /// 构造带操作名的超时错误。
    pub fn timeout(operation: &'static str, timeout: Duration) -> Self {
        TransportError::Timeout { operation, timeout }
    }

    /// 构造带操作名的 IO 错误。
    pub fn io(operation: &'static str, source: io::Error) -> Self {
        TransportError::Io { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_operation_and_window() {
        let err = TransportError::timeout("write", Duration::from_millis(250));
        let text = err.to_string();
        assert!(text.contains("write"), "错误文案应包含操作名: {text}");
        assert!(text.contains("250"), "错误文案应包含超时窗口: {text}");
    }

    #[test]
    fn connect_error_converts_into_transport_error() {
        let err: TransportError = ConnectError::NoAddress {
            host: "example.test".into(),
            port: 443,
        }
        .into();
        assert!(matches!(err, TransportError::Connect(_)));
    }
}
