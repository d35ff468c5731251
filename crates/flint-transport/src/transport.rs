use std::fmt;
use std::time::Duration;

use crate::{ConnectStatus, Readiness, TransportError};

/// 传输后端能力集：任何通道实现（明文、加密、未来变体）都必须满足的契约。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 原始设计以函数指针结构体实现后端多态，本契约把它表达为 trait，
///   [`crate::TransportHandle`] 据此做纯转发调度；
/// - 上层协议只编写一份代码即可同时工作在明文与加密链路上。
///
/// ## 契约（What）
/// - `connect`：阻塞建连，成功返回时通道完全可用；
/// - `connect_step`：每次调用最多推进一步握手/建连序列，允许以相同参数
///   反复调用直到 [`ConnectStatus::Ready`] 或出错；**已分配的连接对象在
///   后续步骤中绝不重新分配**；
/// - `read`：后端无缓冲字节时先以调用方超时等待读就绪；窗口耗尽返回
///   [`TransportError::Timeout`] 且不触达引擎；引擎零字节读规范化为
///   [`TransportError::Closed`]；
/// - `write`：先以调用方超时等待写就绪，未就绪时不触达引擎直接返回；
///   就绪后返回引擎实际写入的字节数（允许小于 `buf.len()`）；
/// - `poll_read` / `poll_write`：委托就绪轮询器，超时是取值不是错误；
/// - `close`：幂等；释放底层连接对象（若存在），对已关闭后端调用不报错。
///
/// ## 并发模型（Trade-offs）
/// - 同步单属主模型：`&mut self` 保证同一时刻只有一个逻辑属主驱动后端；
/// - 超时按调用独立重置，不做跨调用累计；
/// - 中止进行中的增量建连没有显式取消操作，直接丢弃后端必须安全。
pub trait Transport: fmt::Debug + Send {
    /// 阻塞建连：在 `timeout` 内完全建立到 `host:port` 的通道。
    fn connect(&mut self, host: &str, port: u16, timeout: Duration) -> Result<(), TransportError>;

    /// 非阻塞建连：推进至多一步，需反复驱动直至 `Ready` 或出错。
    fn connect_step(
        &mut self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<ConnectStatus, TransportError>;

    /// 读取至多 `buf.len()` 字节；零字节结果以 `Err(Closed)` 呈现。
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError>;

    /// 等待写就绪后写入，返回实际写入的字节数。
    fn write(&mut self, buf: &[u8], timeout: Duration) -> Result<usize, TransportError>;

    /// 等待读就绪。
    fn poll_read(&self, timeout: Duration) -> Result<Readiness, TransportError>;

    /// 等待写就绪。
    fn poll_write(&self, timeout: Duration) -> Result<Readiness, TransportError>;

    /// 幂等关闭：释放底层连接对象（若存在）。
    fn close(&mut self) -> Result<(), TransportError>;
}

/// 对象安全的擦除形态，供运行期选择后端的调用方使用。
pub type BoxedTransport = Box<dyn Transport>;

impl Transport for BoxedTransport {
    fn connect(&mut self, host: &str, port: u16, timeout: Duration) -> Result<(), TransportError> {
        (**self).connect(host, port, timeout)
    }

    fn connect_step(
        &mut self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<ConnectStatus, TransportError> {
        (**self).connect_step(host, port, timeout)
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        (**self).read(buf, timeout)
    }

    fn write(&mut self, buf: &[u8], timeout: Duration) -> Result<usize, TransportError> {
        (**self).write(buf, timeout)
    }

    fn poll_read(&self, timeout: Duration) -> Result<Readiness, TransportError> {
        (**self).poll_read(timeout)
    }

    fn poll_write(&self, timeout: Duration) -> Result<Readiness, TransportError> {
        (**self).poll_write(timeout)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        (**self).close()
    }
}
