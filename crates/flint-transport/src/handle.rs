use std::time::Duration;

use tracing::debug;

use crate::{BoxedTransport, ConnectStatus, Readiness, Transport, TransportError};

/// 面向调用方的统一传输句柄：一个逻辑连接/会话对应一个句柄。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 上层协议代码持有句柄即可完成建连、读写、轮询与关闭，无需知道绑定的
///   是明文还是加密后端——这层间接正是“一份协议实现跑在任意链路上”的关键；
/// - 原始设计中“destroy 必须先 close 再释放上下文”的顺序约束，在 Rust
///   形态下由 [`Drop`] 实现承担：句柄被丢弃时先幂等关闭再释放后端。
///
/// ## 契约（What）
/// - **绑定不变量**：构造时绑定唯一后端，生命周期内不可更换，后端上下文
///   不跨句柄共享；
/// - 所有公开操作均为纯转发，无业务逻辑；
/// - 销毁恰好一次由移动语义保证；显式 [`close`](Self::close) 之后再丢弃
///   句柄不会造成二次释放——后端 `close` 自身幂等。
///
/// ## 使用方式（How）
/// - 需要在建连前做类型化配置（如证书材料）时，保留泛型形态并通过
///   [`backend_mut`](Self::backend_mut) 访问具体后端；
/// - 运行期才决定后端类型时，使用 [`boxed`](Self::boxed) 擦除。
#[derive(Debug)]
pub struct TransportHandle<B: Transport> {
    backend: B,
}

impl<B: Transport> TransportHandle<B> {
    /// 绑定后端，构造句柄。后端自身的构造失败应在进入本函数前传播。
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// 访问绑定的后端（只读）。
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// 访问绑定的后端（可变），用于建连前的类型化配置。
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// 阻塞建连。
    pub fn connect(
        &mut self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<(), TransportError> {
        self.backend.connect(host, port, timeout)
    }

    /// 驱动一步非阻塞建连。
    pub fn connect_step(
        &mut self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<ConnectStatus, TransportError> {
        self.backend.connect_step(host, port, timeout)
    }

    /// 读取字节。
    pub fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        self.backend.read(buf, timeout)
    }

    /// 写入字节。
    pub fn write(&mut self, buf: &[u8], timeout: Duration) -> Result<usize, TransportError> {
        self.backend.write(buf, timeout)
    }

    /// 等待读就绪。
    pub fn poll_read(&self, timeout: Duration) -> Result<Readiness, TransportError> {
        self.backend.poll_read(timeout)
    }

    /// 等待写就绪。
    pub fn poll_write(&self, timeout: Duration) -> Result<Readiness, TransportError> {
        self.backend.poll_write(timeout)
    }

    /// 幂等关闭当前连接。
    pub fn close(&mut self) -> Result<(), TransportError> {
        self.backend.close()
    }
}

impl TransportHandle<BoxedTransport> {
    /// 擦除后端类型，得到运行期可替换的句柄形态。
    pub fn boxed(backend: impl Transport + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }
}

impl<B: Transport> Drop for TransportHandle<B> {
    fn drop(&mut self) {
        // 释放顺序约束：先关闭活动连接，再让后端上下文随句柄一起释放。
        if let Err(err) = self.backend.close() {
            debug!(error = %err, "close during handle teardown failed");
        }
    }
}

#[allow(dead_code)]
fn _assert_handle_is_send()
where
    TransportHandle<BoxedTransport>: Send,
{
}
