#![doc = r#"
# flint-transport

## 设计动机（Why）
- **统一语言**：为 flint 的 TCP/TLS 等传输实现提供共同契约，上层协议代码
  只面向 [`Transport`] 与 [`TransportHandle`]，无需关心链路是明文还是加密、
  建连是阻塞还是增量驱动；
- **生命周期纪律**：句柄在整个生命周期内只绑定一个后端，销毁时保证
  “先关闭、后释放”的顺序，避免底层引擎资源泄漏；
- **就绪多路复用**：读写前的超时受限等待收敛到单一的 [`poller`] 实现，
  各后端不重复编写 `poll(2)` 细节。

## 核心契约（What）
- [`Transport`]：后端能力集（阻塞建连、增量建连、读、写、就绪轮询、关闭）；
- [`TransportHandle`]：纯转发的调度器，泛型形态保留具体后端类型，
  [`BoxedTransport`] 提供对象安全的擦除形态；
- [`TransportError`] / [`ConnectError`]：结构化错误分类，超时与数据错误
  通过 [`Readiness::TimedOut`] 与 `Err` 显式区分；
- [`poller::wait`]：单描述符、单方向、毫秒级超时的就绪等待。

## 实现策略（How）
- 全部为同步调用模型：无内部线程、无回调、无内部锁，单一逻辑属主由
  `&mut self` 在类型层面强制；
- 超时语义按调用独立重置，`Duration::ZERO` 表示“只探测一次，立即返回”；
- 零字节成功读被规范化为 [`TransportError::Closed`]，不会以 `Ok(0)` 形式
  泄漏给调用方。

## 风险与考量（Trade-offs）
- 轮询器基于 `libc::poll`，仅支持类 Unix 平台；
- 不提供显式取消原语，中止进行中的增量建连即直接丢弃句柄，这对所有
  后端都必须是安全操作。
"#]

mod error;
mod handle;
pub mod poller;
mod status;
mod transport;

pub use error::{ConnectError, TransportError};
pub use handle::TransportHandle;
pub use poller::Direction;
pub use status::{ConnectStatus, Readiness};
pub use transport::{BoxedTransport, Transport};
