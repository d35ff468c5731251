#![doc = r#"
# flint-transport-tls

## 设计动机（Why）
- **加密后端适配器**：把外部安全通道引擎适配到
  [`flint_transport::Transport`] 契约上，引擎本身（握手、记录加密、证书
  校验）不在本 crate 重新实现，只通过 [`TlsEngine`] 的窄接口消费；
- **建连状态机**：`Init → Connecting` 的相位推进与“连接对象恰好分配一次”
  的约束集中在适配器内，增量建连由外部事件循环反复驱动；
- **配置快照**：证书/密钥等材料在首次建连时快照一次，之后的设置调用
  不再影响已生效的配置。

## 核心契约（What）
- [`TlsTransport`]：实现完整后端契约的适配器，引擎对象懒分配、独占持有，
  `close` 恰好释放一次且幂等；
- [`TlsEngine`]：引擎能力集（阻塞建连、步进建连、带内部超时的读、写、
  缓冲字节查询、裸描述符）；删除引擎即 `Drop`；
- [`TlsConfig`]：超时、非阻塞标志、信任锚与客户端证书材料，全部可选；
- [`RustlsEngine`]：基于 `rustls` 的默认引擎实现，含进程级全局 CA 存储
  （[`install_global_ca_store`]）。

## 实现策略（How）
- 读路径采用“双超时”设计：外层就绪轮询用调用方超时回答“有没有数据”，
  内层引擎读用独立的 [`TlsConfig::read_chunk_timeout`]（默认 10ms）约束
  引擎自身的阻塞读——该差异源自原始实现的刻意选择，这里保留并显式
  暴露为配置项，而非悄悄“修复”；
- 写路径先以调用方超时等待写就绪，未就绪不触达引擎；
- 零字节引擎读规范化为连接关闭错误。

## 风险与考量（Trade-offs）
- 证书材料以 `Bytes` 拥有所有权（拷入一次、廉价克隆），不存在悬垂借用，
  代价是一次复制；
- 引擎建连失败后适配器回到 `Init` 相位，句柄既可重试也可直接销毁。
"#]

mod channel;
mod config;
mod engine;
mod rustls_engine;

pub use channel::TlsTransport;
pub use config::{TlsConfig, DEFAULT_READ_CHUNK_TIMEOUT};
pub use engine::{EngineError, TlsEngine};
pub use rustls_engine::{install_global_ca_store, RustlsEngine};
