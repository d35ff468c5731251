#![doc = r#"
# flint-transport-tcp

## 设计动机（Why）
- **最小明文后端**：为 [`flint_transport::Transport`] 契约提供基于
  `std::net` 的明文实现，既是可直接使用的链路，也是加密后端的语义参照；
- **两种建连形态**：阻塞建连走 `TcpStream::connect_timeout`；增量建连用
  `socket2` 发起非阻塞 connect，由调用方（通常是外部事件循环）反复驱动
  `connect_step` 直至写就绪。

## 核心契约（What）
- [`TcpTransport`]：实现完整后端契约；读写前按调用方超时等待就绪，
  零字节读规范化为连接关闭错误；`close` 幂等。

## 风险与考量（Trade-offs）
- 地址解析取第一个结果，不做 Happy Eyeballs 式多地址竞速；
- 增量建连期间描述符归 `socket2::Socket` 所有，丢弃后端即中止建连，
  无需显式取消操作。
"#]

mod channel;

pub use channel::TcpTransport;
