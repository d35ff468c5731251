use std::time::Duration;

use bytes::Bytes;

/// 引擎内部单次读调用的默认时间上限（“双超时”设计的内层值）。
///
/// 原始实现把该值硬编码为 10ms，且与调用方的轮询超时无关；这里保留默认值
/// 并通过 [`TlsConfig::read_chunk_timeout`] 开放为配置项。
pub const DEFAULT_READ_CHUNK_TIMEOUT: Duration = Duration::from_millis(10);

/// 加密后端的配置快照。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 汇集建连前可设置的全部选项：超时、非阻塞标志、信任锚选择与客户端
///   证书材料；所有字段可选，缺省即采用引擎自身的默认信任与行为；
/// - 证书/密钥以 [`Bytes`] 拥有所有权：相比原始设计“借用指针 + 长度”的
///   约定，调用方无需保证缓冲区存活到建连完成。
///
/// ## 契约（What）
/// - **快照语义**：适配器在首次 `connect`/`connect_step` 时拷贝一次本配置
///   （`Bytes` 克隆仅增加引用计数），此后的设置调用不影响已生效的快照；
/// - `timeout` 与 `non_blocking` 由适配器在快照时根据调用形态写入，
///   不提供公开设置器。
#[derive(Clone, Debug)]
pub struct TlsConfig {
    /// 建连总超时，由首次建连调用的超时参数写入。
    pub timeout: Duration,
    /// 是否以非阻塞（增量驱动）方式建连。
    pub non_blocking: bool,
    /// 使用进程级全局 CA 存储作为信任锚。
    pub use_global_ca_store: bool,
    /// 服务端 CA 证书（PEM）。
    pub ca_cert_pem: Option<Bytes>,
    /// 客户端证书（PEM）。
    pub client_cert_pem: Option<Bytes>,
    /// 客户端私钥（PEM）。
    pub client_key_pem: Option<Bytes>,
    /// 引擎内部单次读调用的时间上限，见 [`DEFAULT_READ_CHUNK_TIMEOUT`]。
    pub read_chunk_timeout: Duration,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::ZERO,
            non_blocking: false,
            use_global_ca_store: false,
            ca_cert_pem: None,
            client_cert_pem: None,
            client_key_pem: None,
            read_chunk_timeout: DEFAULT_READ_CHUNK_TIMEOUT,
        }
    }
}
