/// 一次非阻塞建连步骤的结果。
///
/// # 契约说明
/// - [`ConnectStatus::InProgress`]：本步已推进但通道尚未可用，调用方需以
///   相同参数继续驱动 `connect_step`；
/// - [`ConnectStatus::Ready`]：通道建立完成，可以进入读写阶段。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectStatus {
    InProgress,
    Ready,
}

impl ConnectStatus {
    /// 通道是否已可用。
    #[inline]
    pub fn is_ready(self) -> bool {
        matches!(self, ConnectStatus::Ready)
    }
}

/// 就绪等待的结果：超时是一个取值，而不是错误。
///
/// # 设计背景（Why）
/// - 上层经常以“零超时探测”轮询描述符，若把超时建模为 `Err` 会迫使调用方
///   在热路径上区分“真错误”与“暂不可用”，故保留原始 `select/poll` 的
///   三态语义：就绪 / 超时 / 错误，其中错误才走 `Result::Err`。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    TimedOut,
}

impl Readiness {
    /// 描述符是否在窗口内变为就绪。
    #[inline]
    pub fn is_ready(self) -> bool {
        matches!(self, Readiness::Ready)
    }
}
