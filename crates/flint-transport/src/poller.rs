//! 单描述符的就绪等待器。
//!
//! # 教案级注释
//!
//! ## 意图（Why）
//! - 读写前的“超时受限等待”是所有同步后端的公共需求，收敛到一个
//!   `poll(2)` 封装，避免每个后端重复处理 `EINTR`、超时换算等细节；
//! - 等待本身无副作用：不读取、不写入、不改变描述符状态。
//!
//! ## 契约（What）
//! - [`wait`] 返回 [`Readiness::Ready`] 表示描述符在窗口内就绪，
//!   [`Readiness::TimedOut`] 表示窗口耗尽，`Err` 仅用于 `poll(2)` 自身失败；
//! - **超时约定**：`Duration::ZERO` 表示“只探测一次，立即返回”；本实现
//!   不提供“无限等待”哨兵，需要长等待的调用方显式传入足够大的窗口。
//!
//! ## 逻辑（How）
//! - 毫秒向上取整后钳制到 `c_int` 范围；
//! - `EINTR` 按剩余窗口重试，保证表观语义仍是“最多等待一个窗口”。

use std::io;
use std::os::fd::RawFd;
use std::time::{Duration, Instant};

use crate::{Readiness, TransportError};

/// 等待方向：读就绪或写就绪。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

impl Direction {
    fn events(self) -> libc::c_short {
        match self {
            Direction::Read => libc::POLLIN,
            Direction::Write => libc::POLLOUT,
        }
    }
}

/// 阻塞当前线程直到 `fd` 在 `direction` 方向就绪、窗口耗尽或出错。
pub fn wait(fd: RawFd, direction: Direction, timeout: Duration) -> Result<Readiness, TransportError> {
    // 超大窗口下 `Instant + Duration` 会溢出；`None` 即视作“无界截止点”。
    let deadline = Instant::now().checked_add(timeout);
    let mut remaining = timeout;
    loop {
        let mut fds = [libc::pollfd {
            fd,
            events: direction.events(),
            revents: 0,
        }];
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), 1, to_poll_millis(remaining)) };
        if rc > 0 {
            if fds[0].revents & libc::POLLNVAL != 0 {
                return Err(TransportError::Poll {
                    source: io::Error::from(io::ErrorKind::InvalidInput),
                });
            }
            // POLLERR/POLLHUP 同样视作就绪：随后的读写会把具体错误带给调用方。
            return Ok(Readiness::Ready);
        }
        if rc == 0 {
            return Ok(Readiness::TimedOut);
        }
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            if let Some(deadline) = deadline {
                remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Ok(Readiness::TimedOut);
                }
            }
            continue;
        }
        return Err(TransportError::Poll { source: err });
    }
}

/// 毫秒向上取整，避免把 999µs 的窗口截断成“立即返回”。
fn to_poll_millis(timeout: Duration) -> libc::c_int {
    if timeout.is_zero() {
        return 0;
    }
    timeout
        .as_nanos()
        .div_ceil(1_000_000)
        .min(libc::c_int::MAX as u128) as libc::c_int
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixStream;

    #[test]
    fn write_ready_socket_reports_ready_with_zero_timeout() {
        let (a, _b) = UnixStream::pair().expect("创建 socket pair 失败");
        let readiness = wait(a.as_raw_fd(), Direction::Write, Duration::ZERO).expect("poll 失败");
        assert_eq!(readiness, Readiness::Ready);
    }

    #[test]
    fn idle_socket_read_poll_times_out_not_errors() {
        let (a, _b) = UnixStream::pair().expect("创建 socket pair 失败");
        let readiness = wait(a.as_raw_fd(), Direction::Read, Duration::ZERO).expect("poll 失败");
        assert_eq!(readiness, Readiness::TimedOut);
    }

    #[test]
    fn pending_bytes_flip_read_readiness() {
        let (a, mut b) = UnixStream::pair().expect("创建 socket pair 失败");
        b.write_all(b"ping").expect("写入失败");
        let readiness =
            wait(a.as_raw_fd(), Direction::Read, Duration::from_millis(200)).expect("poll 失败");
        assert_eq!(readiness, Readiness::Ready);
    }

    #[test]
    fn huge_timeout_does_not_overflow_deadline() {
        let (a, _b) = UnixStream::pair().expect("创建 socket pair 失败");
        // 空闲 socket 立即可写，等待必须在构造截止点时就安全返回。
        let readiness = wait(a.as_raw_fd(), Direction::Write, Duration::MAX).expect("poll 失败");
        assert_eq!(readiness, Readiness::Ready);
    }

    #[test]
    fn submillisecond_timeout_rounds_up_to_one_milli() {
        assert_eq!(to_poll_millis(Duration::from_micros(300)), 1);
        assert_eq!(to_poll_millis(Duration::ZERO), 0);
        assert_eq!(to_poll_millis(Duration::from_millis(25)), 25);
    }
}
