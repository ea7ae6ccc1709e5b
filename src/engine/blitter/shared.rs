//! ### English
//! State shared between the producer side (`Blitter`) and the worker thread.
//!
//! The mutex guards only the handoff (stop flag + the one pending submission) and the condvar
//! handshake. It is never held across GPU calls, fence waits, or pageflip waits.
//!
//! ### 中文
//! producer 侧（`Blitter`）与 worker 线程之间共享的状态。
//!
//! 互斥锁只保护交接区（停止标记 + 唯一待处理的提交）与 condvar 握手；
//! 绝不会在 GPU 调用、fence 等待或 pageflip 等待期间持有。
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use parking_lot::{Condvar, Mutex};

use crate::engine::handles::PlaneSubmission;

/// ### English
/// Worker lifecycle state, observable from any thread.
///
/// ### 中文
/// worker 生命周期状态，可在任意线程观察。
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    Starting = 0,
    Ready = 1,
    Waiting = 2,
    Drawing = 3,
    Flipping = 4,
    Draining = 5,
    Stopped = 6,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Starting,
            1 => Self::Ready,
            2 => Self::Waiting,
            3 => Self::Drawing,
            4 => Self::Flipping,
            5 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

/// ### English
/// Frame counters published by the worker.
///
/// ### 中文
/// worker 发布的帧计数。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlitterStats {
    /// ### English
    /// Frames whose quad was drawn (fence satisfied).
    ///
    /// ### 中文
    /// 已绘制的帧数（fence 已满足）。
    pub frames_drawn: u64,
    /// ### English
    /// Frames dropped because import or the fence wait failed.
    ///
    /// ### 中文
    /// 因导入或 fence 等待失败而丢弃的帧数。
    pub frames_dropped: u64,
    /// ### English
    /// Flips posted to the display layer.
    ///
    /// ### 中文
    /// 提交给显示层的 flip 次数。
    pub flips: u64,
}

/// ### English
/// Mutex-protected handoff between the producer and the worker.
///
/// ### 中文
/// producer 与 worker 之间受互斥锁保护的交接区。
#[derive(Debug, Default)]
pub(crate) struct Handoff {
    pub(crate) stop: bool,
    /// ### English
    /// Latest submission not yet consumed by the worker. A newer submit replaces it.
    ///
    /// ### 中文
    /// worker 尚未消费的最新提交；更新的提交会替换它。
    pub(crate) pending: Option<PlaneSubmission>,
    /// ### English
    /// Set by the worker once it stops accepting frames (stop observed or fatal error).
    ///
    /// ### 中文
    /// worker 不再接收帧时置位（观察到停止或出现致命错误）。
    pub(crate) exited: bool,
}

pub(crate) struct SharedBlitState {
    pub(crate) handoff: Mutex<Handoff>,
    pub(crate) wake: Condvar,
    state: AtomicU8,
    frames_drawn: AtomicU64,
    frames_dropped: AtomicU64,
    flips: AtomicU64,
}

impl SharedBlitState {
    pub(crate) fn new() -> Self {
        Self {
            handoff: Mutex::new(Handoff::default()),
            wake: Condvar::new(),
            state: AtomicU8::new(WorkerState::Starting as u8),
            frames_drawn: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            flips: AtomicU64::new(0),
        }
    }

    pub(crate) fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn stats(&self) -> BlitterStats {
        BlitterStats {
            frames_drawn: self.frames_drawn.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            flips: self.flips.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn count_drawn(&self) {
        self.frames_drawn.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn count_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn count_flip(&self) {
        self.flips.fetch_add(1, Ordering::Relaxed);
    }

    /// ### English
    /// Sets the stop flag and wakes the worker.
    ///
    /// ### 中文
    /// 设置停止标记并唤醒 worker。
    pub(crate) fn request_stop(&self) {
        let mut handoff = self.handoff.lock();
        handoff.stop = true;
        self.wake.notify_one();
    }

    /// ### English
    /// Blocks until a submission is pending or stop is requested. Returns `None` on stop; a
    /// submission still pending at that point stays in the handoff for draining.
    ///
    /// ### 中文
    /// 阻塞直到有待处理提交或收到停止请求。停止时返回 `None`；此时仍待处理的提交留在交接区，
    /// 由回收阶段处理。
    pub(crate) fn wait_for_submission(&self) -> Option<PlaneSubmission> {
        let mut handoff = self.handoff.lock();
        loop {
            if handoff.stop {
                return None;
            }
            if let Some(submission) = handoff.pending.take() {
                return Some(submission);
            }
            self.wake.wait(&mut handoff);
        }
    }

    /// ### English
    /// Marks the worker as no longer accepting frames and hands back whatever was left pending.
    ///
    /// ### 中文
    /// 标记 worker 不再接收帧，并取回仍待处理的提交。
    pub(crate) fn close(&self) -> Option<PlaneSubmission> {
        let mut handoff = self.handoff.lock();
        handoff.exited = true;
        handoff.pending.take()
    }
}
