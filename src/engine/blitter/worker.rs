//! ### English
//! Blitter worker thread: owns the scanout surface and the GPU device, and runs the
//! wait → draw → flip cycle until stopped.
//!
//! ### 中文
//! blitter worker 线程：持有扫描输出表面与 GPU device，循环执行 等待 → 绘制 → 翻转，直到被停止。
use std::sync::Arc;

use crossbeam_channel as channel;
use tracing::{debug, error, info, warn};

use crate::engine::config::{BlitterConfig, SwapIntervalSetting};
use crate::engine::device::{BlitDevice, DeviceFactory};
use crate::engine::display::{
    BufferAllocator, FORMAT_ARGB8888, PageflipDriver, USAGE_RENDERING, USAGE_SCANOUT,
};
use crate::engine::error::{BlitterError, BlitterResult};
use crate::engine::handles::{BufferRef, NativeWindow, PlaneSubmission};
use crate::engine::plane::PlaneSlots;

use super::shared::{SharedBlitState, WorkerState};

/// ### English
/// Everything the worker thread takes ownership of.
///
/// ### 中文
/// worker 线程接管所有权的全部内容。
pub(super) struct WorkerParts<A, P, F> {
    pub(super) allocator: A,
    pub(super) pageflip: P,
    pub(super) device_factory: F,
    pub(super) config: BlitterConfig,
    pub(super) swap_interval: SwapIntervalSetting,
    pub(super) shared: Arc<SharedBlitState>,
    pub(super) ready_tx: channel::Sender<BlitterResult<()>>,
}

/// ### English
/// Scanout buffer chain: `front` is on screen (`bo`), `queued` has been posted for flip but not
/// confirmed (`next_bo`).
///
/// ### 中文
/// 扫描输出缓冲链：`front` 为当前在屏缓冲（`bo`），`queued` 已提交 flip 但尚未确认（`next_bo`）。
#[derive(Debug, Default)]
struct FlipChain {
    front: Option<BufferRef>,
    queued: Option<BufferRef>,
}

impl FlipChain {
    /// ### English
    /// Presents the frame just drawn.
    ///
    /// The previous `front` is released only after the pageflip that replaced it on screen has
    /// completed.
    ///
    /// ### 中文
    /// 呈现刚绘制好的一帧。
    ///
    /// 之前的 `front` 只会在替换它的 pageflip 完成之后才被释放。
    fn present<A, P, D>(
        &mut self,
        window: NativeWindow,
        allocator: &mut A,
        pageflip: &mut P,
        device: &mut D,
    ) -> BlitterResult<()>
    where
        A: BufferAllocator,
        P: PageflipDriver,
        D: BlitDevice,
    {
        pageflip.wait_for_pageflip()?;

        if let Some(old) = self.front.take() {
            allocator.release_buffer(window, old);
        }
        self.front = self.queued.take();

        device.swap_buffers()?;

        let next = allocator
            .lock_front_buffer(window)
            .ok_or_else(|| BlitterError::presentation("failed to lock front buffer"))?;
        self.queued = Some(next);

        if let Err(err) = pageflip.post_flip(self.front, next) {
            warn!("Failed to post pageflip: {err}");
        }
        Ok(())
    }

    fn release_all<A: BufferAllocator>(&mut self, window: NativeWindow, allocator: &mut A) {
        if let Some(bo) = self.queued.take() {
            allocator.release_buffer(window, bo);
        }
        if let Some(bo) = self.front.take() {
            allocator.release_buffer(window, bo);
        }
    }
}

/// ### English
/// Worker thread entry. Returns once the worker reaches `Stopped`.
///
/// ### 中文
/// worker 线程入口。worker 进入 `Stopped` 后返回。
pub(super) fn run_worker<A, P, F>(parts: WorkerParts<A, P, F>)
where
    A: BufferAllocator,
    P: PageflipDriver,
    F: DeviceFactory,
{
    let WorkerParts {
        mut allocator,
        mut pageflip,
        device_factory,
        config,
        swap_interval,
        shared,
        ready_tx,
    } = parts;

    let window = match allocator.create_surface(
        config.viewport,
        FORMAT_ARGB8888,
        USAGE_SCANOUT | USAGE_RENDERING,
    ) {
        Ok(window) => window,
        Err(err) => {
            error!("Failed to create scanout surface: {err}");
            finish(&shared);
            let _ = ready_tx.send(Err(err));
            return;
        }
    };

    let mut device = match device_factory.create(window) {
        Ok(device) => device,
        Err(err) => {
            error!("Failed to set up blit device: {err}");
            allocator.destroy_surface(window);
            finish(&shared);
            let _ = ready_tx.send(Err(err));
            return;
        }
    };

    shared.set_state(WorkerState::Ready);
    info!(
        viewport = ?config.viewport,
        plane = ?config.plane,
        rotation = ?config.rotation,
        filter = ?config.filter,
        "Blitter worker ready"
    );
    let _ = ready_tx.send(Ok(()));

    let mut planes = PlaneSlots::new();
    let mut chain = FlipChain::default();
    let mut applied_interval: Option<i32> = None;

    loop {
        shared.set_state(WorkerState::Waiting);
        let Some(submission) = shared.wait_for_submission() else {
            debug!("Blitter worker observed stop");
            break;
        };

        shared.set_state(WorkerState::Drawing);

        let interval = swap_interval.get();
        if applied_interval != Some(interval) {
            match device.apply_swap_interval(interval) {
                Ok(()) => {
                    debug!(interval, "Applied swap interval");
                    applied_interval = Some(interval);
                }
                Err(err) => warn!("Failed to apply swap interval {interval}: {err}"),
            }
        }

        if let Err(err) = draw_frame(&mut planes, submission, &allocator, &mut device) {
            /*
            ### English
            Import and fence failures only cost this frame. Anything else means the device can no
            longer draw, so the loop ends and draining runs.

            ### 中文
            导入与 fence 失败只丢弃当前帧。其他错误说明 device 已无法继续绘制，
            因此结束循环并进入回收流程。
            */
            if !err.is_frame_local() {
                error!("Drawing failed, stopping blitter worker: {err}");
                break;
            }
            warn!("Dropping frame: {err}");
            shared.count_dropped();
            continue;
        }
        shared.count_drawn();

        shared.set_state(WorkerState::Flipping);
        if let Err(err) = chain.present(window, &mut allocator, &mut pageflip, &mut device) {
            error!("Presentation failed, stopping blitter worker: {err}");
            break;
        }
        shared.count_flip();
    }

    /*
    ### English
    Draining: plane slots first (they need the device), then the device itself, then the scanout
    buffers and the surface.

    ### 中文
    回收：先回收 plane 槽位（需要 device），再销毁 device 本身，最后是扫描输出缓冲与表面。
    */
    shared.set_state(WorkerState::Draining);
    let leftover = shared.close();

    planes.retire_all(&mut device);
    if let Some(leftover) = leftover {
        device.destroy_fence(leftover.fence);
    }
    drop(device);

    chain.release_all(window, &mut allocator);
    allocator.destroy_surface(window);

    shared.set_state(WorkerState::Stopped);
    info!("Blitter worker stopped");
}

fn draw_frame<A, D>(
    planes: &mut PlaneSlots,
    submission: PlaneSubmission,
    allocator: &A,
    device: &mut D,
) -> BlitterResult<()>
where
    A: BufferAllocator,
    D: BlitDevice,
{
    planes.retire_previous(device);
    let texture = planes.load_next(submission, allocator, device)?;
    device.wait_fence(submission.fence)?;
    device.draw(texture);
    Ok(())
}

fn finish(shared: &SharedBlitState) {
    let _ = shared.close();
    shared.set_state(WorkerState::Stopped);
}
