//! ### English
//! C ABI bindings for the blitter lifecycle (start/submit/stop) and its observability.
//!
//! ### 中文
//! blitter 生命周期（start/submit/stop）及其可观测性相关的 C ABI 绑定。
use std::ffi::c_void;

use dpi::PhysicalSize;
use tracing::error;

use super::host::host_collaborators;
use super::{
    KMSDRM_BLITTER_SUBMIT_QUEUED, KMSDRM_BLITTER_SUBMIT_REJECTED,
    KMSDRM_BLITTER_SUBMIT_SUPERSEDED, KmsdrmBlitter, KmsdrmBlitterInit, KmsdrmBlitterPlane,
    KmsdrmBlitterStats,
};
use crate::engine::rendering::{EglDisplayConnection, egl_device_factory};
use crate::engine::{
    Blitter, BlitterConfig, BlitterError, BlitterInit, BlitterResult, BufferRef, FenceHandle,
    PlaneSubmission, Rotation, SubmitOutcome, SwapIntervalSetting,
};

fn start(init: &KmsdrmBlitterInit) -> BlitterResult<KmsdrmBlitter> {
    if init.egl_display.is_null() {
        return Err(BlitterError::configuration("EGL not initialized"));
    }
    let rotation = Rotation::from_index(init.rotation).ok_or_else(|| {
        BlitterError::configuration(format!("rotation index {} out of range", init.rotation))
    })?;
    let config = BlitterConfig::new(
        PhysicalSize::new(init.viewport_width, init.viewport_height),
        PhysicalSize::new(init.plane_width, init.plane_height),
        rotation,
    );
    config.validate()?;

    let (allocator, pageflip) = host_collaborators(&init.callbacks)?;
    let connection = EglDisplayConnection {
        display: init.egl_display,
        config: init.egl_config,
        api: init.egl_api,
        context_flags: init.egl_context_flags,
    };
    let swap_interval = SwapIntervalSetting::new(init.swap_interval);

    let blitter = Blitter::start(BlitterInit {
        allocator,
        pageflip,
        device_factory: egl_device_factory(connection, config),
        config,
        swap_interval: swap_interval.clone(),
    })?;

    Ok(KmsdrmBlitter {
        blitter,
        swap_interval,
    })
}

#[unsafe(no_mangle)]
/// ### English
/// Starts the blitter worker and blocks until it is ready.
///
/// Returns NULL on any setup failure (the reason is logged); everything the worker created has
/// been released by then.
///
/// ### 中文
/// 启动 blitter worker，并阻塞等待其就绪。
///
/// 任何初始化失败都返回 NULL（原因会记录日志）；此时 worker 创建的资源都已释放。
pub unsafe extern "C" fn kmsdrm_blitter_start(init: *const KmsdrmBlitterInit) -> *mut KmsdrmBlitter {
    if init.is_null() {
        return std::ptr::null_mut();
    }

    match start(unsafe { &*init }) {
        Ok(blitter) => Box::into_raw(Box::new(blitter)),
        Err(err) => {
            error!("Failed to start blitter: {err}");
            std::ptr::null_mut()
        }
    }
}

#[unsafe(no_mangle)]
/// ### English
/// Hands a rendered plane to the worker.
///
/// - `KMSDRM_BLITTER_SUBMIT_QUEUED`: accepted; the blitter owns `fence`.
/// - `KMSDRM_BLITTER_SUBMIT_SUPERSEDED`: accepted; `out` receives the older plane it replaced, whose
///   fence is the caller's again.
/// - `KMSDRM_BLITTER_SUBMIT_REJECTED`: not accepted (stopping, or NULL arguments); `out` receives
///   the given plane back.
///
/// `out` may be NULL.
///
/// ### 中文
/// 将渲染完成的 plane 交给 worker。
///
/// - `KMSDRM_BLITTER_SUBMIT_QUEUED`：已接收；`fence` 归 blitter 所有。
/// - `KMSDRM_BLITTER_SUBMIT_SUPERSEDED`：已接收；`out` 写入被替换的旧 plane，其 fence 重新归调用方。
/// - `KMSDRM_BLITTER_SUBMIT_REJECTED`：未接收（正在停止或参数为 NULL）；`out` 写回传入的 plane。
///
/// `out` 可以为 NULL。
pub unsafe extern "C" fn kmsdrm_blitter_submit(
    blitter: *mut KmsdrmBlitter,
    bo: *mut c_void,
    fence: *mut c_void,
    out: *mut KmsdrmBlitterPlane,
) -> u32 {
    let (result, returned) = match (
        unsafe { blitter.as_ref() },
        BufferRef::from_raw(bo),
        FenceHandle::from_raw(fence),
    ) {
        (Some(handle), Some(buffer), Some(fence)) => {
            match handle.blitter.submit(PlaneSubmission { buffer, fence }) {
                SubmitOutcome::Queued => (KMSDRM_BLITTER_SUBMIT_QUEUED, KmsdrmBlitterPlane::default()),
                SubmitOutcome::Superseded(previous) => {
                    (KMSDRM_BLITTER_SUBMIT_SUPERSEDED, previous.into())
                }
                SubmitOutcome::Rejected(submission) => {
                    (KMSDRM_BLITTER_SUBMIT_REJECTED, submission.into())
                }
            }
        }
        _ => (KMSDRM_BLITTER_SUBMIT_REJECTED, KmsdrmBlitterPlane { bo, fence }),
    };

    if !out.is_null() {
        unsafe { *out = returned };
    }
    result
}

#[unsafe(no_mangle)]
/// ### English
/// Updates the swap interval; the worker applies it before its next frame.
///
/// ### 中文
/// 更新 swap interval；worker 会在下一帧之前应用。
pub unsafe extern "C" fn kmsdrm_blitter_set_swap_interval(blitter: *mut KmsdrmBlitter, interval: i32) {
    let Some(handle) = (unsafe { blitter.as_ref() }) else {
        return;
    };
    handle.swap_interval.set(interval);
}

#[unsafe(no_mangle)]
/// ### English
/// Returns the worker state as its numeric value (`Starting = 0` .. `Stopped = 6`).
/// NULL reads as `Stopped`.
///
/// ### 中文
/// 以数值返回 worker 状态（`Starting = 0` .. `Stopped = 6`）。NULL 视为 `Stopped`。
pub unsafe extern "C" fn kmsdrm_blitter_state(blitter: *const KmsdrmBlitter) -> u32 {
    match unsafe { blitter.as_ref() } {
        Some(handle) => handle.blitter.state() as u32,
        None => crate::engine::WorkerState::Stopped as u32,
    }
}

#[unsafe(no_mangle)]
/// ### English
/// Copies the worker counters into `out`. Returns `false` if either pointer is NULL.
///
/// ### 中文
/// 将 worker 计数器复制到 `out`。任一指针为 NULL 时返回 `false`。
pub unsafe extern "C" fn kmsdrm_blitter_stats(
    blitter: *const KmsdrmBlitter,
    out: *mut KmsdrmBlitterStats,
) -> bool {
    let Some(handle) = (unsafe { blitter.as_ref() }) else {
        return false;
    };
    if out.is_null() {
        return false;
    }
    unsafe { *out = handle.blitter.stats().into() };
    true
}

#[unsafe(no_mangle)]
/// ### English
/// Stops the worker, releases every plane and scanout resource, and frees the handle.
/// NULL is a no-op.
///
/// ### 中文
/// 停止 worker，释放所有 plane 与扫描输出资源，并释放句柄。NULL 时不做任何事。
pub unsafe extern "C" fn kmsdrm_blitter_stop(blitter: *mut KmsdrmBlitter) {
    if blitter.is_null() {
        return;
    }
    let KmsdrmBlitter { blitter, .. } = *unsafe { Box::from_raw(blitter) };
    if let Err(err) = blitter.stop() {
        error!("Blitter stop failed: {err}");
    }
}
