//! ### English
//! C ABI surface for `kmsdrm_blitter`.
//!
//! All exported symbols are `extern "C"` functions; structs are `#[repr(C)]`.
//! Native handles (`gbm_surface*`, `gbm_bo*`, `EGLSyncKHR`, EGL display/config) cross the
//! boundary as plain pointers; null always means "absent".
//!
//! ### 中文
//! `kmsdrm_blitter` 的 C ABI 接口层。
//!
//! 所有导出符号均为 `extern "C"` 函数；结构体使用 `#[repr(C)]`。
//! 原生句柄（`gbm_surface*`、`gbm_bo*`、`EGLSyncKHR`、EGL display/config）以普通指针形式跨越边界；
//! 空指针始终表示“不存在”。
mod blitter;
mod host;

use std::ffi::c_void;

use crate::engine::{Blitter, BlitterStats, PlaneSubmission, SwapIntervalSetting};

pub use host::{KmsdrmBlitterBufferInfo, KmsdrmBlitterHostCallbacks};

/// ### English
/// C ABI version for `kmsdrm_blitter`.
///
/// ### 中文
/// `kmsdrm_blitter` 的 C ABI 版本号。
const KMSDRM_BLITTER_ABI_VERSION: u32 = 1;

#[unsafe(no_mangle)]
/// ### English
/// Returns the C ABI version. Hosts compare it against the header they were built with before
/// filling a `KmsdrmBlitterInit`, whose layout is tied to this number.
///
/// ### 中文
/// 返回 C ABI 版本号。宿主在填写 `KmsdrmBlitterInit` 之前应与编译时头文件的版本比较，
/// 该结构体布局与此版本号绑定。
pub extern "C" fn kmsdrm_blitter_abi_version() -> u32 {
    KMSDRM_BLITTER_ABI_VERSION
}

/// ### English
/// `kmsdrm_blitter_submit` results.
///
/// ### 中文
/// `kmsdrm_blitter_submit` 的返回值。
pub const KMSDRM_BLITTER_SUBMIT_QUEUED: u32 = 0;
pub const KMSDRM_BLITTER_SUBMIT_SUPERSEDED: u32 = 1;
pub const KMSDRM_BLITTER_SUBMIT_REJECTED: u32 = 2;

/// ### English
/// Opaque blitter handle owning the worker thread.
///
/// ### 中文
/// 不透明 blitter 句柄，持有 worker 线程。
pub struct KmsdrmBlitter {
    blitter: Blitter,
    /// ### English
    /// Shared with the worker; writes are picked up on its next frame.
    ///
    /// ### 中文
    /// 与 worker 共享；写入会在其下一帧生效。
    swap_interval: SwapIntervalSetting,
}

#[repr(C)]
/// ### English
/// Everything `kmsdrm_blitter_start` needs from the host display backend.
///
/// ### 中文
/// `kmsdrm_blitter_start` 需要宿主显示后端提供的全部信息。
pub struct KmsdrmBlitterInit {
    /// ### English
    /// Initialized `EGLDisplay`; must stay initialized until `kmsdrm_blitter_stop` returns.
    ///
    /// ### 中文
    /// 已初始化的 `EGLDisplay`；在 `kmsdrm_blitter_stop` 返回前必须保持初始化状态。
    pub egl_display: *mut c_void,
    pub egl_config: *mut c_void,
    /// ### English
    /// Client API for `eglBindAPI` (normally `EGL_OPENGL_ES_API`).
    ///
    /// ### 中文
    /// `eglBindAPI` 的客户端 API（通常为 `EGL_OPENGL_ES_API`）。
    pub egl_api: u32,
    /// ### English
    /// `EGL_CONTEXT_FLAGS_KHR` value, or 0 for none.
    ///
    /// ### 中文
    /// `EGL_CONTEXT_FLAGS_KHR` 的值；0 表示不设置。
    pub egl_context_flags: i32,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub plane_width: u32,
    pub plane_height: u32,
    /// ### English
    /// Quarter turns, `0..=3`.
    ///
    /// ### 中文
    /// 四分之一圈数，`0..=3`。
    pub rotation: u32,
    /// ### English
    /// Initial swap interval.
    ///
    /// ### 中文
    /// 初始 swap interval。
    pub swap_interval: i32,
    pub callbacks: KmsdrmBlitterHostCallbacks,
}

#[repr(C)]
/// ### English
/// A producer plane crossing the C boundary (`gbm_bo*` + `EGLSyncKHR`).
///
/// ### 中文
/// 跨越 C 边界的生产者 plane（`gbm_bo*` + `EGLSyncKHR`）。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KmsdrmBlitterPlane {
    pub bo: *mut c_void,
    pub fence: *mut c_void,
}

impl Default for KmsdrmBlitterPlane {
    fn default() -> Self {
        Self {
            bo: std::ptr::null_mut(),
            fence: std::ptr::null_mut(),
        }
    }
}

impl From<PlaneSubmission> for KmsdrmBlitterPlane {
    fn from(value: PlaneSubmission) -> Self {
        Self {
            bo: value.buffer.as_ptr(),
            fence: value.fence.as_ptr(),
        }
    }
}

#[repr(C)]
/// ### English
/// Worker counters.
///
/// ### 中文
/// worker 计数器。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KmsdrmBlitterStats {
    pub frames_drawn: u64,
    pub frames_dropped: u64,
    pub flips: u64,
}

impl From<BlitterStats> for KmsdrmBlitterStats {
    fn from(value: BlitterStats) -> Self {
        Self {
            frames_drawn: value.frames_drawn,
            frames_dropped: value.frames_dropped,
            flips: value.flips,
        }
    }
}
