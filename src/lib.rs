/// ### English
/// `kmsdrm_blitter` crate root (cdylib + rlib).
/// Rust hosts use the re-exported `engine` API; C display backends use the C ABI in `ffi`.
///
/// ### 中文
/// `kmsdrm_blitter` 的 crate 根（cdylib + rlib）。
/// Rust 宿主使用重新导出的 `engine` API；C 显示后端使用 `ffi` 中的 C ABI。
pub mod engine;
mod ffi;

pub use engine::{
    Blitter, BlitterConfig, BlitterError, BlitterInit, BlitterMonitor, BlitterResult,
    BlitterStats, BufferRef, FenceHandle, FilterKernel, NativeWindow, PlaneSubmission, Rotation,
    SubmitOutcome, SwapIntervalSetting, WorkerState,
};
pub use engine::rendering::{EglBlitDevice, EglDisplayConnection, egl_device_factory};
