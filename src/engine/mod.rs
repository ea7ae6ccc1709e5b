/// ### English
/// Blitter internals: configuration, the display and GPU seams, plane bookkeeping, the worker
/// loop, and the EGL/GLES rendering backend.
///
/// ### 中文
/// blitter 内部模块：配置、显示与 GPU 接口、plane 管理、worker 循环，以及 EGL/GLES 渲染后端。
pub mod blitter;
pub mod config;
pub mod device;
pub mod display;
pub mod error;
pub mod geometry;
pub mod handles;
pub mod plane;
pub mod rendering;

#[cfg(test)]
pub(crate) mod testing;

pub use blitter::{
    Blitter, BlitterInit, BlitterMonitor, BlitterStats, SubmitOutcome, WorkerState,
};
pub use config::{BlitterConfig, FilterKernel, Rotation, SwapIntervalSetting};
pub use error::{BlitterError, BlitterResult};
pub use handles::{BufferRef, FenceHandle, NativeWindow, PlaneSubmission};
