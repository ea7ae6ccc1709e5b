//! ### English
//! Rendering module entry point.
//! EGL/GLES bindings, the blitter's own graphics context, the blit pipeline, and the
//! [`BlitDevice`](crate::engine::device::BlitDevice) built on them.
//!
//! ### 中文
//! 渲染模块入口。
//! EGL/GLES 绑定、blitter 自己的图形上下文、blit 管线，以及基于它们的
//! [`BlitDevice`](crate::engine::device::BlitDevice)。

mod context;
mod device;
mod egl;
mod loader;
mod pipeline;
mod shaders;

pub use context::EglDisplayConnection;
pub use device::{EglBlitDevice, egl_device_factory};
pub use egl::{EGLConfig, EGLDisplay, EGLenum, EGLint};
