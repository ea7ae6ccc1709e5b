//! ### English
//! Graphics context manager: creates the blitter's own EGL window surface and GLES 2.0 context on
//! the host's already-initialized EGL display.
//!
//! ### 中文
//! 图形上下文管理：在宿主已初始化的 EGL display 上，创建 blitter 自己的 EGL window surface 与
//! GLES 2.0 上下文。
use tracing::{debug, warn};

use crate::engine::error::{BlitterError, BlitterResult};
use crate::engine::handles::NativeWindow;

use super::egl::{
    EGL_CONTEXT_FLAGS_KHR, EGL_CONTEXT_MAJOR_VERSION_KHR, EGL_CONTEXT_MINOR_VERSION_KHR,
    EGL_FALSE, EGL_NO_CONTEXT, EGL_NO_SURFACE, EGL_NONE, EGLConfig, EGLContext, EGLDisplay,
    EGLSurface, EGLenum, EGLint, EglApi,
};

/// ### English
/// The host's EGL connection the blitter borrows. The host keeps the display initialized for the
/// blitter's whole lifetime.
///
/// ### 中文
/// blitter 借用的宿主 EGL 连接。宿主需在 blitter 整个生命周期内保持 display 处于初始化状态。
#[derive(Clone, Copy, Debug)]
pub struct EglDisplayConnection {
    pub display: EGLDisplay,
    pub config: EGLConfig,
    /// ### English
    /// Client API enum passed to `eglBindAPI` (e.g. `EGL_OPENGL_ES_API`).
    ///
    /// ### 中文
    /// 传给 `eglBindAPI` 的客户端 API 枚举（例如 `EGL_OPENGL_ES_API`）。
    pub api: EGLenum,
    /// ### English
    /// Context flags requested by the host; `0` omits the attribute.
    ///
    /// ### 中文
    /// 宿主请求的上下文标志；为 `0` 时不附加该属性。
    pub context_flags: EGLint,
}

/// ### English
/// Moved to the worker thread exactly once; EGL display handles are process-global.
///
/// ### 中文
/// 只会被移动到 worker 线程一次；EGL display 句柄在进程内全局有效。
unsafe impl Send for EglDisplayConnection {}

/// ### English
/// Attribute list for `eglCreateContext`: GLES 2.0, plus the host's context flags when set.
///
/// ### 中文
/// `eglCreateContext` 的属性列表：GLES 2.0，宿主设置了上下文标志时一并附加。
pub(crate) fn context_attributes(context_flags: EGLint) -> Vec<EGLint> {
    let mut attribs = vec![
        EGL_CONTEXT_MAJOR_VERSION_KHR,
        2,
        EGL_CONTEXT_MINOR_VERSION_KHR,
        0,
    ];
    if context_flags != 0 {
        attribs.extend([EGL_CONTEXT_FLAGS_KHR, context_flags]);
    }
    attribs.push(EGL_NONE);
    attribs
}

/// ### English
/// The blitter's EGL surface + context, current on the thread that created it.
///
/// ### 中文
/// blitter 的 EGL surface + 上下文，在创建它的线程上处于 current 状态。
pub struct GraphicsContext {
    display: EGLDisplay,
    surface: EGLSurface,
    context: EGLContext,
    destroyed: bool,
}

impl GraphicsContext {
    /// ### English
    /// Creates the window surface for `window`, binds the client API once, creates the context,
    /// and makes it current. Anything created before a failure is destroyed again.
    ///
    /// ### 中文
    /// 为 `window` 创建 window surface，绑定一次客户端 API，创建上下文并设为 current。
    /// 失败时会销毁失败前已创建的对象。
    pub fn create(
        api: &EglApi,
        connection: &EglDisplayConnection,
        window: NativeWindow,
    ) -> BlitterResult<Self> {
        if connection.display.is_null() {
            return Err(BlitterError::configuration("EGL not initialized"));
        }
        let display = connection.display;

        let surface = unsafe {
            (api.create_window_surface)(
                display,
                connection.config,
                window.as_ptr(),
                [EGL_NONE].as_ptr(),
            )
        };
        if surface == EGL_NO_SURFACE {
            return Err(native_error(api, "eglCreateWindowSurface"));
        }

        let mut this = Self {
            display,
            surface,
            context: EGL_NO_CONTEXT,
            destroyed: false,
        };

        let attribs = context_attributes(connection.context_flags);
        unsafe {
            if (api.bind_api)(connection.api) == EGL_FALSE {
                let err = native_error(api, "eglBindAPI");
                this.destroy(api);
                return Err(err);
            }
            this.context =
                (api.create_context)(display, connection.config, EGL_NO_CONTEXT, attribs.as_ptr());
        }
        if this.context == EGL_NO_CONTEXT {
            let err = native_error(api, "eglCreateContext");
            this.destroy(api);
            return Err(err);
        }

        if unsafe { (api.make_current)(display, surface, surface, this.context) } == EGL_FALSE {
            let err = native_error(api, "eglMakeCurrent");
            this.destroy(api);
            return Err(err);
        }

        debug!(flags = connection.context_flags, "Created blitter EGL context");
        Ok(this)
    }

    pub fn display(&self) -> EGLDisplay {
        self.display
    }

    /// ### English
    /// Presents the back buffer of the window surface.
    ///
    /// ### 中文
    /// 呈现 window surface 的后缓冲。
    pub fn swap_buffers(&self, api: &EglApi) -> BlitterResult<()> {
        if unsafe { (api.swap_buffers)(self.display, self.surface) } == EGL_FALSE {
            return Err(BlitterError::presentation(format!(
                "eglSwapBuffers failed (EGL error 0x{:04x})",
                api.last_error()
            )));
        }
        Ok(())
    }

    pub fn set_swap_interval(&self, api: &EglApi, interval: i32) -> BlitterResult<()> {
        if unsafe { (api.swap_interval)(self.display, interval) } == EGL_FALSE {
            return Err(native_error(api, "eglSwapInterval"));
        }
        Ok(())
    }

    /// ### English
    /// Releases the current binding, destroys the surface and the context, and releases the
    /// thread's EGL state (idempotent).
    ///
    /// ### 中文
    /// 解除 current 绑定，销毁 surface 与上下文，并释放线程的 EGL 状态（幂等）。
    pub fn destroy(&mut self, api: &EglApi) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        unsafe {
            (api.make_current)(self.display, EGL_NO_SURFACE, EGL_NO_SURFACE, EGL_NO_CONTEXT);
            if self.surface != EGL_NO_SURFACE
                && (api.destroy_surface)(self.display, self.surface) == EGL_FALSE
            {
                warn!("eglDestroySurface failed: 0x{:04x}", api.last_error());
            }
            if self.context != EGL_NO_CONTEXT
                && (api.destroy_context)(self.display, self.context) == EGL_FALSE
            {
                warn!("eglDestroyContext failed: 0x{:04x}", api.last_error());
            }
            (api.release_thread)();
        }
        self.surface = EGL_NO_SURFACE;
        self.context = EGL_NO_CONTEXT;
    }
}

fn native_error(api: &EglApi, call: &'static str) -> BlitterError {
    BlitterError::ContextCreation {
        call,
        code: api.last_error(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_request_gles2() {
        assert_eq!(
            context_attributes(0),
            vec![
                EGL_CONTEXT_MAJOR_VERSION_KHR,
                2,
                EGL_CONTEXT_MINOR_VERSION_KHR,
                0,
                EGL_NONE
            ]
        );
    }

    #[test]
    fn host_flags_are_forwarded() {
        let attribs = context_attributes(0x1);
        assert_eq!(&attribs[4..], &[EGL_CONTEXT_FLAGS_KHR, 0x1, EGL_NONE]);
    }
}
