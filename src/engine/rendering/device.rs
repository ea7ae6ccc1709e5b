//! ### English
//! EGL/GLES implementation of [`BlitDevice`].
//!
//! Everything here runs on the worker thread: the context is made current there and never leaves
//! it.
//!
//! ### 中文
//! [`BlitDevice`] 的 EGL/GLES 实现。
//!
//! 这里的一切都在 worker 线程上执行：上下文在该线程上设为 current，且不会离开该线程。
use std::os::fd::AsRawFd as _;

use glow::HasContext as _;
use tracing::{debug, warn};

use crate::engine::config::BlitterConfig;
use crate::engine::device::{BlitDevice, DmabufImport, ImportedImage};
use crate::engine::error::{BlitterError, BlitterResult};
use crate::engine::handles::{FenceHandle, ImageHandle, NativeWindow, TextureId};

use super::context::{EglDisplayConnection, GraphicsContext};
use super::egl::{
    EGL_CONDITION_SATISFIED_KHR, EGL_DMA_BUF_PLANE0_FD_EXT, EGL_DMA_BUF_PLANE0_OFFSET_EXT,
    EGL_DMA_BUF_PLANE0_PITCH_EXT, EGL_FALSE, EGL_FOREVER_KHR, EGL_HEIGHT, EGL_LINUX_DMA_BUF_EXT,
    EGL_LINUX_DRM_FOURCC_EXT, EGL_NO_CONTEXT, EGL_NONE, EGL_SYNC_FLUSH_COMMANDS_BIT_KHR,
    EGL_TIMEOUT_EXPIRED_KHR, EGL_WIDTH, EGLint, EglApi,
};
use super::pipeline::{BlitPipeline, native_texture};

/// ### English
/// Attribute list for importing a single-plane dma-buf with `eglCreateImageKHR`.
///
/// ### 中文
/// 使用 `eglCreateImageKHR` 导入单平面 dma-buf 的属性列表。
pub(crate) fn dmabuf_attributes(fd: EGLint, width: u32, height: u32, stride: u32, format: u32) -> [EGLint; 13] {
    [
        EGL_WIDTH,
        width as EGLint,
        EGL_HEIGHT,
        height as EGLint,
        EGL_LINUX_DRM_FOURCC_EXT,
        format as EGLint,
        EGL_DMA_BUF_PLANE0_OFFSET_EXT,
        0,
        EGL_DMA_BUF_PLANE0_PITCH_EXT,
        stride as EGLint,
        EGL_DMA_BUF_PLANE0_FD_EXT,
        fd,
        EGL_NONE,
    ]
}

/// ### English
/// The worker's GPU device: its own EGL context on the host display, plus the blit pipeline.
///
/// ### 中文
/// worker 的 GPU 设备：宿主 display 上的独立 EGL 上下文，以及 blit 管线。
pub struct EglBlitDevice {
    gl: glow::Context,
    context: GraphicsContext,
    pipeline: BlitPipeline,
    api: EglApi,
}

impl EglBlitDevice {
    /// ### English
    /// Resolves EGL/GLES, creates the context on `window`, and builds the pipeline for `config`.
    ///
    /// ### 中文
    /// 解析 EGL/GLES，在 `window` 上创建上下文，并为 `config` 构建管线。
    pub fn create(
        connection: &EglDisplayConnection,
        config: &BlitterConfig,
        window: NativeWindow,
    ) -> BlitterResult<Self> {
        config.validate()?;

        let api = EglApi::load()?;
        let mut context = GraphicsContext::create(&api, connection, window)?;

        let gl = unsafe { glow::Context::from_loader_function(|name| api.gl_proc_address(name)) };

        let pipeline = match BlitPipeline::new(&gl, config) {
            Ok(pipeline) => pipeline,
            Err(err) => {
                context.destroy(&api);
                return Err(err);
            }
        };

        debug!(
            gl_version = ?gl.version(),
            filter = ?config.filter,
            rotation = ?config.rotation,
            "Blit device ready"
        );

        Ok(Self {
            gl,
            context,
            pipeline,
            api,
        })
    }
}

/// ### English
/// Device factory for the worker: builds an [`EglBlitDevice`] once the scanout surface exists.
///
/// ### 中文
/// 供 worker 使用的 device 工厂：扫描输出表面创建后构建 [`EglBlitDevice`]。
pub fn egl_device_factory(
    connection: EglDisplayConnection,
    config: BlitterConfig,
) -> impl FnOnce(NativeWindow) -> BlitterResult<EglBlitDevice> + Send + 'static {
    move |window| EglBlitDevice::create(&connection, &config, window)
}

impl BlitDevice for EglBlitDevice {
    fn apply_swap_interval(&mut self, interval: i32) -> BlitterResult<()> {
        self.context.set_swap_interval(&self.api, interval)
    }

    fn import_dmabuf(&mut self, import: DmabufImport) -> BlitterResult<ImportedImage> {
        let display = self.context.display();
        let attribs = dmabuf_attributes(
            import.fd.as_raw_fd(),
            import.width,
            import.height,
            import.stride,
            import.format,
        );

        let raw = unsafe {
            (self.api.create_image)(
                display,
                EGL_NO_CONTEXT,
                EGL_LINUX_DMA_BUF_EXT,
                std::ptr::null_mut(),
                attribs.as_ptr(),
            )
        };
        /* ### English
        The image keeps its own reference to the dma-buf; our descriptor is closed either way.

        ### 中文
        图像自己持有 dma-buf 的引用；无论成功与否都关闭我们这份描述符。 */
        drop(import.fd);

        let Some(image) = ImageHandle::from_raw(raw) else {
            return Err(BlitterError::import(format!(
                "eglCreateImageKHR failed (EGL error 0x{:04x})",
                self.api.last_error()
            )));
        };

        let texture = match unsafe { self.gl.create_texture() } {
            Ok(texture) => texture,
            Err(err) => {
                unsafe { (self.api.destroy_image)(display, image.as_ptr()) };
                return Err(BlitterError::import(err));
            }
        };

        unsafe {
            self.gl.active_texture(glow::TEXTURE0);
            self.gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::REPEAT as i32);
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::REPEAT as i32);
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
            (self.api.image_target_texture_2d)(glow::TEXTURE_2D, image.as_ptr());
        }

        Ok(ImportedImage {
            image,
            texture: TextureId(texture.0.get()),
        })
    }

    fn release_import(&mut self, imported: ImportedImage) {
        unsafe {
            if let Some(texture) = native_texture(imported.texture) {
                self.gl.delete_texture(texture);
            }
            if (self.api.destroy_image)(self.context.display(), imported.image.as_ptr()) == EGL_FALSE
            {
                warn!("eglDestroyImageKHR failed: 0x{:04x}", self.api.last_error());
            }
        }
    }

    fn wait_fence(&mut self, fence: FenceHandle) -> BlitterResult<()> {
        let status = unsafe {
            (self.api.client_wait_sync)(
                self.context.display(),
                fence.as_ptr(),
                EGL_SYNC_FLUSH_COMMANDS_BIT_KHR,
                EGL_FOREVER_KHR,
            )
        };
        match status {
            EGL_CONDITION_SATISFIED_KHR => Ok(()),
            EGL_TIMEOUT_EXPIRED_KHR => Err(BlitterError::sync("fence wait timed out")),
            _ => Err(BlitterError::sync(format!(
                "eglClientWaitSyncKHR failed (EGL error 0x{:04x})",
                self.api.last_error()
            ))),
        }
    }

    fn destroy_fence(&mut self, fence: FenceHandle) {
        if unsafe { (self.api.destroy_sync)(self.context.display(), fence.as_ptr()) } == EGL_FALSE {
            warn!("eglDestroySyncKHR failed: 0x{:04x}", self.api.last_error());
        }
    }

    fn draw(&mut self, texture: TextureId) {
        self.pipeline.clear(&self.gl);
        self.pipeline.blit(&self.gl, texture);
    }

    fn swap_buffers(&mut self) -> BlitterResult<()> {
        self.context.swap_buffers(&self.api)
    }
}

impl Drop for EglBlitDevice {
    fn drop(&mut self) {
        self.pipeline.destroy(&self.gl);
        self.context.destroy(&self.api);
    }
}
