//! ### English
//! EGL types, constants, and the function table the blitter resolves at runtime.
//!
//! `eglGetProcAddress` is looked up with `dlsym`; every other entry point is resolved through it.
//!
//! ### 中文
//! blitter 在运行时解析的 EGL 类型、常量与函数表。
//!
//! `eglGetProcAddress` 通过 `dlsym` 查找；其它入口函数都通过它解析。
use std::ffi::{CStr, CString, c_char, c_void};

use tracing::error;

use crate::engine::error::{BlitterError, BlitterResult};

use super::loader::{DynamicLibrary, cast_symbol};

pub type EGLDisplay = *mut c_void;
pub type EGLConfig = *mut c_void;
pub type EGLContext = *mut c_void;
pub type EGLSurface = *mut c_void;
pub type EGLImageKHR = *mut c_void;
pub type EGLSyncKHR = *mut c_void;
pub type EGLClientBuffer = *mut c_void;
pub type EGLNativeWindowType = *mut c_void;
pub type EGLint = i32;
pub type EGLenum = u32;
pub type EGLBoolean = u32;
pub type EGLTimeKHR = u64;

pub const EGL_FALSE: EGLBoolean = 0;
pub const EGL_NONE: EGLint = 0x3038;
pub const EGL_HEIGHT: EGLint = 0x3056;
pub const EGL_WIDTH: EGLint = 0x3057;

pub const EGL_CONTEXT_MAJOR_VERSION_KHR: EGLint = 0x3098;
pub const EGL_CONTEXT_MINOR_VERSION_KHR: EGLint = 0x30FB;
pub const EGL_CONTEXT_FLAGS_KHR: EGLint = 0x30FC;

pub const EGL_LINUX_DMA_BUF_EXT: EGLenum = 0x3270;
pub const EGL_LINUX_DRM_FOURCC_EXT: EGLint = 0x3271;
pub const EGL_DMA_BUF_PLANE0_FD_EXT: EGLint = 0x3272;
pub const EGL_DMA_BUF_PLANE0_OFFSET_EXT: EGLint = 0x3273;
pub const EGL_DMA_BUF_PLANE0_PITCH_EXT: EGLint = 0x3274;

pub const EGL_SYNC_FLUSH_COMMANDS_BIT_KHR: EGLint = 0x0001;
pub const EGL_FOREVER_KHR: EGLTimeKHR = u64::MAX;
pub const EGL_TIMEOUT_EXPIRED_KHR: EGLint = 0x30F5;
pub const EGL_CONDITION_SATISFIED_KHR: EGLint = 0x30F6;

pub const EGL_NO_CONTEXT: EGLContext = std::ptr::null_mut();
pub const EGL_NO_SURFACE: EGLSurface = std::ptr::null_mut();

type EglGetProcAddress = unsafe extern "C" fn(*const c_char) -> *mut c_void;
type EglGetError = unsafe extern "C" fn() -> EGLint;
type EglBindApi = unsafe extern "C" fn(EGLenum) -> EGLBoolean;
type EglCreateContext =
    unsafe extern "C" fn(EGLDisplay, EGLConfig, EGLContext, *const EGLint) -> EGLContext;
type EglDestroyContext = unsafe extern "C" fn(EGLDisplay, EGLContext) -> EGLBoolean;
type EglCreateWindowSurface =
    unsafe extern "C" fn(EGLDisplay, EGLConfig, EGLNativeWindowType, *const EGLint) -> EGLSurface;
type EglDestroySurface = unsafe extern "C" fn(EGLDisplay, EGLSurface) -> EGLBoolean;
type EglMakeCurrent =
    unsafe extern "C" fn(EGLDisplay, EGLSurface, EGLSurface, EGLContext) -> EGLBoolean;
type EglSwapBuffers = unsafe extern "C" fn(EGLDisplay, EGLSurface) -> EGLBoolean;
type EglSwapInterval = unsafe extern "C" fn(EGLDisplay, EGLint) -> EGLBoolean;
type EglReleaseThread = unsafe extern "C" fn() -> EGLBoolean;
type EglCreateImageKhr = unsafe extern "C" fn(
    EGLDisplay,
    EGLContext,
    EGLenum,
    EGLClientBuffer,
    *const EGLint,
) -> EGLImageKHR;
type EglDestroyImageKhr = unsafe extern "C" fn(EGLDisplay, EGLImageKHR) -> EGLBoolean;
type EglClientWaitSyncKhr = unsafe extern "C" fn(EGLDisplay, EGLSyncKHR, EGLint, EGLTimeKHR) -> EGLint;
type EglDestroySyncKhr = unsafe extern "C" fn(EGLDisplay, EGLSyncKHR) -> EGLBoolean;
type GlEglImageTargetTexture2dOes = unsafe extern "C" fn(u32, *mut c_void);

const EGL_LIBRARIES: &[&CStr] = &[c"libEGL.so.1", c"libEGL.so"];
const GLES_LIBRARIES: &[&CStr] = &[c"libGLESv2.so.2", c"libGLESv2.so"];

/// ### English
/// Resolved EGL/GLES entry points. Keeps both libraries loaded for as long as it lives.
///
/// ### 中文
/// 已解析的 EGL/GLES 入口函数。存活期间保持两个库处于加载状态。
pub struct EglApi {
    get_proc_address: EglGetProcAddress,
    pub get_error: EglGetError,
    pub bind_api: EglBindApi,
    pub create_context: EglCreateContext,
    pub destroy_context: EglDestroyContext,
    pub create_window_surface: EglCreateWindowSurface,
    pub destroy_surface: EglDestroySurface,
    pub make_current: EglMakeCurrent,
    pub swap_buffers: EglSwapBuffers,
    pub swap_interval: EglSwapInterval,
    pub release_thread: EglReleaseThread,
    pub create_image: EglCreateImageKhr,
    pub destroy_image: EglDestroyImageKhr,
    pub client_wait_sync: EglClientWaitSyncKhr,
    pub destroy_sync: EglDestroySyncKhr,
    pub image_target_texture_2d: GlEglImageTargetTexture2dOes,
    gles: DynamicLibrary,
    _egl: DynamicLibrary,
}

impl EglApi {
    /// ### English
    /// Loads `libEGL` and `libGLESv2` and resolves every entry point the blitter uses.
    ///
    /// Every missing entry point is logged before the error is returned.
    ///
    /// ### 中文
    /// 加载 `libEGL` 与 `libGLESv2`，并解析 blitter 用到的所有入口函数。
    ///
    /// 返回错误前会逐一记录所有缺失的入口函数。
    pub fn load() -> BlitterResult<Self> {
        let egl = DynamicLibrary::open_first(EGL_LIBRARIES)?;
        let gles = DynamicLibrary::open_first(GLES_LIBRARIES)?;

        let get_proc_address: EglGetProcAddress =
            unsafe { egl.symbol(c"eglGetProcAddress") }.ok_or_else(|| {
                BlitterError::resource_load(format!(
                    "could not locate eglGetProcAddress in {:?}",
                    egl.name()
                ))
            })?;

        let mut missing: Vec<&'static CStr> = Vec::new();
        let mut resolve = |name: &'static CStr| -> *mut c_void {
            let addr = unsafe { get_proc_address(name.as_ptr()) };
            if addr.is_null() {
                error!("Failed to load {name:?}");
                missing.push(name);
            }
            addr
        };

        let get_error = resolve(c"eglGetError");
        let bind_api = resolve(c"eglBindAPI");
        let create_context = resolve(c"eglCreateContext");
        let destroy_context = resolve(c"eglDestroyContext");
        let create_window_surface = resolve(c"eglCreateWindowSurface");
        let destroy_surface = resolve(c"eglDestroySurface");
        let make_current = resolve(c"eglMakeCurrent");
        let swap_buffers = resolve(c"eglSwapBuffers");
        let swap_interval = resolve(c"eglSwapInterval");
        let release_thread = resolve(c"eglReleaseThread");
        let create_image = resolve(c"eglCreateImageKHR");
        let destroy_image = resolve(c"eglDestroyImageKHR");
        let client_wait_sync = resolve(c"eglClientWaitSyncKHR");
        let destroy_sync = resolve(c"eglDestroySyncKHR");
        let image_target_texture_2d = resolve(c"glEGLImageTargetTexture2DOES");

        if !missing.is_empty() {
            return Err(BlitterError::resource_load(format!(
                "missing entry points: {missing:?}"
            )));
        }

        /* ### English
        SAFETY: every address above is non-null and was resolved by the name matching its type.

        ### 中文
        SAFETY：以上每个地址都非空，且由与其类型相符的名称解析得到。
        */
        unsafe {
            Ok(Self {
                get_proc_address,
                get_error: cast(get_error)?,
                bind_api: cast(bind_api)?,
                create_context: cast(create_context)?,
                destroy_context: cast(destroy_context)?,
                create_window_surface: cast(create_window_surface)?,
                destroy_surface: cast(destroy_surface)?,
                make_current: cast(make_current)?,
                swap_buffers: cast(swap_buffers)?,
                swap_interval: cast(swap_interval)?,
                release_thread: cast(release_thread)?,
                create_image: cast(create_image)?,
                destroy_image: cast(destroy_image)?,
                client_wait_sync: cast(client_wait_sync)?,
                destroy_sync: cast(destroy_sync)?,
                image_target_texture_2d: cast(image_target_texture_2d)?,
                gles,
                _egl: egl,
            })
        }
    }

    /// ### English
    /// Latest EGL error code for the calling thread.
    ///
    /// ### 中文
    /// 调用线程最近一次的 EGL 错误码。
    pub fn last_error(&self) -> EGLint {
        unsafe { (self.get_error)() }
    }

    /// ### English
    /// GL loader for `glow`: `eglGetProcAddress` first, then the GLES library's own exports.
    ///
    /// ### 中文
    /// 供 `glow` 使用的 GL 加载函数：先查 `eglGetProcAddress`，再查 GLES 库自身导出的符号。
    pub fn gl_proc_address(&self, name: &str) -> *const c_void {
        let Ok(name) = CString::new(name) else {
            return std::ptr::null();
        };
        let addr = unsafe { (self.get_proc_address)(name.as_ptr()) };
        if !addr.is_null() {
            return addr;
        }
        self.gles.raw_symbol(&name)
    }
}

unsafe fn cast<T: Copy>(addr: *mut c_void) -> BlitterResult<T> {
    unsafe { cast_symbol(addr) }
        .ok_or_else(|| BlitterError::resource_load("entry point resolved to null"))
}
