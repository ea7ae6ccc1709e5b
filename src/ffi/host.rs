//! ### English
//! Adapters that let a C display backend act as the blitter's allocator and pageflip driver.
//!
//! ### 中文
//! 让 C 显示后端充当 blitter 分配器与 pageflip 驱动的适配层。
use std::ffi::c_void;

use dpi::PhysicalSize;

use crate::engine::display::{BufferAllocator, PageflipDriver};
use crate::engine::error::{BlitterError, BlitterResult};
use crate::engine::handles::{BufferDescriptor, BufferRef, NativeWindow};

#[repr(C)]
/// ### English
/// Backing description of a `gbm_bo`, filled by `describe_buffer`.
///
/// `fd` must be a newly exported dma-buf descriptor (ownership passes to the blitter), or
/// negative on failure.
///
/// ### 中文
/// `gbm_bo` 的底层描述，由 `describe_buffer` 填写。
///
/// `fd` 必须是新导出的 dma-buf 描述符（所有权交给 blitter）；失败时为负数。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KmsdrmBlitterBufferInfo {
    pub fd: i32,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
}

impl Default for KmsdrmBlitterBufferInfo {
    fn default() -> Self {
        Self {
            fd: -1,
            width: 0,
            height: 0,
            stride: 0,
        }
    }
}

impl From<KmsdrmBlitterBufferInfo> for BufferDescriptor {
    fn from(value: KmsdrmBlitterBufferInfo) -> Self {
        Self {
            fd: value.fd,
            width: value.width,
            height: value.height,
            stride: value.stride,
        }
    }
}

type CreateSurfaceFn =
    unsafe extern "C" fn(user_data: *mut c_void, width: u32, height: u32, format: u32, usage: u32)
        -> *mut c_void;
type LockFrontBufferFn = unsafe extern "C" fn(user_data: *mut c_void, surface: *mut c_void) -> *mut c_void;
type ReleaseBufferFn = unsafe extern "C" fn(user_data: *mut c_void, surface: *mut c_void, bo: *mut c_void);
type DestroySurfaceFn = unsafe extern "C" fn(user_data: *mut c_void, surface: *mut c_void);
type DescribeBufferFn =
    unsafe extern "C" fn(user_data: *mut c_void, bo: *mut c_void, out: *mut KmsdrmBlitterBufferInfo);
type WaitPageflipFn = unsafe extern "C" fn(user_data: *mut c_void) -> bool;
type PostFlipFn = unsafe extern "C" fn(user_data: *mut c_void, current: *mut c_void, next: *mut c_void) -> bool;

#[repr(C)]
/// ### English
/// Host callback table. Every callback is invoked on the blitter's worker thread with
/// `user_data` as its first argument.
///
/// ### 中文
/// 宿主回调表。所有回调都在 blitter 的 worker 线程上调用，第一个参数为 `user_data`。
#[derive(Clone, Copy)]
pub struct KmsdrmBlitterHostCallbacks {
    pub user_data: *mut c_void,
    pub create_surface: Option<CreateSurfaceFn>,
    pub lock_front_buffer: Option<LockFrontBufferFn>,
    pub release_buffer: Option<ReleaseBufferFn>,
    pub destroy_surface: Option<DestroySurfaceFn>,
    pub describe_buffer: Option<DescribeBufferFn>,
    /// ### English
    /// Blocks until the last posted flip completed. Returns `false` when the display is gone.
    ///
    /// ### 中文
    /// 阻塞直到上一次提交的 flip 完成。显示已不可用时返回 `false`。
    pub wait_pageflip: Option<WaitPageflipFn>,
    /// ### English
    /// Posts a flip from `current` (may be null) to `next`.
    ///
    /// ### 中文
    /// 提交从 `current`（可为空）到 `next` 的 flip。
    pub post_flip: Option<PostFlipFn>,
}

/// ### English
/// Callback table with every entry checked present.
///
/// ### 中文
/// 所有条目都已确认存在的回调表。
#[derive(Clone, Copy)]
struct HostTable {
    user_data: *mut c_void,
    create_surface: CreateSurfaceFn,
    lock_front_buffer: LockFrontBufferFn,
    release_buffer: ReleaseBufferFn,
    destroy_surface: DestroySurfaceFn,
    describe_buffer: DescribeBufferFn,
    wait_pageflip: WaitPageflipFn,
    post_flip: PostFlipFn,
}

/// ### English
/// The host promises its callbacks and `user_data` may be used from the worker thread.
///
/// ### 中文
/// 宿主保证其回调与 `user_data` 可以在 worker 线程中使用。
unsafe impl Send for HostTable {}

impl HostTable {
    fn new(callbacks: &KmsdrmBlitterHostCallbacks) -> BlitterResult<Self> {
        fn require<T>(callback: Option<T>, name: &str) -> BlitterResult<T> {
            callback.ok_or_else(|| {
                BlitterError::configuration(format!("host callback `{name}` is missing"))
            })
        }

        Ok(Self {
            user_data: callbacks.user_data,
            create_surface: require(callbacks.create_surface, "create_surface")?,
            lock_front_buffer: require(callbacks.lock_front_buffer, "lock_front_buffer")?,
            release_buffer: require(callbacks.release_buffer, "release_buffer")?,
            destroy_surface: require(callbacks.destroy_surface, "destroy_surface")?,
            describe_buffer: require(callbacks.describe_buffer, "describe_buffer")?,
            wait_pageflip: require(callbacks.wait_pageflip, "wait_pageflip")?,
            post_flip: require(callbacks.post_flip, "post_flip")?,
        })
    }
}

/// ### English
/// [`BufferAllocator`] backed by host callbacks.
///
/// ### 中文
/// 基于宿主回调的 [`BufferAllocator`]。
pub(super) struct HostAllocator(HostTable);

/// ### English
/// [`PageflipDriver`] backed by host callbacks.
///
/// ### 中文
/// 基于宿主回调的 [`PageflipDriver`]。
pub(super) struct HostPageflip(HostTable);

/// ### English
/// Validates `callbacks` and splits them into the two display-layer collaborators.
///
/// ### 中文
/// 校验 `callbacks`，并拆分为两个显示层协作者。
pub(super) fn host_collaborators(
    callbacks: &KmsdrmBlitterHostCallbacks,
) -> BlitterResult<(HostAllocator, HostPageflip)> {
    let table = HostTable::new(callbacks)?;
    Ok((HostAllocator(table), HostPageflip(table)))
}

impl BufferAllocator for HostAllocator {
    fn create_surface(
        &mut self,
        size: PhysicalSize<u32>,
        format: u32,
        usage: u32,
    ) -> BlitterResult<NativeWindow> {
        let raw = unsafe {
            (self.0.create_surface)(self.0.user_data, size.width, size.height, format, usage)
        };
        NativeWindow::from_raw(raw).ok_or_else(|| {
            BlitterError::configuration(format!(
                "failed to create {}x{} scanout surface",
                size.width, size.height
            ))
        })
    }

    fn lock_front_buffer(&mut self, surface: NativeWindow) -> Option<BufferRef> {
        BufferRef::from_raw(unsafe { (self.0.lock_front_buffer)(self.0.user_data, surface.as_ptr()) })
    }

    fn release_buffer(&mut self, surface: NativeWindow, buffer: BufferRef) {
        unsafe { (self.0.release_buffer)(self.0.user_data, surface.as_ptr(), buffer.as_ptr()) }
    }

    fn destroy_surface(&mut self, surface: NativeWindow) {
        unsafe { (self.0.destroy_surface)(self.0.user_data, surface.as_ptr()) }
    }

    fn describe(&self, buffer: BufferRef) -> BufferDescriptor {
        let mut info = KmsdrmBlitterBufferInfo::default();
        unsafe { (self.0.describe_buffer)(self.0.user_data, buffer.as_ptr(), &mut info) };
        info.into()
    }
}

impl PageflipDriver for HostPageflip {
    fn wait_for_pageflip(&mut self) -> BlitterResult<()> {
        if unsafe { (self.0.wait_pageflip)(self.0.user_data) } {
            Ok(())
        } else {
            Err(BlitterError::presentation("pageflip wait failed"))
        }
    }

    fn post_flip(&mut self, current: Option<BufferRef>, next: BufferRef) -> BlitterResult<()> {
        let current = current.map_or(std::ptr::null_mut(), BufferRef::as_ptr);
        if unsafe { (self.0.post_flip)(self.0.user_data, current, next.as_ptr()) } {
            Ok(())
        } else {
            Err(BlitterError::presentation("failed to post pageflip"))
        }
    }
}
