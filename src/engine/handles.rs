//! ### English
//! Opaque native handles passed between the producer, the display layer, and the worker.
//!
//! None of these own the object they point at; ownership rules live with the code that
//! creates and releases them.
//!
//! ### 中文
//! 在生产者、显示层与 worker 之间传递的不透明原生句柄。
//!
//! 这些类型都不拥有所指向的对象；所有权规则由创建/释放它们的代码负责。
use std::ffi::c_void;
use std::ptr::NonNull;

macro_rules! opaque_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub struct $name(NonNull<c_void>);

        /* ### English
        Plain addresses; every dereference happens in the native library that issued them.

        ### 中文
        仅为地址值；所有解引用都发生在签发它们的原生库内部。
        */
        unsafe impl Send for $name {}
        unsafe impl Sync for $name {}

        impl $name {
            /// ### English
            /// Wraps a raw native pointer; null yields `None`.
            ///
            /// ### 中文
            /// 包装原生指针；空指针返回 `None`。
            #[inline]
            pub fn from_raw(ptr: *mut c_void) -> Option<Self> {
                NonNull::new(ptr).map(Self)
            }

            #[inline]
            pub fn as_ptr(self) -> *mut c_void {
                self.0.as_ptr()
            }
        }
    };
}

opaque_handle!(
    /// ### English
    /// Native buffer object (`gbm_bo*`). Owned by the surface allocator, never by a plane.
    ///
    /// ### 中文
    /// 原生缓冲对象（`gbm_bo*`）。由 surface 分配器持有，绝不由 plane 持有。
    BufferRef
);

opaque_handle!(
    /// ### English
    /// Native scanout surface (`gbm_surface*`), used as the EGL native window.
    ///
    /// ### 中文
    /// 原生扫描输出表面（`gbm_surface*`），用作 EGL native window。
    NativeWindow
);

opaque_handle!(
    /// ### English
    /// GPU completion fence (`EGLSyncKHR`) created by the producer after rendering a plane.
    ///
    /// ### 中文
    /// 生产者渲染完 plane 后创建的 GPU 完成 fence（`EGLSyncKHR`）。
    FenceHandle
);

opaque_handle!(
    /// ### English
    /// Imported GPU image (`EGLImageKHR`).
    ///
    /// ### 中文
    /// 导入后的 GPU 图像（`EGLImageKHR`）。
    ImageHandle
);

/// ### English
/// GL texture name. `TextureId::INVALID` marks a retired plane; it is never a name GL hands out
/// in practice, unlike `0`, which is the default texture.
///
/// ### 中文
/// GL 纹理名。`TextureId::INVALID` 标记已退役的 plane；与默认纹理 `0` 不同，
/// GL 实际上不会分配这个值。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

impl TextureId {
    pub const INVALID: Self = Self(u32::MAX);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID && self.0 != 0
    }
}

impl Default for TextureId {
    fn default() -> Self {
        Self::INVALID
    }
}

/// ### English
/// Backing description of a native buffer, as reported by the allocator.
///
/// `fd` is a freshly exported dma-buf descriptor owned by the caller (negative on failure).
///
/// ### 中文
/// 分配器报告的原生缓冲底层描述。
///
/// `fd` 是新导出的 dma-buf 描述符，由调用方持有（失败时为负数）。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferDescriptor {
    pub fd: i32,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
}

/// ### English
/// One producer frame handed to the worker: the buffer it rendered into and its completion fence.
///
/// Once accepted, the fence belongs to the blitter and is destroyed when the plane retires.
///
/// ### 中文
/// 交给 worker 的一帧：生产者渲染的目标缓冲及其完成 fence。
///
/// 一旦被接收，fence 即归 blitter 所有，并在 plane 退役时销毁。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaneSubmission {
    pub buffer: BufferRef,
    pub fence: FenceHandle,
}
