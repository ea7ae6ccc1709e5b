//! ### English
//! Display-layer collaborators injected into the worker: the scanout buffer allocator and the
//! pageflip driver.
//!
//! ### 中文
//! 注入 worker 的显示层协作者：扫描输出缓冲分配器与 pageflip 驱动。
use dpi::PhysicalSize;

use super::error::BlitterResult;
use super::handles::{BufferDescriptor, BufferRef, NativeWindow};

/// ### English
/// DRM fourcc `AR24` (32-bit ARGB), used for both the scanout surface and imported planes.
///
/// ### 中文
/// DRM fourcc `AR24`（32 位 ARGB），扫描输出表面与导入的 plane 都使用该格式。
pub const FORMAT_ARGB8888: u32 = fourcc(b'A', b'R', b'2', b'4');

/// ### English
/// Buffer may be scanned out by the display controller.
///
/// ### 中文
/// 缓冲可被显示控制器扫描输出。
pub const USAGE_SCANOUT: u32 = 1 << 0;

/// ### English
/// Buffer may be rendered into by the GPU.
///
/// ### 中文
/// 缓冲可被 GPU 渲染写入。
pub const USAGE_RENDERING: u32 = 1 << 2;

pub const fn fourcc(a: u8, b: u8, c: u8, d: u8) -> u32 {
    (a as u32) | ((b as u32) << 8) | ((c as u32) << 16) | ((d as u32) << 24)
}

/// ### English
/// Scanout buffer allocator (a GBM device in practice).
///
/// All calls are made from the worker thread.
///
/// ### 中文
/// 扫描输出缓冲分配器（实际上是 GBM 设备）。
///
/// 所有调用都发生在 worker 线程。
pub trait BufferAllocator: Send + 'static {
    /// ### English
    /// Creates the scanout surface the worker renders into.
    ///
    /// ### 中文
    /// 创建 worker 渲染目标的扫描输出表面。
    fn create_surface(
        &mut self,
        size: PhysicalSize<u32>,
        format: u32,
        usage: u32,
    ) -> BlitterResult<NativeWindow>;

    /// ### English
    /// Locks the buffer that the last swap made the front buffer, so it is not reused as a back
    /// buffer while it is (or is about to be) scanned out.
    ///
    /// ### 中文
    /// 锁定上一次 swap 产生的前缓冲，使其在（即将）被扫描输出期间不会被复用为后缓冲。
    fn lock_front_buffer(&mut self, surface: NativeWindow) -> Option<BufferRef>;

    /// ### English
    /// Returns a previously locked buffer to the surface.
    ///
    /// ### 中文
    /// 将之前锁定的缓冲归还给表面。
    fn release_buffer(&mut self, surface: NativeWindow, buffer: BufferRef);

    fn destroy_surface(&mut self, surface: NativeWindow);

    /// ### English
    /// Reports a buffer's backing descriptor, size, and row pitch. The returned fd is a new
    /// descriptor owned by the caller.
    ///
    /// ### 中文
    /// 报告缓冲的底层描述符、尺寸与行跨度。返回的 fd 是调用方持有的新描述符。
    fn describe(&self, buffer: BufferRef) -> BufferDescriptor;
}

/// ### English
/// Pageflip side of the display layer, driven by vblank / flip-complete events elsewhere.
///
/// ### 中文
/// 显示层的 pageflip 部分，由其它地方的 vblank / flip 完成事件驱动。
pub trait PageflipDriver: Send + 'static {
    /// ### English
    /// Blocks until the previously posted flip has completed.
    ///
    /// ### 中文
    /// 阻塞直到上一次提交的 flip 完成。
    fn wait_for_pageflip(&mut self) -> BlitterResult<()>;

    /// ### English
    /// Requests a flip from `current` (on screen, if any) to `next`.
    ///
    /// ### 中文
    /// 请求从 `current`（当前在屏，若有）翻转到 `next`。
    fn post_flip(&mut self, current: Option<BufferRef>, next: BufferRef) -> BlitterResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argb8888_fourcc_matches_drm() {
        assert_eq!(FORMAT_ARGB8888, 0x3432_5241);
    }
}
