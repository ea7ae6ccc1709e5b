//! ### English
//! GPU-side seam of the worker loop.
//!
//! Setup (context, pipeline) happens in the device factory; the worker only drives the per-frame
//! operations below. Teardown is `Drop`.
//!
//! ### 中文
//! worker 循环的 GPU 侧接口。
//!
//! 初始化（上下文、管线）在 device 工厂中完成；worker 只驱动下面的逐帧操作。销毁由 `Drop` 负责。
use std::os::fd::OwnedFd;

use super::error::BlitterResult;
use super::handles::{FenceHandle, ImageHandle, NativeWindow, TextureId};

/// ### English
/// Zero-copy import request for one dma-buf. The descriptor is consumed by the import whether it
/// succeeds or not.
///
/// ### 中文
/// 单个 dma-buf 的零拷贝导入请求。无论导入成功与否，描述符都会被消耗（关闭）。
#[derive(Debug)]
pub struct DmabufImport {
    pub fd: OwnedFd,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: u32,
}

/// ### English
/// GPU artifacts derived from one import.
///
/// ### 中文
/// 一次导入得到的 GPU 资源。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImportedImage {
    pub image: ImageHandle,
    pub texture: TextureId,
}

/// ### English
/// Per-frame GPU operations. Implementations are created and used on the worker thread only.
///
/// ### 中文
/// 逐帧 GPU 操作。实现只在 worker 线程上创建与使用。
pub trait BlitDevice {
    fn apply_swap_interval(&mut self, interval: i32) -> BlitterResult<()>;

    /// ### English
    /// Imports a dma-buf as an image and binds it as the backing store of a new 2D texture.
    ///
    /// ### 中文
    /// 将 dma-buf 导入为图像，并绑定为新建 2D 纹理的底层存储。
    fn import_dmabuf(&mut self, import: DmabufImport) -> BlitterResult<ImportedImage>;

    /// ### English
    /// Destroys the texture and the image of a previous import.
    ///
    /// ### 中文
    /// 销毁先前导入得到的纹理与图像。
    fn release_import(&mut self, imported: ImportedImage);

    /// ### English
    /// Blocks until `fence` signals (no timeout).
    ///
    /// ### 中文
    /// 阻塞等待 `fence` signal（无超时）。
    fn wait_fence(&mut self, fence: FenceHandle) -> BlitterResult<()>;

    fn destroy_fence(&mut self, fence: FenceHandle);

    /// ### English
    /// Clears the target and draws the letterboxed quad sampling `texture`.
    ///
    /// ### 中文
    /// 清空目标并以 `texture` 采样绘制带黑边的四边形。
    fn draw(&mut self, texture: TextureId);

    /// ### English
    /// Presents the drawn buffer to the scanout surface (it becomes the surface's front buffer).
    ///
    /// ### 中文
    /// 将绘制好的缓冲呈现到扫描输出表面（成为该表面的前缓冲）。
    fn swap_buffers(&mut self) -> BlitterResult<()>;
}

/// ### English
/// Builds the device on the worker thread once the scanout surface exists.
///
/// ### 中文
/// 在扫描输出表面创建后，于 worker 线程上构建 device。
pub trait DeviceFactory: Send + 'static {
    type Device: BlitDevice;

    fn create(self, window: NativeWindow) -> BlitterResult<Self::Device>;
}

impl<D, F> DeviceFactory for F
where
    D: BlitDevice,
    F: FnOnce(NativeWindow) -> BlitterResult<D> + Send + 'static,
{
    type Device = D;

    fn create(self, window: NativeWindow) -> BlitterResult<D> {
        self(window)
    }
}
