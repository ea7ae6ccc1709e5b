//! ### English
//! Plane slots: import of producer buffers as textures, and their retirement.
//!
//! Two slots alternate under a `next` cursor owned by the worker. A slot is always retired before a
//! new buffer is imported into it, so each slot holds at most one live image/texture pair.
//!
//! ### 中文
//! Plane 槽位：将生产者缓冲导入为纹理，以及其退役回收。
//!
//! 两个槽位在 worker 持有的 `next` 游标下交替使用。新缓冲导入某槽位之前，该槽位一定先被退役，
//! 因此每个槽位最多只持有一组存活的 image/texture。
use std::os::fd::{FromRawFd as _, OwnedFd};

use super::device::{BlitDevice, DmabufImport, ImportedImage};
use super::display::{BufferAllocator, FORMAT_ARGB8888};
use super::error::{BlitterError, BlitterResult};
use super::handles::{BufferRef, FenceHandle, ImageHandle, PlaneSubmission, TextureId};

/// ### English
/// Number of plane slots (double-buffered).
///
/// ### 中文
/// plane 槽位数量（双缓冲）。
pub const PLANE_SLOTS: usize = 2;

/// ### English
/// One in-flight producer buffer and the GPU artifacts derived from it.
///
/// `buffer` is borrowed: the plane never releases it to the allocator.
///
/// ### 中文
/// 一个在途的生产者缓冲及其派生的 GPU 资源。
///
/// `buffer` 只是借用：plane 永远不会把它归还给分配器。
#[derive(Debug, Default)]
pub struct Plane {
    fence: Option<FenceHandle>,
    image: Option<ImageHandle>,
    texture: TextureId,
    buffer: Option<BufferRef>,
}

impl Plane {
    pub fn buffer(&self) -> Option<BufferRef> {
        self.buffer
    }

    pub fn texture(&self) -> TextureId {
        self.texture
    }

    /// ### English
    /// Returns whether this plane currently owns an imported image + texture.
    ///
    /// ### 中文
    /// 返回该 plane 当前是否持有导入的 image + texture。
    pub fn is_live(&self) -> bool {
        self.image.is_some()
    }

    /// ### English
    /// Takes `submission` into this plane and imports its buffer as a texture.
    ///
    /// The exported descriptor is closed when this returns, on success and on failure. On failure the
    /// plane still records the buffer and fence so a later `retire` cleans the fence up.
    ///
    /// ### 中文
    /// 将 `submission` 放入该 plane，并把其缓冲导入为纹理。
    ///
    /// 无论成功失败，导出的描述符都会在返回时关闭。失败时 plane 仍记录缓冲与 fence，
    /// 以便之后的 `retire` 清理 fence。
    pub fn import<A, D>(
        &mut self,
        submission: PlaneSubmission,
        allocator: &A,
        device: &mut D,
    ) -> BlitterResult<TextureId>
    where
        A: BufferAllocator + ?Sized,
        D: BlitDevice + ?Sized,
    {
        debug_assert!(self.buffer.is_none(), "plane slot reused without retire");

        self.buffer = Some(submission.buffer);
        self.fence = Some(submission.fence);

        let desc = allocator.describe(submission.buffer);
        if desc.fd < 0 {
            return Err(BlitterError::import(format!(
                "failed to export buffer fd ({})",
                desc.fd
            )));
        }
        /* ### English
        SAFETY: `describe` hands over a freshly exported descriptor that nothing else owns.

        ### 中文
        SAFETY：`describe` 交出的是刚导出、无其他所有者的描述符。
        */
        let fd = unsafe { OwnedFd::from_raw_fd(desc.fd) };

        let imported = device.import_dmabuf(DmabufImport {
            fd,
            width: desc.width,
            height: desc.height,
            stride: desc.stride,
            format: FORMAT_ARGB8888,
        })?;

        self.image = Some(imported.image);
        self.texture = imported.texture;
        Ok(imported.texture)
    }

    /// ### English
    /// Destroys the texture, the image, and the fence, then clears the plane (idempotent).
    ///
    /// No-op when the plane holds no buffer. The buffer itself is left to its owner.
    ///
    /// ### 中文
    /// 销毁纹理、图像与 fence，然后清空该 plane（幂等）。
    ///
    /// plane 未持有缓冲时为空操作。缓冲本身交由其所有者处理。
    pub fn retire<D>(&mut self, device: &mut D)
    where
        D: BlitDevice + ?Sized,
    {
        if self.buffer.is_none() {
            return;
        }

        if let Some(image) = self.image.take() {
            device.release_import(ImportedImage {
                image,
                texture: self.texture,
            });
        }
        if let Some(fence) = self.fence.take() {
            device.destroy_fence(fence);
        }

        self.buffer = None;
        self.texture = TextureId::INVALID;
    }
}

/// ### English
/// Double-buffered plane slots with the worker-owned `next` cursor.
///
/// ### 中文
/// 双缓冲 plane 槽位，以及 worker 持有的 `next` 游标。
#[derive(Debug, Default)]
pub struct PlaneSlots {
    planes: [Plane; PLANE_SLOTS],
    next: usize,
}

impl PlaneSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// ### English
    /// Index of the slot the next submission will be imported into.
    ///
    /// ### 中文
    /// 下一次提交将导入的槽位索引。
    pub fn next(&self) -> usize {
        self.next
    }

    pub fn plane(&self, slot: usize) -> &Plane {
        &self.planes[slot]
    }

    pub fn live_count(&self) -> usize {
        self.planes.iter().filter(|p| p.is_live()).count()
    }

    /// ### English
    /// Retires the slot that is not about to be written (the previous frame's plane).
    ///
    /// ### 中文
    /// 退役不会被写入的那个槽位（上一帧的 plane）。
    pub fn retire_previous<D>(&mut self, device: &mut D)
    where
        D: BlitDevice + ?Sized,
    {
        let previous = (self.next + 1) % PLANE_SLOTS;
        self.planes[previous].retire(device);
    }

    /// ### English
    /// Imports `submission` into the `next` slot (retiring it first if needed) and advances the
    /// cursor. The cursor advances even when the import fails, so the failed slot is retired on the
    /// following cycle.
    ///
    /// ### 中文
    /// 将 `submission` 导入 `next` 槽位（必要时先退役），并推进游标。
    /// 即使导入失败游标也会推进，失败的槽位会在下一轮被退役。
    pub fn load_next<A, D>(
        &mut self,
        submission: PlaneSubmission,
        allocator: &A,
        device: &mut D,
    ) -> BlitterResult<TextureId>
    where
        A: BufferAllocator + ?Sized,
        D: BlitDevice + ?Sized,
    {
        let slot = self.next;
        self.next = (slot + 1) % PLANE_SLOTS;

        let plane = &mut self.planes[slot];
        plane.retire(device);
        plane.import(submission, allocator, device)
    }

    pub fn retire_all<D>(&mut self, device: &mut D)
    where
        D: BlitDevice + ?Sized,
    {
        for plane in self.planes.iter_mut() {
            plane.retire(device);
        }
    }
}
