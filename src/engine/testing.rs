//! ### English
//! In-process stand-ins for the allocator, the pageflip driver, and the GPU device. Each records
//! what the worker asked of it into a shared event log.
//!
//! ### 中文
//! 分配器、pageflip 驱动与 GPU device 的进程内替身。每个替身都把 worker 对它的请求
//! 记录到共享的事件日志中。
use std::ffi::c_void;
use std::fs::File;
use std::os::fd::IntoRawFd as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel as channel;
use dpi::PhysicalSize;
use parking_lot::{Mutex, MutexGuard};

use super::device::{BlitDevice, DmabufImport, ImportedImage};
use super::display::{BufferAllocator, PageflipDriver};
use super::error::{BlitterError, BlitterResult};
use super::handles::{
    BufferDescriptor, BufferRef, FenceHandle, ImageHandle, NativeWindow, TextureId,
};

pub(crate) fn buffer(n: usize) -> BufferRef {
    BufferRef::from_raw((n * 0x100) as *mut c_void).unwrap()
}

pub(crate) fn fence(n: usize) -> FenceHandle {
    FenceHandle::from_raw((0x10_0000 + n * 0x100) as *mut c_void).unwrap()
}

/// Scanout buffers handed out by `MockAllocator::lock_front_buffer`, numbered from 1.
pub(crate) fn scanout(n: usize) -> BufferRef {
    buffer(1000 + n)
}

pub(crate) fn window() -> NativeWindow {
    NativeWindow::from_raw(0x5000 as *mut c_void).unwrap()
}

/// Routes worker logs to the test harness output; safe to call from every test.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub(crate) fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Event {
    CreateSurface(PhysicalSize<u32>),
    DestroySurface,
    LockFront(BufferRef),
    Release(BufferRef),
    Describe(BufferRef),
    WaitPageflip,
    PostFlip(Option<BufferRef>, BufferRef),
    CreateDevice,
    SwapInterval(i32),
    Import(TextureId),
    ReleaseImport(TextureId),
    WaitFence(FenceHandle),
    DestroyFence(FenceHandle),
    Draw(TextureId),
    Swap,
    DeviceDropped,
}

#[derive(Clone, Default)]
pub(crate) struct Recorder(Arc<Mutex<Vec<Event>>>);

impl Recorder {
    pub(crate) fn push(&self, event: Event) {
        self.0.lock().push(event);
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.0.lock().clone()
    }

    pub(crate) fn count(&self, mut pred: impl FnMut(&Event) -> bool) -> usize {
        self.0.lock().iter().filter(|e| pred(e)).count()
    }

    pub(crate) fn contains(&self, event: &Event) -> bool {
        self.0.lock().contains(event)
    }
}

#[derive(Default)]
pub(crate) struct AllocatorScript {
    pub(crate) unexportable: Vec<BufferRef>,
    pub(crate) fail_create: bool,
    pub(crate) fail_lock: bool,
    locked: usize,
}

#[derive(Clone)]
pub(crate) struct MockAllocator {
    recorder: Recorder,
    script: Arc<Mutex<AllocatorScript>>,
}

impl MockAllocator {
    pub(crate) fn new(recorder: Recorder) -> Self {
        Self {
            recorder,
            script: Arc::default(),
        }
    }

    pub(crate) fn script(&self) -> MutexGuard<'_, AllocatorScript> {
        self.script.lock()
    }
}

impl BufferAllocator for MockAllocator {
    fn create_surface(
        &mut self,
        size: PhysicalSize<u32>,
        _format: u32,
        _usage: u32,
    ) -> BlitterResult<NativeWindow> {
        self.recorder.push(Event::CreateSurface(size));
        if self.script.lock().fail_create {
            return Err(BlitterError::configuration("no buffer device"));
        }
        Ok(window())
    }

    fn lock_front_buffer(&mut self, _surface: NativeWindow) -> Option<BufferRef> {
        let mut script = self.script.lock();
        if script.fail_lock {
            return None;
        }
        script.locked += 1;
        let bo = scanout(script.locked);
        self.recorder.push(Event::LockFront(bo));
        Some(bo)
    }

    fn release_buffer(&mut self, _surface: NativeWindow, buffer: BufferRef) {
        self.recorder.push(Event::Release(buffer));
    }

    fn destroy_surface(&mut self, _surface: NativeWindow) {
        self.recorder.push(Event::DestroySurface);
    }

    fn describe(&self, buffer: BufferRef) -> BufferDescriptor {
        self.recorder.push(Event::Describe(buffer));
        let fd = if self.script.lock().unexportable.contains(&buffer) {
            -1
        } else {
            File::open("/dev/null").unwrap().into_raw_fd()
        };
        BufferDescriptor {
            fd,
            width: 640,
            height: 480,
            stride: 640 * 4,
        }
    }
}

#[derive(Default)]
pub(crate) struct PageflipScript {
    pub(crate) fail_wait: bool,
}

#[derive(Clone)]
pub(crate) struct MockPageflip {
    recorder: Recorder,
    script: Arc<Mutex<PageflipScript>>,
}

impl MockPageflip {
    pub(crate) fn new(recorder: Recorder) -> Self {
        Self {
            recorder,
            script: Arc::default(),
        }
    }

    pub(crate) fn script(&self) -> MutexGuard<'_, PageflipScript> {
        self.script.lock()
    }
}

impl PageflipDriver for MockPageflip {
    fn wait_for_pageflip(&mut self) -> BlitterResult<()> {
        self.recorder.push(Event::WaitPageflip);
        if self.script.lock().fail_wait {
            return Err(BlitterError::presentation("pageflip wait failed"));
        }
        Ok(())
    }

    fn post_flip(&mut self, current: Option<BufferRef>, next: BufferRef) -> BlitterResult<()> {
        self.recorder.push(Event::PostFlip(current, next));
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct DeviceScript {
    pub(crate) failing_fences: Vec<FenceHandle>,
    /// ### English
    /// Fences whose wait reports a lost display instead of a sync failure.
    ///
    /// ### 中文
    /// 等待时报告显示丢失（而非同步失败）的 fence。
    pub(crate) lost_fences: Vec<FenceHandle>,
    pub(crate) fail_swap: bool,
    /// ### English
    /// While set, every fence wait blocks until the gate's sender sends or is dropped.
    ///
    /// ### 中文
    /// 设置后，每次 fence 等待都会阻塞，直到闸门的发送端发送或被丢弃。
    pub(crate) fence_gate: Option<channel::Receiver<()>>,
}

pub(crate) struct MockDevice {
    recorder: Recorder,
    script: Arc<Mutex<DeviceScript>>,
    next_texture: u32,
    live: usize,
}

impl MockDevice {
    pub(crate) fn new(recorder: Recorder) -> Self {
        Self::with_script(recorder, Arc::default())
    }

    pub(crate) fn with_script(recorder: Recorder, script: Arc<Mutex<DeviceScript>>) -> Self {
        Self {
            recorder,
            script,
            next_texture: 0,
            live: 0,
        }
    }

    pub(crate) fn live_imports(&self) -> usize {
        self.live
    }
}

impl BlitDevice for MockDevice {
    fn apply_swap_interval(&mut self, interval: i32) -> BlitterResult<()> {
        self.recorder.push(Event::SwapInterval(interval));
        Ok(())
    }

    fn import_dmabuf(&mut self, import: DmabufImport) -> BlitterResult<ImportedImage> {
        drop(import.fd);
        self.next_texture += 1;
        let texture = TextureId(self.next_texture);
        let image = ImageHandle::from_raw((0x7000 + self.next_texture as usize) as *mut c_void)
            .ok_or_else(|| BlitterError::import("null image"))?;
        self.live += 1;
        self.recorder.push(Event::Import(texture));
        Ok(ImportedImage { image, texture })
    }

    fn release_import(&mut self, imported: ImportedImage) {
        self.live -= 1;
        self.recorder.push(Event::ReleaseImport(imported.texture));
    }

    fn wait_fence(&mut self, fence: FenceHandle) -> BlitterResult<()> {
        self.recorder.push(Event::WaitFence(fence));
        let gate = self.script.lock().fence_gate.clone();
        if let Some(gate) = gate {
            let _ = gate.recv();
        }
        let script = self.script.lock();
        if script.failing_fences.contains(&fence) {
            return Err(BlitterError::sync("fence wait failed"));
        }
        if script.lost_fences.contains(&fence) {
            return Err(BlitterError::presentation("display lost during fence wait"));
        }
        Ok(())
    }

    fn destroy_fence(&mut self, fence: FenceHandle) {
        self.recorder.push(Event::DestroyFence(fence));
    }

    fn draw(&mut self, texture: TextureId) {
        self.recorder.push(Event::Draw(texture));
    }

    fn swap_buffers(&mut self) -> BlitterResult<()> {
        self.recorder.push(Event::Swap);
        if self.script.lock().fail_swap {
            return Err(BlitterError::presentation("swap failed"));
        }
        Ok(())
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.recorder.push(Event::DeviceDropped);
    }
}
