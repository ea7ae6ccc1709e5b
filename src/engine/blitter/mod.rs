//! ### English
//! Lifecycle controller: starts the blitter worker, hands frames to it, and stops it.
//!
//! ### 中文
//! 生命周期控制器：启动 blitter worker、向其提交帧并停止它。
mod shared;
mod worker;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel as channel;
use tracing::{debug, error};

use crate::engine::config::{BlitterConfig, SwapIntervalSetting};
use crate::engine::device::DeviceFactory;
use crate::engine::display::{BufferAllocator, PageflipDriver};
use crate::engine::error::{BlitterError, BlitterResult};
use crate::engine::handles::PlaneSubmission;

use shared::SharedBlitState;
use worker::{WorkerParts, run_worker};

pub use shared::{BlitterStats, WorkerState};

/// ### English
/// How long `Blitter::start` waits for the worker to report readiness.
///
/// ### 中文
/// `Blitter::start` 等待 worker 报告就绪的时长。
const STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// ### English
/// Collaborators and configuration handed to a new blitter.
///
/// ### 中文
/// 创建 blitter 时传入的协作者与配置。
pub struct BlitterInit<A, P, F> {
    pub allocator: A,
    pub pageflip: P,
    /// ### English
    /// Runs on the worker thread once the scanout surface exists.
    ///
    /// ### 中文
    /// 扫描输出表面创建后，在 worker 线程上执行。
    pub device_factory: F,
    pub config: BlitterConfig,
    pub swap_interval: SwapIntervalSetting,
}

/// ### English
/// Result of handing one frame to the blitter.
///
/// ### 中文
/// 向 blitter 提交一帧的结果。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// ### English
    /// Accepted; the blitter now owns the fence.
    ///
    /// ### 中文
    /// 已接收；fence 此后归 blitter 所有。
    Queued,
    /// ### English
    /// Accepted, replacing an older submission the worker had not consumed yet. The older one is
    /// returned to the producer together with its fence.
    ///
    /// ### 中文
    /// 已接收，并替换了 worker 尚未消费的旧提交。旧提交连同其 fence 一起交还给 producer。
    Superseded(PlaneSubmission),
    /// ### English
    /// The worker no longer accepts frames; the submission is returned untouched.
    ///
    /// ### 中文
    /// worker 已不再接收帧；提交原样返回。
    Rejected(PlaneSubmission),
}

/// ### English
/// Read-only view of a running blitter, usable from any thread.
///
/// ### 中文
/// 运行中 blitter 的只读视图，可在任意线程使用。
#[derive(Clone)]
pub struct BlitterMonitor {
    shared: Arc<SharedBlitState>,
}

impl BlitterMonitor {
    pub fn state(&self) -> WorkerState {
        self.shared.state()
    }

    pub fn stats(&self) -> BlitterStats {
        self.shared.stats()
    }
}

/// ### English
/// Handle to a running blitter worker.
///
/// Dropping the handle performs the same shutdown as `stop`.
///
/// ### 中文
/// 运行中 blitter worker 的句柄。
///
/// drop 该句柄会执行与 `stop` 相同的关闭流程。
pub struct Blitter {
    shared: Arc<SharedBlitState>,
    /// ### English
    /// Join handle for the worker thread; `None` once shut down.
    ///
    /// ### 中文
    /// worker 线程的 join handle；关闭后为 `None`。
    thread: Option<thread::JoinHandle<()>>,
}

impl Blitter {
    /// ### English
    /// Spawns the worker thread and blocks until it has created the scanout surface and the GPU
    /// device (or failed to).
    ///
    /// On a reported setup failure the worker has already released what it created and been
    /// joined when this returns. If the worker does not report within 30 s, it is told to stop and
    /// left to drain on its own; `start` does not wait for it.
    ///
    /// ### 中文
    /// 启动 worker 线程，并阻塞等待其创建扫描输出表面与 GPU device（或失败）。
    ///
    /// 若 worker 报告了初始化失败，返回前它已释放其创建的资源并已被 join。
    /// 若 worker 在 30 秒内没有报告，则通知其停止并任其自行回收；`start` 不会等待它。
    pub fn start<A, P, F>(init: BlitterInit<A, P, F>) -> BlitterResult<Self>
    where
        A: BufferAllocator,
        P: PageflipDriver,
        F: DeviceFactory,
    {
        Self::start_with_timeout(init, STARTUP_TIMEOUT)
    }

    pub(crate) fn start_with_timeout<A, P, F>(
        init: BlitterInit<A, P, F>,
        startup_timeout: Duration,
    ) -> BlitterResult<Self>
    where
        A: BufferAllocator,
        P: PageflipDriver,
        F: DeviceFactory,
    {
        init.config.validate()?;

        let shared = Arc::new(SharedBlitState::new());
        let (ready_tx, ready_rx) = channel::bounded(1);

        let parts = WorkerParts {
            allocator: init.allocator,
            pageflip: init.pageflip,
            device_factory: init.device_factory,
            config: init.config,
            swap_interval: init.swap_interval,
            shared: shared.clone(),
            ready_tx,
        };

        let thread = thread::Builder::new()
            .name("kmsdrm-blitter".to_string())
            .spawn(move || run_worker(parts))
            .map_err(|err| BlitterError::WorkerLost(format!("failed to spawn worker: {err}")))?;

        match ready_rx.recv_timeout(startup_timeout) {
            Ok(Ok(())) => Ok(Self {
                shared,
                thread: Some(thread),
            }),
            Ok(Err(err)) => {
                let _ = thread.join();
                Err(err)
            }
            Err(channel::RecvTimeoutError::Timeout) => {
                /* ### English
                The worker may be stuck inside native setup, so joining could block forever.
                Detach it: once setup returns it observes the stop and drains by itself.

                ### 中文
                worker 可能卡在原生初始化调用中，join 可能永久阻塞。
                因此将其分离：初始化返回后它会观察到停止请求并自行回收。 */
                shared.request_stop();
                drop(thread);
                error!(
                    timeout = ?startup_timeout,
                    "Blitter worker did not report readiness, detaching it"
                );
                Err(BlitterError::WorkerLost(
                    "timed out waiting for blitter worker".to_string(),
                ))
            }
            Err(channel::RecvTimeoutError::Disconnected) => {
                let _ = thread.join();
                Err(BlitterError::WorkerLost(
                    "worker exited before reporting readiness".to_string(),
                ))
            }
        }
    }

    /// ### English
    /// Hands the latest producer frame to the worker and wakes it.
    ///
    /// Signals coalesce: at most one submission waits for the worker, and a newer submit replaces
    /// it.
    ///
    /// ### 中文
    /// 将最新的 producer 帧交给 worker 并唤醒它。
    ///
    /// 信号会合并：最多只有一个提交在等待 worker，新的提交会替换它。
    pub fn submit(&self, submission: PlaneSubmission) -> SubmitOutcome {
        let mut handoff = self.shared.handoff.lock();
        if handoff.stop || handoff.exited {
            return SubmitOutcome::Rejected(submission);
        }
        let previous = handoff.pending.replace(submission);
        self.shared.wake.notify_one();
        match previous {
            Some(previous) => SubmitOutcome::Superseded(previous),
            None => SubmitOutcome::Queued,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.shared.state()
    }

    pub fn stats(&self) -> BlitterStats {
        self.shared.stats()
    }

    pub fn monitor(&self) -> BlitterMonitor {
        BlitterMonitor {
            shared: self.shared.clone(),
        }
    }

    /// ### English
    /// Requests stop and joins the worker.
    ///
    /// The worker observes the request the next time it is waiting for a frame, so this can block
    /// for up to one frame's draw and flip time. All plane and scanout resources have been
    /// released when this returns.
    ///
    /// ### 中文
    /// 请求停止并 join worker。
    ///
    /// worker 在下一次等待帧时才会观察到该请求，因此最多可能阻塞一帧的绘制与翻转时间。
    /// 返回时所有 plane 与扫描输出资源都已释放。
    pub fn stop(mut self) -> BlitterResult<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> BlitterResult<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        debug!("Stopping blitter worker");
        self.shared.request_stop();
        thread
            .join()
            .map_err(|_| BlitterError::WorkerLost("blitter worker panicked".to_string()))
    }
}

impl Drop for Blitter {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            error!("Blitter shutdown failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use dpi::PhysicalSize;
    use parking_lot::Mutex;

    use crate::engine::config::{FilterKernel, Rotation};
    use crate::engine::error::ShaderStage;
    use crate::engine::handles::{NativeWindow, TextureId};
    use crate::engine::testing::{
        DeviceScript, Event, MockAllocator, MockDevice, MockPageflip, Recorder, buffer, fence,
        init_tracing, scanout, wait_until,
    };

    struct Harness {
        recorder: Recorder,
        allocator: MockAllocator,
        pageflip: MockPageflip,
        device: Arc<Mutex<DeviceScript>>,
        swap_interval: SwapIntervalSetting,
    }

    fn harness() -> Harness {
        init_tracing();
        let recorder = Recorder::default();
        Harness {
            allocator: MockAllocator::new(recorder.clone()),
            pageflip: MockPageflip::new(recorder.clone()),
            device: Arc::default(),
            swap_interval: SwapIntervalSetting::default(),
            recorder,
        }
    }

    fn config() -> BlitterConfig {
        BlitterConfig {
            viewport: PhysicalSize::new(1920, 1080),
            plane: PhysicalSize::new(640, 480),
            rotation: Rotation::Deg0,
            filter: FilterKernel::Standard,
        }
    }

    fn start(h: &Harness) -> BlitterResult<Blitter> {
        let recorder = h.recorder.clone();
        let script = h.device.clone();
        Blitter::start(BlitterInit {
            allocator: h.allocator.clone(),
            pageflip: h.pageflip.clone(),
            device_factory: move |_window: NativeWindow| -> BlitterResult<MockDevice> {
                recorder.push(Event::CreateDevice);
                Ok(MockDevice::with_script(recorder, script))
            },
            config: config(),
            swap_interval: h.swap_interval.clone(),
        })
    }

    fn submission(n: usize) -> PlaneSubmission {
        PlaneSubmission {
            buffer: buffer(n),
            fence: fence(n),
        }
    }

    fn present(blitter: &Blitter, n: usize) {
        let flips = blitter.stats().flips;
        assert_eq!(blitter.submit(submission(n)), SubmitOutcome::Queued);
        wait_until("flip", || blitter.stats().flips == flips + 1);
    }

    fn position(events: &[Event], event: &Event) -> usize {
        events
            .iter()
            .position(|e| e == event)
            .unwrap_or_else(|| panic!("missing {event:?}"))
    }

    #[test]
    fn start_reaches_waiting_without_frames() {
        let h = harness();
        let blitter = start(&h).unwrap();
        wait_until("waiting", || blitter.state() == WorkerState::Waiting);

        assert_eq!(blitter.stats(), BlitterStats::default());
        assert_eq!(
            h.recorder.events(),
            vec![
                Event::CreateSurface(PhysicalSize::new(1920, 1080)),
                Event::CreateDevice,
            ]
        );
        blitter.stop().unwrap();
    }

    #[test]
    fn stop_while_waiting_releases_both_scanout_buffers() {
        let h = harness();
        let blitter = start(&h).unwrap();
        present(&blitter, 1);
        present(&blitter, 2);
        wait_until("waiting", || blitter.state() == WorkerState::Waiting);

        let monitor = blitter.monitor();
        blitter.stop().unwrap();
        assert_eq!(monitor.state(), WorkerState::Stopped);

        let events = h.recorder.events();
        let dropped = position(&events, &Event::DeviceDropped);
        assert!(position(&events, &Event::Release(scanout(1))) > dropped);
        assert!(position(&events, &Event::Release(scanout(2))) > dropped);
        assert_eq!(events.last(), Some(&Event::DestroySurface));

        let imports = h.recorder.count(|e| matches!(e, Event::Import(_)));
        let released = h.recorder.count(|e| matches!(e, Event::ReleaseImport(_)));
        assert_eq!(imports, 2);
        assert_eq!(released, 2);
        assert!(h.recorder.contains(&Event::DestroyFence(fence(1))));
        assert!(h.recorder.contains(&Event::DestroyFence(fence(2))));
    }

    #[test]
    fn scanout_buffers_are_released_only_after_the_superseding_flip() {
        let h = harness();
        let blitter = start(&h).unwrap();
        for n in 1..=5 {
            present(&blitter, n);
        }
        blitter.stop().unwrap();

        let events = h.recorder.events();
        let dropped = position(&events, &Event::DeviceDropped);
        let mut steady_releases = 0;
        for (i, event) in events[..dropped].iter().enumerate() {
            let Event::Release(bo) = event else {
                continue;
            };
            let superseded = events[..i]
                .iter()
                .rposition(|e| matches!(e, Event::PostFlip(Some(current), _) if current == bo))
                .unwrap_or_else(|| panic!("{bo:?} released before being superseded"));
            assert!(
                events[superseded..i].contains(&Event::WaitPageflip),
                "{bo:?} released before its pageflip completed"
            );
            steady_releases += 1;
        }
        assert_eq!(steady_releases, 3);
        assert!(h.recorder.contains(&Event::PostFlip(None, scanout(1))));
    }

    #[test]
    fn fence_failure_drops_the_frame_without_retry() {
        let h = harness();
        h.device.lock().failing_fences.push(fence(2));
        let blitter = start(&h).unwrap();

        present(&blitter, 1);
        assert_eq!(blitter.submit(submission(2)), SubmitOutcome::Queued);
        wait_until("drop", || blitter.stats().frames_dropped == 1);
        present(&blitter, 3);

        assert_eq!(
            blitter.stats(),
            BlitterStats {
                frames_drawn: 2,
                frames_dropped: 1,
                flips: 2,
            }
        );
        assert_eq!(
            h.recorder.count(|e| *e == Event::WaitFence(fence(2))),
            1
        );
        assert_eq!(h.recorder.count(|e| matches!(e, Event::Draw(_))), 2);
        assert_eq!(h.recorder.count(|e| *e == Event::Swap), 2);

        blitter.stop().unwrap();
        let imports = h.recorder.count(|e| matches!(e, Event::Import(_)));
        let released = h.recorder.count(|e| matches!(e, Event::ReleaseImport(_)));
        assert_eq!((imports, released), (3, 3));
        assert_eq!(h.recorder.count(|e| matches!(e, Event::DestroyFence(_))), 3);
    }

    #[test]
    fn draw_error_outside_the_frame_stops_the_worker() {
        let h = harness();
        h.device.lock().lost_fences.push(fence(2));
        let blitter = start(&h).unwrap();

        present(&blitter, 1);
        assert_eq!(blitter.submit(submission(2)), SubmitOutcome::Queued);
        wait_until("stopped", || blitter.state() == WorkerState::Stopped);

        assert_eq!(
            blitter.stats(),
            BlitterStats {
                frames_drawn: 1,
                frames_dropped: 0,
                flips: 1,
            }
        );
        assert_eq!(h.recorder.count(|e| matches!(e, Event::Draw(_))), 1);
        assert_eq!(
            blitter.submit(submission(3)),
            SubmitOutcome::Rejected(submission(3))
        );

        let imports = h.recorder.count(|e| matches!(e, Event::Import(_)));
        let released = h.recorder.count(|e| matches!(e, Event::ReleaseImport(_)));
        assert_eq!((imports, released), (2, 2));
        assert!(h.recorder.contains(&Event::DestroyFence(fence(2))));
        assert_eq!(h.recorder.events().last(), Some(&Event::DestroySurface));

        blitter.stop().unwrap();
    }

    #[test]
    fn swap_failure_stops_the_worker_and_still_drains() {
        let h = harness();
        h.device.lock().fail_swap = true;
        let blitter = start(&h).unwrap();

        assert_eq!(blitter.submit(submission(1)), SubmitOutcome::Queued);
        wait_until("stopped", || blitter.state() == WorkerState::Stopped);
        assert_eq!(
            blitter.submit(submission(2)),
            SubmitOutcome::Rejected(submission(2))
        );

        assert!(h.recorder.contains(&Event::ReleaseImport(TextureId(1))));
        assert!(h.recorder.contains(&Event::DestroyFence(fence(1))));
        assert!(h.recorder.contains(&Event::DeviceDropped));
        assert_eq!(h.recorder.events().last(), Some(&Event::DestroySurface));
        assert_eq!(h.recorder.count(|e| matches!(e, Event::LockFront(_))), 0);
        assert_eq!(blitter.stats().flips, 0);

        blitter.stop().unwrap();
    }

    #[test]
    fn pageflip_wait_failure_is_fatal() {
        let h = harness();
        h.pageflip.script().fail_wait = true;
        let blitter = start(&h).unwrap();

        blitter.submit(submission(1));
        wait_until("stopped", || blitter.state() == WorkerState::Stopped);

        assert_eq!(h.recorder.count(|e| *e == Event::Swap), 0);
        assert_eq!(h.recorder.events().last(), Some(&Event::DestroySurface));
        blitter.stop().unwrap();
    }

    #[test]
    fn front_buffer_lock_failure_is_fatal() {
        let h = harness();
        h.allocator.script().fail_lock = true;
        let blitter = start(&h).unwrap();

        blitter.submit(submission(1));
        wait_until("stopped", || blitter.state() == WorkerState::Stopped);

        assert_eq!(h.recorder.count(|e| *e == Event::Swap), 1);
        assert_eq!(
            h.recorder.count(|e| matches!(e, Event::PostFlip(..))),
            0
        );
        blitter.stop().unwrap();
    }

    #[test]
    fn signals_coalesce_while_the_worker_is_busy() {
        let h = harness();
        let (gate_tx, gate_rx) = channel::unbounded::<()>();
        h.device.lock().fence_gate = Some(gate_rx);
        let blitter = start(&h).unwrap();

        assert_eq!(blitter.submit(submission(1)), SubmitOutcome::Queued);
        wait_until("fence wait", || {
            h.recorder.contains(&Event::WaitFence(fence(1)))
        });

        assert_eq!(blitter.submit(submission(2)), SubmitOutcome::Queued);
        for n in 3..=10 {
            assert_eq!(
                blitter.submit(submission(n)),
                SubmitOutcome::Superseded(submission(n - 1))
            );
        }

        drop(gate_tx);
        wait_until("second flip", || {
            blitter.stats().flips == 2 && blitter.state() == WorkerState::Waiting
        });

        assert_eq!(h.recorder.count(|e| matches!(e, Event::Draw(_))), 2);
        assert!(h.recorder.contains(&Event::WaitFence(fence(10))));
        for n in 2..=9 {
            assert!(!h.recorder.contains(&Event::Describe(buffer(n))));
            assert!(!h.recorder.contains(&Event::DestroyFence(fence(n))));
        }
        blitter.stop().unwrap();
    }

    #[test]
    fn stop_during_a_frame_finishes_it_and_destroys_the_pending_fence() {
        let h = harness();
        let (gate_tx, gate_rx) = channel::unbounded::<()>();
        h.device.lock().fence_gate = Some(gate_rx);
        let blitter = start(&h).unwrap();

        blitter.submit(submission(1));
        wait_until("fence wait", || {
            h.recorder.contains(&Event::WaitFence(fence(1)))
        });
        assert_eq!(blitter.submit(submission(2)), SubmitOutcome::Queued);

        let monitor = blitter.monitor();
        let stopper = thread::spawn(move || blitter.stop());
        wait_until("stop requested", || monitor.shared.handoff.lock().stop);
        assert_ne!(monitor.state(), WorkerState::Stopped);

        drop(gate_tx);
        stopper.join().unwrap().unwrap();

        assert_eq!(monitor.state(), WorkerState::Stopped);
        assert_eq!(monitor.stats().flips, 1);
        assert!(!h.recorder.contains(&Event::Describe(buffer(2))));
        assert!(h.recorder.contains(&Event::DestroyFence(fence(2))));
    }

    #[test]
    fn worker_follows_swap_interval_changes() {
        let h = harness();
        let blitter = start(&h).unwrap();

        present(&blitter, 1);
        present(&blitter, 2);
        h.swap_interval.set(0);
        present(&blitter, 3);
        present(&blitter, 4);
        blitter.stop().unwrap();

        let applied: Vec<_> = h
            .recorder
            .events()
            .into_iter()
            .filter_map(|e| match e {
                Event::SwapInterval(interval) => Some(interval),
                _ => None,
            })
            .collect();
        assert_eq!(applied, vec![1, 0]);
    }

    #[test]
    fn device_setup_failure_is_returned_from_start() {
        let h = harness();
        let err = Blitter::start(BlitterInit {
            allocator: h.allocator.clone(),
            pageflip: h.pageflip.clone(),
            device_factory: |_window: NativeWindow| -> BlitterResult<MockDevice> {
                Err(BlitterError::shader(ShaderStage::Link, "undefined uProj"))
            },
            config: config(),
            swap_interval: h.swap_interval.clone(),
        })
        .err()
        .unwrap();

        assert!(matches!(err, BlitterError::ShaderCompile { .. }));
        assert_eq!(
            h.recorder.events(),
            vec![
                Event::CreateSurface(PhysicalSize::new(1920, 1080)),
                Event::DestroySurface,
            ]
        );
    }

    #[test]
    fn surface_failure_is_returned_from_start() {
        let h = harness();
        h.allocator.script().fail_create = true;

        let err = start(&h).err().unwrap();
        assert!(matches!(err, BlitterError::Configuration(_)));
        assert!(!h.recorder.contains(&Event::CreateDevice));
    }

    #[test]
    fn invalid_config_fails_before_any_resource_is_created() {
        let h = harness();
        let err = Blitter::start(BlitterInit {
            allocator: h.allocator.clone(),
            pageflip: h.pageflip.clone(),
            device_factory: |_window: NativeWindow| -> BlitterResult<MockDevice> {
                unreachable!("worker must not start")
            },
            config: BlitterConfig {
                plane: PhysicalSize::new(0, 480),
                ..config()
            },
            swap_interval: h.swap_interval.clone(),
        })
        .err()
        .unwrap();

        assert!(matches!(err, BlitterError::Configuration(_)));
        assert!(h.recorder.events().is_empty());
    }

    #[test]
    fn startup_timeout_returns_without_waiting_for_a_stuck_worker() {
        let h = harness();
        let (release_tx, release_rx) = channel::bounded::<()>(0);
        let recorder = h.recorder.clone();
        let script = h.device.clone();

        let begun = Instant::now();
        let err = Blitter::start_with_timeout(
            BlitterInit {
                allocator: h.allocator.clone(),
                pageflip: h.pageflip.clone(),
                device_factory: move |_window: NativeWindow| -> BlitterResult<MockDevice> {
                    let _ = release_rx.recv();
                    recorder.push(Event::CreateDevice);
                    Ok(MockDevice::with_script(recorder, script))
                },
                config: config(),
                swap_interval: h.swap_interval.clone(),
            },
            Duration::from_millis(100),
        )
        .err()
        .unwrap();

        assert!(matches!(err, BlitterError::WorkerLost(_)));
        assert!(begun.elapsed() < Duration::from_secs(3), "{:?}", begun.elapsed());
        assert!(!h.recorder.contains(&Event::CreateDevice));

        /* ### English
        Setup finishes late: the detached worker sees the stop and releases everything.

        ### 中文
        初始化延迟完成：被分离的 worker 观察到停止请求并释放全部资源。
        */
        drop(release_tx);
        wait_until("detached worker drained", || {
            h.recorder.events().last() == Some(&Event::DestroySurface)
        });
        let events = h.recorder.events();
        assert!(
            position(&events, &Event::DeviceDropped) < position(&events, &Event::DestroySurface)
        );
        assert!(!events.iter().any(|e| matches!(e, Event::Draw(_))));
    }

    #[test]
    fn dropping_the_handle_shuts_the_worker_down() {
        let h = harness();
        let blitter = start(&h).unwrap();
        present(&blitter, 1);

        let monitor = blitter.monitor();
        drop(blitter);

        assert_eq!(monitor.state(), WorkerState::Stopped);
        assert_eq!(h.recorder.events().last(), Some(&Event::DestroySurface));
    }
}
