//! ### English
//! Blitter configuration: sizes, rotation, filter kernel, and the shared swap-interval setting.
//!
//! ### 中文
//! blitter 配置：尺寸、旋转、滤波核，以及共享的 swap interval 设置。
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use dpi::PhysicalSize;

use super::error::{BlitterError, BlitterResult};

/// ### English
/// Environment switch selecting the fragment filter kernel.
///
/// ### 中文
/// 选择片元滤波核的环境变量。
pub const HQ_SCALER_ENV: &str = "SDL_KMSDRM_HQ_SCALER";

/// ### English
/// Unprefixed spelling, consulted only when [`HQ_SCALER_ENV`] is unset.
///
/// ### 中文
/// 不带前缀的写法；仅在 [`HQ_SCALER_ENV`] 未设置时读取。
pub const HQ_SCALER_ENV_FALLBACK: &str = "KMSDRM_HQ_SCALER";

/// ### English
/// Output rotation, applied by remapping texture coordinates in the vertex stage.
///
/// ### 中文
/// 输出旋转；通过在顶点阶段重映射纹理坐标实现。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// ### English
    /// Maps a quarter-turn index (`0..=3`) to a rotation. Out-of-range indices yield `None`.
    ///
    /// ### 中文
    /// 将四分之一圈索引（`0..=3`）映射为旋转；越界返回 `None`。
    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(Self::Deg0),
            1 => Some(Self::Deg90),
            2 => Some(Self::Deg180),
            3 => Some(Self::Deg270),
            _ => None,
        }
    }

    pub fn index(self) -> u32 {
        self as u32
    }

    /// ### English
    /// Returns whether the plane is displayed sideways (90° or 270°).
    ///
    /// ### 中文
    /// 返回画面是否侧向显示（90° 或 270°）。
    pub fn is_sideways(self) -> bool {
        self.index() & 1 == 1
    }
}

/// ### English
/// Fragment filter kernel.
///
/// ### 中文
/// 片元滤波核。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FilterKernel {
    /// ### English
    /// Plain hardware-filtered passthrough.
    ///
    /// ### 中文
    /// 直接使用硬件滤波采样。
    #[default]
    Standard,
    /// ### English
    /// Edge-preserving bilinear (TheMaister's sharp-bilinear-simple).
    ///
    /// ### 中文
    /// 保边双线性（TheMaister 的 sharp-bilinear-simple）。
    SharpBilinear,
    /// ### English
    /// Smoothstep texel interpolation (Iñigo Quilez).
    ///
    /// ### 中文
    /// 基于 smoothstep 的纹素插值（Iñigo Quilez）。
    Quilez,
}

impl FilterKernel {
    /// ### English
    /// Parses the selector value. Only the first character is significant; unknown values fall
    /// back to `Standard`.
    ///
    /// ### 中文
    /// 解析选择值。只看第一个字符；未知取值回退为 `Standard`。
    pub fn parse(value: Option<&str>) -> Self {
        match value.and_then(|v| v.chars().next()) {
            Some('1') => Self::SharpBilinear,
            Some('2') => Self::Quilez,
            _ => Self::Standard,
        }
    }

    /// ### English
    /// Reads `SDL_KMSDRM_HQ_SCALER` (or `KMSDRM_HQ_SCALER` when that is unset) from the process
    /// environment.
    ///
    /// ### 中文
    /// 从进程环境读取 `SDL_KMSDRM_HQ_SCALER`（未设置时读取 `KMSDRM_HQ_SCALER`）。
    pub fn from_env() -> Self {
        Self::lookup(|name| std::env::var(name).ok())
    }

    /// ### English
    /// Resolves the selector through `var`, preferring [`HQ_SCALER_ENV`].
    ///
    /// ### 中文
    /// 通过 `var` 解析选择值，优先使用 [`HQ_SCALER_ENV`]。
    pub fn lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let value = var(HQ_SCALER_ENV).or_else(|| var(HQ_SCALER_ENV_FALLBACK));
        Self::parse(value.as_deref())
    }

    /// ### English
    /// High-quality kernels sample in texel space and need `uScale`/`uTexSize` in the fragment stage.
    ///
    /// ### 中文
    /// 高质量滤波核在纹素空间采样，需要在片元阶段使用 `uScale`/`uTexSize`。
    pub fn is_high_quality(self) -> bool {
        !matches!(self, Self::Standard)
    }
}

/// ### English
/// Static configuration for one blitter instance.
///
/// ### 中文
/// 单个 blitter 实例的静态配置。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlitterConfig {
    /// ### English
    /// Scanout surface size (display mode size, pixels).
    ///
    /// ### 中文
    /// 扫描输出表面尺寸（显示模式尺寸，像素）。
    pub viewport: PhysicalSize<u32>,
    /// ### English
    /// Size of the producer planes (pixels).
    ///
    /// ### 中文
    /// 生产者 plane 的尺寸（像素）。
    pub plane: PhysicalSize<u32>,
    pub rotation: Rotation,
    pub filter: FilterKernel,
}

impl BlitterConfig {
    /// ### English
    /// Creates a configuration whose filter kernel comes from the environment.
    ///
    /// ### 中文
    /// 创建配置；滤波核取自环境变量。
    pub fn new(viewport: PhysicalSize<u32>, plane: PhysicalSize<u32>, rotation: Rotation) -> Self {
        Self {
            viewport,
            plane,
            rotation,
            filter: FilterKernel::from_env(),
        }
    }

    pub fn validate(&self) -> BlitterResult<()> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(BlitterError::configuration(format!(
                "viewport must be non-empty, got {}x{}",
                self.viewport.width, self.viewport.height
            )));
        }
        if self.plane.width == 0 || self.plane.height == 0 {
            return Err(BlitterError::configuration(format!(
                "plane must be non-empty, got {}x{}",
                self.plane.width, self.plane.height
            )));
        }
        Ok(())
    }
}

/// ### English
/// Process-wide swap interval shared between the display layer and the worker.
///
/// Writers store the desired value; the worker compares it with the last applied value on each
/// frame and re-applies it when it changed.
///
/// ### 中文
/// 显示层与 worker 共享的进程级 swap interval。
///
/// 写端保存期望值；worker 每帧与上次应用的值比较，变化时重新应用。
#[derive(Clone, Debug)]
pub struct SwapIntervalSetting(Arc<AtomicI32>);

impl SwapIntervalSetting {
    pub fn new(interval: i32) -> Self {
        Self(Arc::new(AtomicI32::new(interval)))
    }

    pub fn set(&self, interval: i32) {
        self.0.store(interval, Ordering::Relaxed);
    }

    pub fn get(&self) -> i32 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for SwapIntervalSetting {
    fn default() -> Self {
        Self::new(1)
    }
}
