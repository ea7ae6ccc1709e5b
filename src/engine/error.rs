//! ### English
//! Error taxonomy for the blitter.
//!
//! Setup-phase errors unwind immediately and keep the worker from reaching `Ready`.
//! Frame-local errors are logged and the frame is dropped. Presentation errors end the worker
//! loop, after which draining still runs.
//!
//! ### 中文
//! blitter 的错误分类。
//!
//! 初始化阶段的错误会立即返回，worker 不会进入 `Ready`。
//! 帧级错误只记录日志并丢弃该帧。呈现（presentation）错误会终止 worker 循环，但之后仍会执行资源回收。
use std::fmt;

/// ### English
/// Result alias used throughout the crate.
///
/// ### 中文
/// crate 内统一使用的 Result 别名。
pub type BlitterResult<T> = Result<T, BlitterError>;

/// ### English
/// Shader pipeline stage that failed to build.
///
/// ### 中文
/// 构建失败的着色器管线阶段。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Link,
    /// ### English
    /// An attribute/uniform the selected kernel reads did not resolve to a location.
    ///
    /// ### 中文
    /// 所选滤波核需要的 attribute/uniform 未能解析到 location。
    Binding,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
            Self::Link => "link",
            Self::Binding => "binding",
        };
        f.write_str(name)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum BlitterError {
    /// ### English
    /// A prerequisite subsystem is missing or the configuration is unusable.
    ///
    /// ### 中文
    /// 缺少前置子系统，或配置不可用。
    #[error("configuration error: {0}")]
    Configuration(String),

    /// ### English
    /// A dynamic library or one of its entry points could not be resolved.
    ///
    /// ### 中文
    /// 动态库或其入口函数无法解析。
    #[error("resource load error: {0}")]
    ResourceLoad(String),

    /// ### English
    /// A native context/surface call failed; carries the native EGL error code.
    ///
    /// ### 中文
    /// 原生 context/surface 调用失败；携带原生 EGL 错误码。
    #[error("context creation error: {call} failed (EGL error 0x{code:04x})")]
    ContextCreation { call: &'static str, code: i32 },

    /// ### English
    /// Importing a native buffer as a GPU texture failed.
    ///
    /// ### 中文
    /// 将原生缓冲导入为 GPU 纹理失败。
    #[error("import error: {0}")]
    Import(String),

    /// ### English
    /// Shader compilation, program linking, or binding resolution failed.
    ///
    /// ### 中文
    /// 着色器编译、程序链接或绑定解析失败。
    #[error("shader compile error ({stage}): {log}")]
    ShaderCompile { stage: ShaderStage, log: String },

    /// ### English
    /// A GPU fence wait failed.
    ///
    /// ### 中文
    /// GPU fence 等待失败。
    #[error("sync error: {0}")]
    SyncTimeout(String),

    /// ### English
    /// Swap, front-buffer lock, or pageflip wait failed; the display pipeline is broken.
    ///
    /// ### 中文
    /// swap、锁定前缓冲或等待 pageflip 失败；显示管线已不可用。
    #[error("presentation error: {0}")]
    Presentation(String),

    /// ### English
    /// The worker thread panicked or never reported readiness.
    ///
    /// ### 中文
    /// worker 线程 panic 或未能报告就绪。
    #[error("worker lost: {0}")]
    WorkerLost(String),
}

impl BlitterError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn resource_load(msg: impl Into<String>) -> Self {
        Self::ResourceLoad(msg.into())
    }

    pub fn import(msg: impl Into<String>) -> Self {
        Self::Import(msg.into())
    }

    pub fn sync(msg: impl Into<String>) -> Self {
        Self::SyncTimeout(msg.into())
    }

    pub fn presentation(msg: impl Into<String>) -> Self {
        Self::Presentation(msg.into())
    }

    pub fn shader(stage: ShaderStage, log: impl Into<String>) -> Self {
        Self::ShaderCompile {
            stage,
            log: log.into(),
        }
    }

    /// ### English
    /// Returns whether this error only costs the current frame (the loop keeps running).
    ///
    /// ### 中文
    /// 返回该错误是否只影响当前帧（循环继续运行）。
    pub fn is_frame_local(&self) -> bool {
        matches!(self, Self::SyncTimeout(_) | Self::Import(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            BlitterError::configuration("x")
                .to_string()
                .starts_with("configuration error:")
        );
        assert!(
            BlitterError::resource_load("x")
                .to_string()
                .starts_with("resource load error:")
        );
        assert!(
            BlitterError::shader(ShaderStage::Fragment, "0:3 syntax")
                .to_string()
                .contains("(fragment): 0:3 syntax")
        );
    }

    #[test]
    fn context_error_carries_native_code() {
        let err = BlitterError::ContextCreation {
            call: "eglCreateContext",
            code: 0x3005,
        };
        assert_eq!(
            err.to_string(),
            "context creation error: eglCreateContext failed (EGL error 0x3005)"
        );
    }

    #[test]
    fn only_fence_and_import_failures_are_frame_local() {
        assert!(BlitterError::sync("fence").is_frame_local());
        assert!(BlitterError::import("fd").is_frame_local());
        assert!(!BlitterError::presentation("swap").is_frame_local());
        assert!(!BlitterError::configuration("x").is_frame_local());
    }
}
