//! ### English
//! Minimal `dlopen`/`dlsym` wrapper used to resolve the native graphics libraries at runtime.
//!
//! ### 中文
//! 最小的 `dlopen`/`dlsym` 封装，用于在运行时解析原生图形库。
use std::ffi::{CStr, c_void};

use tracing::debug;

use crate::engine::error::{BlitterError, BlitterResult};

/// ### English
/// An open shared library; closed on drop.
///
/// ### 中文
/// 已打开的共享库；drop 时关闭。
pub(crate) struct DynamicLibrary {
    handle: *mut c_void,
    name: &'static CStr,
}

impl DynamicLibrary {
    /// ### English
    /// Opens the first library in `names` that the dynamic linker can find.
    ///
    /// ### 中文
    /// 打开 `names` 中第一个能被动态链接器找到的库。
    pub(crate) fn open_first(names: &[&'static CStr]) -> BlitterResult<Self> {
        for &name in names {
            let handle = unsafe { libc::dlopen(name.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
            if !handle.is_null() {
                debug!(library = ?name, "Loaded graphics library");
                return Ok(Self { handle, name });
            }
        }
        Err(BlitterError::resource_load(format!(
            "failed to load any of {names:?}"
        )))
    }

    pub(crate) fn name(&self) -> &'static CStr {
        self.name
    }

    /// ### English
    /// Looks up a raw symbol address; null when absent.
    ///
    /// ### 中文
    /// 查找原始符号地址；不存在时返回空指针。
    pub(crate) fn raw_symbol(&self, name: &CStr) -> *mut c_void {
        unsafe { libc::dlsym(self.handle, name.as_ptr()) }
    }

    /// ### English
    /// Looks up `name` and reinterprets it as the function pointer type `T`.
    ///
    /// #### Safety
    /// `T` must be a function pointer type matching the symbol's real signature.
    ///
    /// ### 中文
    /// 查找 `name` 并将其重新解释为函数指针类型 `T`。
    ///
    /// #### 安全性
    /// `T` 必须是与该符号真实签名一致的函数指针类型。
    pub(crate) unsafe fn symbol<T: Copy>(&self, name: &CStr) -> Option<T> {
        unsafe { cast_symbol(self.raw_symbol(name)) }
    }
}

impl Drop for DynamicLibrary {
    fn drop(&mut self) {
        unsafe {
            libc::dlclose(self.handle);
        }
    }
}

/// ### English
/// Reinterprets a non-null symbol address as `T`.
///
/// #### Safety
/// `T` must be a pointer-sized function pointer type matching the symbol's real signature.
///
/// ### 中文
/// 将非空符号地址重新解释为 `T`。
///
/// #### 安全性
/// `T` 必须是指针大小、且与符号真实签名一致的函数指针类型。
pub(crate) unsafe fn cast_symbol<T: Copy>(addr: *mut c_void) -> Option<T> {
    debug_assert_eq!(size_of::<T>(), size_of::<*mut c_void>());
    if addr.is_null() {
        return None;
    }
    Some(unsafe { std::mem::transmute_copy(&addr) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_libraries_are_a_resource_load_error() {
        let err = DynamicLibrary::open_first(&[c"libdefinitely-not-here.so.0"])
            .err()
            .unwrap();
        assert!(matches!(err, BlitterError::ResourceLoad(_)));
    }

    #[test]
    fn null_symbols_do_not_cast() {
        let f = unsafe { cast_symbol::<extern "C" fn()>(std::ptr::null_mut()) };
        assert!(f.is_none());
    }
}
