//! Classification of listener errors that mean "the socket was shut down on purpose".
//!
//! The codes differ per operating system, so each platform gets its own table.

use std::io;

/// Operating system family used to interpret raw error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Linux,
    MacOs,
    Other,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub const fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else if cfg!(target_os = "linux") || cfg!(target_os = "android") {
            Self::Linux
        } else if cfg!(target_vendor = "apple") {
            Self::MacOs
        } else {
            Self::Other
        }
    }
}

// ERROR_INVALID_FUNCTION, ERROR_INVALID_HANDLE, ERROR_OPERATION_ABORTED,
// WSAEINTR, WSAENOTSOCK
const WINDOWS_ABORT_CODES: &[i32] = &[1, 6, 995, 10004, 10038];
// EBADF, EINVAL, ECANCELED
const LINUX_ABORT_CODES: &[i32] = &[9, 22, 125];
// EBADF, EINVAL, ECANCELED
const MACOS_ABORT_CODES: &[i32] = &[9, 22, 89];
// EBADF, EINVAL
const OTHER_ABORT_CODES: &[i32] = &[9, 22];

/// Whether `code` is an error the listener reports after being aborted deliberately.
pub fn is_intentional_abort(code: i32, platform: Platform) -> bool {
    let codes = match platform {
        Platform::Windows => WINDOWS_ABORT_CODES,
        Platform::Linux => LINUX_ABORT_CODES,
        Platform::MacOs => MACOS_ABORT_CODES,
        Platform::Other => OTHER_ABORT_CODES,
    };
    codes.contains(&code)
}

/// Classify an accept error on the current platform.
pub(crate) fn is_listener_abort(err: &io::Error) -> bool {
    err.raw_os_error()
        .is_some_and(|code| is_intentional_abort(code, Platform::current()))
}
