//! Error handling and C-ABI error codes for cidrtable

use crate::helpers::format_cidr;
use errno::Errno;
use std::cell::RefCell;
use std::os::raw::{c_char, c_int};
use thiserror::Error;

/// Every failure the engine reports. Nothing is retried internally; the
/// caller decides what to do with each kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("invalid table id {0}")]
    InvalidTableId(u32),
    #[error("invalid mask length {0}")]
    InvalidMask(u32),
    #[error("entry {} already exists", cidr(.prefix, .masklen))]
    Duplicate { prefix: u32, masklen: u8 },
    #[error("entry {} not found", cidr(.prefix, .masklen))]
    NotFound { prefix: u32, masklen: u8 },
    #[error("out of memory")]
    OutOfMemory,
    #[error("table set is not initialized")]
    NotInitialized,
    #[error("syntax error: {0}")]
    Syntax(String),
}

fn cidr(prefix: &u32, masklen: &u8) -> String {
    format_cidr(*prefix, *masklen)
}

impl Error {
    /// The errno value the classic control interface reports for this kind.
    pub fn errno(&self) -> Errno {
        Errno(match self {
            Error::InvalidTableId(_) | Error::InvalidMask(_) | Error::Syntax(_) => libc::EINVAL,
            Error::Duplicate { .. } => libc::EEXIST,
            Error::NotFound { .. } => libc::ESRCH,
            Error::OutOfMemory => libc::ENOMEM,
            Error::NotInitialized => libc::ENXIO,
        })
    }

    pub fn code(&self) -> ErrorCode {
        ErrorCode::from(self)
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    Success = 0,
    InvalidTableId = 1,
    InvalidMask = 2,
    Duplicate = 3,
    NotFound = 4,
    OutOfMemory = 5,
    NotInitialized = 6,
    Syntax = 7,
    InvalidArgument = 8,
    Unknown = 255,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        self.as_cstr().to_str().unwrap_or("Unknown error")
    }

    fn as_cstr(self) -> &'static std::ffi::CStr {
        match self {
            ErrorCode::Success => c"Success",
            ErrorCode::InvalidTableId => c"Invalid table id",
            ErrorCode::InvalidMask => c"Invalid mask length",
            ErrorCode::Duplicate => c"Entry already exists",
            ErrorCode::NotFound => c"Entry not found",
            ErrorCode::OutOfMemory => c"Out of memory",
            ErrorCode::NotInitialized => c"Table set not initialized",
            ErrorCode::Syntax => c"Syntax error",
            ErrorCode::InvalidArgument => c"Invalid argument",
            ErrorCode::Unknown => c"Unknown error",
        }
    }

    /// Decode a code coming back from C; anything unrecognised is `Unknown`.
    pub fn from_raw(raw: c_int) -> Self {
        match raw {
            0 => ErrorCode::Success,
            1 => ErrorCode::InvalidTableId,
            2 => ErrorCode::InvalidMask,
            3 => ErrorCode::Duplicate,
            4 => ErrorCode::NotFound,
            5 => ErrorCode::OutOfMemory,
            6 => ErrorCode::NotInitialized,
            7 => ErrorCode::Syntax,
            8 => ErrorCode::InvalidArgument,
            _ => ErrorCode::Unknown,
        }
    }
}

impl From<&Error> for ErrorCode {
    fn from(e: &Error) -> Self {
        match e {
            Error::InvalidTableId(_) => ErrorCode::InvalidTableId,
            Error::InvalidMask(_) => ErrorCode::InvalidMask,
            Error::Duplicate { .. } => ErrorCode::Duplicate,
            Error::NotFound { .. } => ErrorCode::NotFound,
            Error::OutOfMemory => ErrorCode::OutOfMemory,
            Error::NotInitialized => ErrorCode::NotInitialized,
            Error::Syntax(_) => ErrorCode::Syntax,
        }
    }
}

// Thread-local last error for C-ABI
thread_local! {
    static LAST_ERROR: RefCell<ErrorCode> = const { RefCell::new(ErrorCode::Success) };
}

pub fn set_last_error(code: ErrorCode) {
    LAST_ERROR.with(|cell| *cell.borrow_mut() = code);
}

pub fn get_last_error() -> ErrorCode {
    LAST_ERROR.with(|cell| *cell.borrow())
}

#[no_mangle]
pub extern "C" fn cidrtable_last_error() -> ErrorCode {
    get_last_error()
}

/// Static, NUL-terminated description of `code`. Takes the raw integer so
/// any value C hands us is well defined.
#[no_mangle]
pub extern "C" fn cidrtable_strerror(code: c_int) -> *const c_char {
    ErrorCode::from_raw(code).as_cstr().as_ptr()
}
