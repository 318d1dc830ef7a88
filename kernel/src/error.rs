//! Kernel-wide error types.
//!
//! Internal subsystems return `Result<T, KernelError>` (or a narrower
//! per-subsystem enum that converts into it). At the syscall boundary
//! (`syscall::dispatch`) a `KernelError` is converted into a negated POSIX
//! errno via [`KernelError::to_errno`], matching the ABI described in
//! SPEC_FULL.md §7.

use core::fmt;

/// Main kernel error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "kernel errors must be handled, not silently discarded"]
pub enum KernelError {
    OutOfMemory { requested: usize, available: usize },
    InvalidAddress { addr: usize },
    UnmappedMemory { addr: usize },

    ProcessNotFound { pid: u64 },
    ThreadNotFound { tid: u64 },
    NoSuchGroup { pgid: u32 },
    NoChildren,
    InvalidState { expected: &'static str, actual: &'static str },

    SchedulerError(SchedError),
    SyscallError(SyscallError),
    FsError(FsError),
    NetError(NetError),

    HardwareError { device: &'static str, code: u32 },

    InvalidArgument { name: &'static str, value: &'static str },
    OperationNotSupported { operation: &'static str },
    ResourceExhausted { resource: &'static str },
    PermissionDenied { operation: &'static str },
    AlreadyExists { resource: &'static str, id: u64 },
    NotFound { resource: &'static str, id: u64 },
    Timeout { operation: &'static str, duration_ms: u64 },
    NotImplemented { feature: &'static str },

    /// Operation would block (non-blocking mode, `-EWOULDBLOCK`/`-EAGAIN`).
    WouldBlock,
    /// A blocked call was woken by signal delivery (`-EINTR`).
    Interrupted,
    /// Write end closed (reader gone) or read end closed (`-EPIPE`).
    BrokenPipe,
    NotInitialized { subsystem: &'static str },
}

/// Scheduler-specific errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    InvalidPriority { priority: u8 },
    InvalidCpuId { cpu: usize },
    TaskNotFound { id: u64 },
    QueueEmpty,
    AlreadyScheduled,
}

/// System call errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    InvalidSyscall { nr: usize },
    InvalidArgument { arg: usize },
    InvalidPointer { addr: usize },
    BufferTooSmall { required: usize, provided: usize },
    StringTooLong { max: usize },
    AccessDenied,
    NotImplemented,
}

/// Filesystem-specific errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    NotFound,
    AlreadyExists,
    PermissionDenied,
    NotADirectory,
    NotAFile,
    IsADirectory,
    ReadOnly,
    InvalidPath,
    NoRootFs,
    AlreadyMounted,
    NotMounted,
    UnknownFsType,
    IoError,
    DirectoryNotEmpty,
    TooManyOpenFiles,
    BadFileDescriptor,
    NotSupported,
    NotASymlink,
    FileTooLarge,
    IllegalSeek,
    WouldBlock,
    BrokenPipe,
    Interrupted,
    TooManySymlinks,
    NameTooLong,
}

/// Network-specific errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetError {
    NoRoute,
    AddressInUse,
    ConnectionRefused,
    WrongSocketType,
    ProtocolNotSupported,
    TimedOut,
    WouldBlock,
    NotConnected,
    HostUnreachable,
    MessageTooLarge,
}

pub type KernelResult<T> = Result<T, KernelError>;

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory { requested, available } => write!(
                f,
                "out of memory: requested {requested} bytes, {available} available"
            ),
            Self::InvalidAddress { addr } => write!(f, "invalid address: {addr:#x}"),
            Self::UnmappedMemory { addr } => write!(f, "unmapped memory at {addr:#x}"),
            Self::ProcessNotFound { pid } => write!(f, "process {pid} not found"),
            Self::ThreadNotFound { tid } => write!(f, "thread {tid} not found"),
            Self::NoSuchGroup { pgid } => write!(f, "process group {pgid} not found"),
            Self::NoChildren => write!(f, "no child processes"),
            Self::InvalidState { expected, actual } => {
                write!(f, "invalid state: expected {expected}, got {actual}")
            }
            Self::SchedulerError(e) => write!(f, "scheduler error: {e:?}"),
            Self::SyscallError(e) => write!(f, "syscall error: {e:?}"),
            Self::FsError(e) => write!(f, "filesystem error: {e:?}"),
            Self::NetError(e) => write!(f, "network error: {e:?}"),
            Self::HardwareError { device, code } => {
                write!(f, "hardware error on {device}: {code:#x}")
            }
            Self::InvalidArgument { name, value } => {
                write!(f, "invalid argument '{name}': {value}")
            }
            Self::OperationNotSupported { operation } => {
                write!(f, "operation not supported: {operation}")
            }
            Self::ResourceExhausted { resource } => write!(f, "resource exhausted: {resource}"),
            Self::PermissionDenied { operation } => {
                write!(f, "permission denied for: {operation}")
            }
            Self::AlreadyExists { resource, id } => {
                write!(f, "{resource} {id} already exists")
            }
            Self::NotFound { resource, id } => write!(f, "{resource} {id} not found"),
            Self::Timeout { operation, duration_ms } => {
                write!(f, "timeout during {operation}: {duration_ms}ms")
            }
            Self::NotImplemented { feature } => write!(f, "not implemented: {feature}"),
            Self::WouldBlock => write!(f, "operation would block"),
            Self::Interrupted => write!(f, "interrupted by signal"),
            Self::BrokenPipe => write!(f, "broken pipe"),
            Self::NotInitialized { subsystem } => write!(f, "subsystem not initialized: {subsystem}"),
        }
    }
}

/// POSIX errno values used by [`KernelError::to_errno`].
///
/// Only the subset referenced by SPEC_FULL.md §7 is enumerated; values
/// follow the conventional Linux x86_64 numbering.
pub mod errno {
    pub const EPERM: i32 = 1;
    pub const ENOENT: i32 = 2;
    pub const ESRCH: i32 = 3;
    pub const EINTR: i32 = 4;
    pub const EIO: i32 = 5;
    pub const EAGAIN: i32 = 11;
    pub const ENOMEM: i32 = 12;
    pub const EACCES: i32 = 13;
    pub const EFAULT: i32 = 14;
    pub const EEXIST: i32 = 17;
    pub const ENOTDIR: i32 = 20;
    pub const EISDIR: i32 = 21;
    pub const EINVAL: i32 = 22;
    pub const ENFILE: i32 = 23;
    pub const EMFILE: i32 = 24;
    pub const ENOTTY: i32 = 25;
    pub const EFBIG: i32 = 27;
    pub const ENOSPC: i32 = 28;
    pub const ESPIPE: i32 = 29;
    pub const EPIPE: i32 = 32;
    pub const ENAMETOOLONG: i32 = 36;
    pub const ENOSYS: i32 = 38;
    pub const ENOTEMPTY: i32 = 39;
    pub const ELOOP: i32 = 40;
    pub const ENOTSOCK: i32 = 88;
    pub const EPROTOTYPE: i32 = 91;
    pub const ENOPROTOOPT: i32 = 92;
    pub const EADDRINUSE: i32 = 98;
    pub const ENETUNREACH: i32 = 101;
    pub const ECONNREFUSED: i32 = 111;
    pub const ETIMEDOUT: i32 = 110;
    pub const ECHILD: i32 = 10;
    pub const EWOULDBLOCK: i32 = EAGAIN;
    pub const EBADF: i32 = 9;
}

impl KernelError {
    /// Map to a negated POSIX errno suitable as a raw syscall return value.
    pub fn to_errno(self) -> isize {
        use errno::*;
        let e = match self {
            Self::OutOfMemory { .. } => ENOMEM,
            Self::InvalidAddress { .. } | Self::UnmappedMemory { .. } => EFAULT,
            Self::ProcessNotFound { .. } | Self::ThreadNotFound { .. } => ESRCH,
            Self::NoSuchGroup { .. } => ESRCH,
            Self::NoChildren => ECHILD,
            Self::InvalidState { .. } => EINVAL,
            Self::SchedulerError(_) => EINVAL,
            Self::SyscallError(SyscallError::InvalidSyscall { .. }) => ENOSYS,
            Self::SyscallError(SyscallError::AccessDenied) => EACCES,
            Self::SyscallError(_) => EINVAL,
            Self::FsError(fs) => fs_errno(fs),
            Self::NetError(net) => net_errno(net),
            Self::HardwareError { .. } => EIO,
            Self::InvalidArgument { .. } => EINVAL,
            Self::OperationNotSupported { .. } => ENOSYS,
            Self::ResourceExhausted { .. } => ENOMEM,
            Self::PermissionDenied { .. } => EACCES,
            Self::AlreadyExists { .. } => EEXIST,
            Self::NotFound { .. } => ENOENT,
            Self::Timeout { .. } => ETIMEDOUT,
            Self::NotImplemented { .. } => ENOSYS,
            Self::WouldBlock => EWOULDBLOCK,
            Self::Interrupted => EINTR,
            Self::BrokenPipe => EPIPE,
            Self::NotInitialized { .. } => EINVAL,
        };
        -(e as isize)
    }
}

fn fs_errno(e: FsError) -> i32 {
    use errno::*;
    match e {
        FsError::NotFound => ENOENT,
        FsError::AlreadyExists => EEXIST,
        FsError::PermissionDenied => EACCES,
        FsError::NotADirectory => ENOTDIR,
        FsError::NotAFile | FsError::IsADirectory => EISDIR,
        FsError::ReadOnly => EACCES,
        FsError::InvalidPath => EINVAL,
        FsError::NoRootFs => ENOENT,
        FsError::AlreadyMounted | FsError::NotMounted => EINVAL,
        FsError::UnknownFsType => EINVAL,
        FsError::IoError => EIO,
        FsError::DirectoryNotEmpty => ENOTEMPTY,
        FsError::TooManyOpenFiles => EMFILE,
        FsError::BadFileDescriptor => EBADF,
        FsError::NotSupported => ENOSYS,
        FsError::NotASymlink => EINVAL,
        FsError::FileTooLarge => EFBIG,
        FsError::IllegalSeek => ESPIPE,
        FsError::WouldBlock => EWOULDBLOCK,
        FsError::BrokenPipe => EPIPE,
        FsError::Interrupted => EINTR,
        FsError::TooManySymlinks => ELOOP,
        FsError::NameTooLong => ENAMETOOLONG,
    }
}

fn net_errno(e: NetError) -> i32 {
    use errno::*;
    match e {
        NetError::NoRoute | NetError::HostUnreachable => ENETUNREACH,
        NetError::AddressInUse => EADDRINUSE,
        NetError::ConnectionRefused => ECONNREFUSED,
        NetError::WrongSocketType => EPROTOTYPE,
        NetError::ProtocolNotSupported => ENOPROTOOPT,
        NetError::TimedOut => ETIMEDOUT,
        NetError::WouldBlock => EWOULDBLOCK,
        NetError::NotConnected => EINVAL,
        NetError::MessageTooLarge => EFBIG,
    }
}

impl From<SchedError> for KernelError {
    fn from(e: SchedError) -> Self {
        Self::SchedulerError(e)
    }
}

impl From<SyscallError> for KernelError {
    fn from(e: SyscallError) -> Self {
        Self::SyscallError(e)
    }
}

impl From<FsError> for KernelError {
    fn from(e: FsError) -> Self {
        Self::FsError(e)
    }
}

impl From<NetError> for KernelError {
    fn from(e: NetError) -> Self {
        Self::NetError(e)
    }
}
