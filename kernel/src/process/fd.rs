//! Per-process file descriptor table (component L wiring).
//!
//! Pipe ends aren't [`crate::fs::VfsNode`]s (see `fs::pipe`), so they get
//! their own small descriptor kind here rather than forcing them through
//! `fs::FileTable`, which remains the home for regular VFS-backed opens.

extern crate alloc;
use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::Mutex;

use crate::error::{FsError, KernelError, KernelResult};
use crate::fs::pipe::{PipeReader, PipeWriter};

/// Reserve descriptors 0-2 for stdio, matching POSIX convention.
const FIRST_FD: usize = 3;

pub enum Descriptor {
    PipeReader(Arc<PipeReader>),
    PipeWriter(Arc<PipeWriter>),
}

pub struct FdTable {
    slots: Mutex<Vec<Option<Descriptor>>>,
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FdTable {
    pub fn new() -> Self {
        Self { slots: Mutex::new(alloc::vec![None, None, None]) }
    }

    /// Install `desc` in the first free slot at or after [`FIRST_FD`].
    pub fn insert(&self, desc: Descriptor) -> i32 {
        let mut slots = self.slots.lock();
        for (fd, slot) in slots.iter_mut().enumerate().skip(FIRST_FD) {
            if slot.is_none() {
                *slot = Some(desc);
                return fd as i32;
            }
        }
        slots.push(Some(desc));
        (slots.len() - 1) as i32
    }

    pub fn read(&self, fd: i32, buf: &mut [u8]) -> KernelResult<usize> {
        let slots = self.slots.lock();
        match fd_slot(&slots, fd)? {
            Descriptor::PipeReader(r) => {
                r.read(buf).map_err(|_| KernelError::FsError(FsError::IoError))
            }
            Descriptor::PipeWriter(_) => {
                Err(KernelError::FsError(FsError::BadFileDescriptor))
            }
        }
    }

    pub fn write(&self, fd: i32, data: &[u8]) -> KernelResult<usize> {
        let slots = self.slots.lock();
        match fd_slot(&slots, fd)? {
            Descriptor::PipeWriter(w) => {
                w.write(data).map_err(|_| KernelError::FsError(FsError::IoError))
            }
            Descriptor::PipeReader(_) => {
                Err(KernelError::FsError(FsError::BadFileDescriptor))
            }
        }
    }

    pub fn close(&self, fd: i32) -> KernelResult<()> {
        let mut slots = self.slots.lock();
        let slot = slots
            .get_mut(fd_index(fd)?)
            .ok_or(KernelError::FsError(FsError::BadFileDescriptor))?;
        if slot.is_none() {
            return Err(KernelError::FsError(FsError::BadFileDescriptor));
        }
        *slot = None;
        Ok(())
    }
}

fn fd_index(fd: i32) -> KernelResult<usize> {
    if fd < 0 {
        return Err(KernelError::FsError(FsError::BadFileDescriptor));
    }
    Ok(fd as usize)
}

fn fd_slot(slots: &[Option<Descriptor>], fd: i32) -> KernelResult<&Descriptor> {
    slots
        .get(fd_index(fd)?)
        .and_then(|s| s.as_ref())
        .ok_or(KernelError::FsError(FsError::BadFileDescriptor))
}
