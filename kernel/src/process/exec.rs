//! `execve`: replace the calling process's image.
//!
//! Loads an ELF64 binary (or follows one level of `#!` shebang) via
//! [`crate::elf`], builds a fresh [`Pagemap`] mapping its segments
//! `Direct` and the bulk of the stack `Anonymous`, and composes the
//! initial stack (argv/envp/auxv) the C runtime expects.

extern crate alloc;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use crate::arch::entropy::read_timestamp;
use crate::elf::{ElfBinary, ElfLoader, SegmentType};
use crate::error::{FsError, KernelError, KernelResult};
use crate::mm::pagemap::{Pagemap, PAGE_SIZE};
use crate::mm::{frame_allocator, phys_to_virt, PageFlags, PhysicalAddress};

use super::pcb::Process;

const USER_STACK_TOP: u64 = 0x7fff_ffff_f000;
/// 8 MiB stack reservation.
const USER_STACK_PAGES: usize = 2048;
/// Pages at the very top of the stack holding the prebuilt argv/envp/auxv
/// content; mapped `Direct` so the content exists without a page fault.
const STACK_CONTENT_PAGES: usize = 1;

const PF_X: u32 = 0x1;
const PF_W: u32 = 0x2;

const AT_NULL: u64 = 0;
const AT_PHDR: u64 = 3;
const AT_PHENT: u64 = 4;
const AT_PHNUM: u64 = 5;
const AT_PAGESZ: u64 = 6;
const AT_ENTRY: u64 = 9;
const AT_SECURE: u64 = 23;
const AT_RANDOM: u64 = 25;
const AT_EXECFN: u64 = 31;

/// Shebang recursion is allowed exactly one level deep; an interpreter
/// that is itself a script fails rather than looping.
const MAX_SHEBANG_DEPTH: u32 = 1;

/// Replace `process`'s address space with the program at `path`, whose
/// file contents are `image`. Returns the new [`Pagemap`], entry point
/// and initial `rsp`; the caller installs these into the process.
pub fn exec(
    process: &Arc<Process>,
    path: &str,
    image: &[u8],
    argv: &[String],
    envp: &[String],
) -> KernelResult<(Arc<Pagemap>, u64, u64)> {
    exec_inner(process, path, image, argv, envp, 0)
}

fn exec_inner(
    process: &Arc<Process>,
    path: &str,
    image: &[u8],
    argv: &[String],
    envp: &[String],
    shebang_depth: u32,
) -> KernelResult<(Arc<Pagemap>, u64, u64)> {
    let _ = process;

    if image.len() >= 2 && &image[0..2] == b"#!" {
        if shebang_depth >= MAX_SHEBANG_DEPTH {
            return Err(KernelError::FsError(FsError::NotSupported));
        }
        let (interpreter, interp_arg) = parse_shebang(image)?;
        let interp_image =
            crate::fs::read_file(&interpreter).map_err(|_| KernelError::FsError(FsError::NotFound))?;

        // argv becomes [interpreter, shebang-arg?, <original argv verbatim>].
        let mut new_argv = Vec::with_capacity(argv.len() + 2);
        new_argv.push(interpreter.clone());
        if let Some(arg) = interp_arg {
            new_argv.push(arg);
        }
        new_argv.extend_from_slice(argv);

        return exec_inner(
            process,
            &interpreter,
            &interp_image,
            &new_argv,
            envp,
            shebang_depth + 1,
        );
    }

    let binary = ElfLoader::new()
        .parse(image)
        .map_err(|_| KernelError::FsError(FsError::InvalidPath))?;
    let pagemap = Arc::new(Pagemap::new()?);

    load_segments(&pagemap, image, &binary)?;
    let stack_top = build_stack(&pagemap, path, &binary, argv, envp)?;

    Ok((pagemap, binary.entry_point, stack_top))
}

/// Parse a `#!interpreter [arg]\n` line. At most one optional argument is
/// recognized, matching the historical (non-`binfmt_misc`) shebang rule.
fn parse_shebang(image: &[u8]) -> KernelResult<(String, Option<String>)> {
    let line_end = image.iter().position(|&b| b == b'\n').unwrap_or(image.len());
    let line = core::str::from_utf8(&image[2..line_end])
        .map_err(|_| KernelError::FsError(FsError::InvalidPath))?
        .trim();

    let mut parts = line.splitn(2, char::is_whitespace);
    let interpreter = parts.next().filter(|s| !s.is_empty());
    let Some(interpreter) = interpreter else {
        return Err(KernelError::FsError(FsError::InvalidPath));
    };
    let arg = parts.next().map(str::trim).filter(|s| !s.is_empty());

    Ok((String::from(interpreter), arg.map(String::from)))
}

fn load_segments(pagemap: &Pagemap, image: &[u8], binary: &ElfBinary) -> KernelResult<()> {
    for segment in &binary.segments {
        if segment.segment_type != SegmentType::Load {
            continue;
        }
        let mut flags = PageFlags::PRESENT | PageFlags::USER;
        if segment.flags & PF_W != 0 {
            flags = flags | PageFlags::WRITABLE;
        }
        if segment.flags & PF_X == 0 {
            flags = flags | PageFlags::NO_EXECUTE;
        }

        let page_base = segment.virtual_addr & !(PAGE_SIZE - 1);
        let page_end =
            (segment.virtual_addr + segment.memory_size + PAGE_SIZE - 1) & !(PAGE_SIZE - 1);
        let page_count = ((page_end - page_base) / PAGE_SIZE) as usize;

        let mut frames = Vec::with_capacity(page_count);
        for _ in 0..page_count {
            frames.push(
                frame_allocator::alloc().ok_or_else(|| frame_allocator::oom_error(PAGE_SIZE as usize))?,
            );
        }
        for (i, &frame) in frames.iter().enumerate() {
            let dst = phys_to_virt(PhysicalAddress::new(frame.addr())).as_u64() as *mut u8;
            unsafe { core::ptr::write_bytes(dst, 0, PAGE_SIZE as usize) };
            let page_start = page_base + (i as u64) * PAGE_SIZE;
            let seg_in_file_start = segment.virtual_addr.max(page_start);
            let seg_in_file_end = (segment.virtual_addr + segment.file_size).min(page_start + PAGE_SIZE);
            if seg_in_file_end > seg_in_file_start {
                let file_off = (seg_in_file_start - segment.virtual_addr + segment.file_offset) as usize;
                let page_off = (seg_in_file_start - page_start) as usize;
                let len = (seg_in_file_end - seg_in_file_start) as usize;
                unsafe {
                    core::ptr::copy_nonoverlapping(image.as_ptr().add(file_off), dst.add(page_off), len);
                }
            }
        }
        pagemap.map_direct(page_base, &frames, flags)?;
    }
    Ok(())
}

/// Compose the initial user stack: random bytes, exec-path string,
/// environment strings, argv strings, an alignment pad, the auxv vector,
/// then the envp/argv pointer arrays and `argc`, with `rsp` 16-aligned
/// at the end. Returns the initial `rsp`.
fn build_stack(
    pagemap: &Pagemap,
    path: &str,
    binary: &ElfBinary,
    argv: &[String],
    envp: &[String],
) -> KernelResult<u64> {
    let content_base = USER_STACK_TOP - (STACK_CONTENT_PAGES as u64) * PAGE_SIZE;
    let stack_bottom = USER_STACK_TOP - (USER_STACK_PAGES as u64) * PAGE_SIZE;

    let random_bytes = random16();

    // String area, written low-to-high; offsets are recorded so the
    // pointer tables below can reference their final addresses.
    let mut strings: Vec<u8> = Vec::new();
    strings.extend_from_slice(&random_bytes);
    let random_off = 0usize;

    let execfn_off = strings.len();
    strings.extend_from_slice(path.as_bytes());
    strings.push(0);

    let mut argv_offs = Vec::with_capacity(argv.len());
    for a in argv {
        argv_offs.push(strings.len());
        strings.extend_from_slice(a.as_bytes());
        strings.push(0);
    }

    let mut envp_offs = Vec::with_capacity(envp.len());
    for e in envp {
        envp_offs.push(strings.len());
        strings.extend_from_slice(e.as_bytes());
        strings.push(0);
    }

    // Pad the string area so its base address is 8-aligned (USER_STACK_TOP
    // is page-aligned, so aligning the length suffices).
    while strings.len() % 8 != 0 {
        strings.push(0);
    }
    let strings_len = strings.len() as u64;
    let strings_base = USER_STACK_TOP - strings_len;

    let auxv: [(u64, u64); 9] = [
        (AT_PHDR, binary.phdr_vaddr),
        (AT_PHENT, binary.phentsize as u64),
        (AT_PHNUM, binary.phnum as u64),
        (AT_PAGESZ, PAGE_SIZE),
        (AT_ENTRY, binary.entry_point),
        (AT_EXECFN, strings_base + execfn_off as u64),
        (AT_RANDOM, strings_base + random_off as u64),
        (AT_SECURE, 0),
        (AT_NULL, 0),
    ];

    // Pointer table: argc, argv[], NULL, envp[], NULL, auxv pairs.
    let entries = 1 + (argv.len() + 1) + (envp.len() + 1) + auxv.len() * 2;
    let mut table_len = (entries as u64) * 8;
    // Leave room for one pad word if needed so the final rsp is 16-aligned.
    let unpadded_rsp = strings_base - table_len;
    let mut padded = false;
    if unpadded_rsp % 16 != 0 {
        table_len += 8;
        padded = true;
    }
    let rsp = strings_base - table_len;
    if rsp < stack_bottom + (USER_STACK_PAGES as u64 / 2) * PAGE_SIZE {
        // Guard against an absurdly long argv/envp eating the reservation.
        return Err(KernelError::FsError(FsError::NotSupported));
    }

    let mut table: Vec<u64> = Vec::with_capacity((table_len / 8) as usize);
    if padded {
        table.push(0); // alignment pad, sits just below argc
    }
    table.push(argv.len() as u64);
    for off in &argv_offs {
        table.push(strings_base + *off as u64);
    }
    table.push(0);
    for off in &envp_offs {
        table.push(strings_base + *off as u64);
    }
    table.push(0);
    for (key, val) in auxv {
        table.push(key);
        table.push(val);
    }

    // Render the content page(s): the pointer table at `rsp`, then the
    // string area above it, matching their final in-memory layout.
    let content_len = (USER_STACK_TOP - content_base) as usize;
    let mut content = vec![0u8; content_len];
    let table_bytes: &[u8] =
        unsafe { core::slice::from_raw_parts(table.as_ptr() as *const u8, table.len() * 8) };
    let table_off = (rsp - content_base) as usize;
    content[table_off..table_off + table_bytes.len()].copy_from_slice(table_bytes);
    let strings_off = (strings_base - content_base) as usize;
    content[strings_off..strings_off + strings.len()].copy_from_slice(&strings);

    let mut frames = Vec::with_capacity(STACK_CONTENT_PAGES);
    for _ in 0..STACK_CONTENT_PAGES {
        frames.push(
            frame_allocator::alloc().ok_or_else(|| frame_allocator::oom_error(PAGE_SIZE as usize))?,
        );
    }
    for (i, &frame) in frames.iter().enumerate() {
        let dst = phys_to_virt(PhysicalAddress::new(frame.addr())).as_u64() as *mut u8;
        unsafe { core::ptr::write_bytes(dst, 0, PAGE_SIZE as usize) };
        let off = i * PAGE_SIZE as usize;
        let len = (PAGE_SIZE as usize).min(content.len() - off);
        unsafe {
            core::ptr::copy_nonoverlapping(content.as_ptr().add(off), dst, len);
        }
    }
    pagemap.map_direct(
        content_base,
        &frames,
        PageFlags::PRESENT | PageFlags::WRITABLE | PageFlags::USER | PageFlags::NO_EXECUTE,
    )?;

    // The remainder of the reservation grows down on demand.
    let grow_pages = USER_STACK_PAGES - STACK_CONTENT_PAGES;
    pagemap.map_anonymous(
        stack_bottom,
        grow_pages,
        PageFlags::PRESENT | PageFlags::WRITABLE | PageFlags::USER | PageFlags::NO_EXECUTE,
    )?;

    Ok(rsp)
}

fn random16() -> [u8; 16] {
    let mut bytes = [0u8; 16];
    let a = read_timestamp();
    let b = read_timestamp().rotate_left(17) ^ 0x9E3779B97F4A7C15;
    bytes[0..8].copy_from_slice(&a.to_le_bytes());
    bytes[8..16].copy_from_slice(&b.to_le_bytes());
    bytes
}
