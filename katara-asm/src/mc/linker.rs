//! The in-process linker.
//!
//! Func and block addresses are recorded as the machine program is
//! emitted; call/jmp/jcc instructions register 4-byte patch sites.
//! `apply_patches` rewrites every site with the little-endian
//! PC-relative offset `target - (site + 4)`.

use std::collections::BTreeMap;

use tracing::debug;

use crate::ops::{BlockRef, FuncRef};
use crate::{Code, LinkError};

/// Address maps and pending patch sites.
#[derive(Debug, Default)]
pub struct Linker {
    func_addrs: BTreeMap<i64, u64>,
    block_addrs: BTreeMap<i64, u64>,
    func_patches: Vec<(FuncRef, u64)>,
    block_patches: Vec<(BlockRef, u64)>,
}

impl Linker {
    /// Creates an empty linker.
    pub fn new() -> Linker {
        Linker::default()
    }

    /// Records the address of a func. External functions (for example
    /// libc's `malloc`) can be registered by absolute address, as long
    /// as the PC-relative offsets stay within 32 bits.
    pub fn add_func_addr(&mut self, func_id: i64, addr: u64) {
        self.func_addrs.insert(func_id, addr);
    }

    /// Records the address of a block.
    pub fn add_block_addr(&mut self, block_id: i64, addr: u64) {
        self.block_addrs.insert(block_id, addr);
    }

    /// Registers a 4-byte func patch site at `site`.
    pub fn add_func_ref(&mut self, func_ref: FuncRef, site: u64) {
        self.func_patches.push((func_ref, site));
    }

    /// Registers a 4-byte block patch site at `site`.
    pub fn add_block_ref(&mut self, block_ref: BlockRef, site: u64) {
        self.block_patches.push((block_ref, site));
    }

    /// The recorded address of a func.
    pub fn func_addr(&self, func_id: i64) -> Option<u64> {
        self.func_addrs.get(&func_id).copied()
    }

    /// The recorded address of a block.
    pub fn block_addr(&self, block_id: i64) -> Option<u64> {
        self.block_addrs.get(&block_id).copied()
    }

    /// Rewrites every patch site inside `code` with its PC-relative
    /// offset. Patches apply in registration order; the result does not
    /// depend on that order.
    pub fn apply_patches(&self, code: &mut Code<'_>) -> Result<(), LinkError> {
        for &(func_ref, site) in &self.func_patches {
            let target = self
                .func_addr(func_ref.func_id())
                .ok_or(LinkError::UnresolvedFuncRef(func_ref.func_id()))?;
            patch(code, site, target)?;
        }
        for &(block_ref, site) in &self.block_patches {
            let target = self
                .block_addr(block_ref.block_id())
                .ok_or(LinkError::UnresolvedBlockRef(block_ref.block_id()))?;
            patch(code, site, target)?;
        }
        debug!(
            func_patches = self.func_patches.len(),
            block_patches = self.block_patches.len(),
            "applied patches"
        );
        Ok(())
    }
}

fn patch(code: &mut Code<'_>, site: u64, target: u64) -> Result<(), LinkError> {
    let offset = (target as i64).wrapping_sub(site as i64 + 4);
    let offset = i32::try_from(offset).map_err(|_| LinkError::OffsetOutOfRange {
        site,
        target,
    })?;
    let index = site
        .checked_sub(code.base())
        .ok_or(LinkError::OffsetOutOfRange { site, target })? as usize;
    for (byte_index, byte) in offset.to_le_bytes().into_iter().enumerate() {
        code.set(index + byte_index, byte)?;
    }
    Ok(())
}
