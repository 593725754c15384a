//! Executable memory for the encoded program (unix only).
//!
//! A page is mapped read/write, filled through a [`Code`] view, then
//! flipped to read/execute before running, so the crate also works
//! under strict W^X policies.

use std::io;
use std::ptr;

use crate::Code;

/// An anonymous private mapping holding generated machine code.
#[derive(Debug)]
pub struct ExecutablePage {
    base: *mut u8,
    len: usize,
}

impl ExecutablePage {
    /// Maps at least `len` bytes of read/write memory, rounded up to
    /// whole pages.
    pub fn new(len: usize) -> io::Result<ExecutablePage> {
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
        let len = len.max(1).div_ceil(page_size) * page_size;
        let base = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok(ExecutablePage {
            base: base as *mut u8,
            len,
        })
    }

    /// The mapping's base address.
    pub fn base_addr(&self) -> u64 {
        self.base as u64
    }

    /// The mapping's size in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the mapping is empty (it never is).
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// A code view over the whole mapping, based at the real address so
    /// linker patches resolve against it.
    pub fn code(&mut self) -> Code<'_> {
        let bytes = unsafe { std::slice::from_raw_parts_mut(self.base, self.len) };
        Code::new(bytes, self.base as u64)
    }

    /// Remaps the page read/execute. Call after encoding and patching.
    pub fn finalize(&mut self) -> io::Result<()> {
        let result = unsafe {
            libc::mprotect(
                self.base as *mut libc::c_void,
                self.len,
                libc::PROT_READ | libc::PROT_EXEC,
            )
        };
        if result != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// The entry point at `addr` as a callable function.
    ///
    /// # Safety
    ///
    /// `addr` must point at a complete, finalized function inside this
    /// mapping that follows the System V AMD64 calling convention.
    pub unsafe fn entry(&self, addr: u64) -> extern "C" fn() -> i64 {
        debug_assert!(addr >= self.base_addr());
        debug_assert!(addr < self.base_addr() + self.len as u64);
        std::mem::transmute::<u64, extern "C" fn() -> i64>(addr)
    }
}

impl Drop for ExecutablePage {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base as *mut libc::c_void, self.len);
        }
    }
}
