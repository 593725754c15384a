//! Bounds-checked views over mutable code buffers.

use crate::BufferError;

/// A view over a contiguous mutable byte region with a base address for
/// PC-relative math. Sub-views advance the base accordingly.
///
/// The dummy variant maps every index to a scratch byte and views to
/// itself; it prices an encoding without emitting it.
#[derive(Debug)]
pub struct Code<'a> {
    repr: Repr<'a>,
}

#[derive(Debug)]
enum Repr<'a> {
    Real { bytes: &'a mut [u8], base: u64 },
    Dummy { scratch: u8 },
}

impl<'a> Code<'a> {
    /// Creates a view over `bytes` based at address `base`.
    pub fn new(bytes: &'a mut [u8], base: u64) -> Code<'a> {
        Code {
            repr: Repr::Real { bytes, base },
        }
    }

    /// Creates the dummy view.
    pub fn dummy() -> Code<'static> {
        Code {
            repr: Repr::Dummy { scratch: 0 },
        }
    }

    /// The base address of the view. The dummy view is based at zero.
    pub fn base(&self) -> u64 {
        match &self.repr {
            Repr::Real { base, .. } => *base,
            Repr::Dummy { .. } => 0,
        }
    }

    /// The number of addressable bytes. The dummy view accepts any
    /// index.
    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Real { bytes, .. } => bytes.len(),
            Repr::Dummy { .. } => usize::MAX,
        }
    }

    /// Whether the view is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads the byte at `index`.
    pub fn get(&self, index: usize) -> Result<u8, BufferError> {
        match &self.repr {
            Repr::Real { bytes, .. } => {
                bytes.get(index).copied().ok_or(BufferError::OutOfBounds {
                    index,
                    size: bytes.len(),
                })
            }
            Repr::Dummy { scratch } => Ok(*scratch),
        }
    }

    /// Writes the byte at `index`.
    pub fn set(&mut self, index: usize, value: u8) -> Result<(), BufferError> {
        match &mut self.repr {
            Repr::Real { bytes, .. } => {
                let size = bytes.len();
                let slot = bytes
                    .get_mut(index)
                    .ok_or(BufferError::OutOfBounds { index, size })?;
                *slot = value;
                Ok(())
            }
            Repr::Dummy { scratch } => {
                *scratch = value;
                Ok(())
            }
        }
    }

    /// A sub-view starting at `start`, based at `base() + start`.
    pub fn view(&mut self, start: usize) -> Result<Code<'_>, BufferError> {
        match &mut self.repr {
            Repr::Real { bytes, base } => {
                let size = bytes.len();
                if start > size {
                    return Err(BufferError::OutOfBounds { index: start, size });
                }
                Ok(Code::new(&mut bytes[start..], *base + start as u64))
            }
            Repr::Dummy { .. } => Ok(Code::dummy()),
        }
    }

    /// A sub-view over `start..end`.
    pub fn view_range(&mut self, start: usize, end: usize) -> Result<Code<'_>, BufferError> {
        match &mut self.repr {
            Repr::Real { bytes, base } => {
                let size = bytes.len();
                if start > size {
                    return Err(BufferError::OutOfBounds { index: start, size });
                }
                if end > size {
                    return Err(BufferError::OutOfBounds { index: end, size });
                }
                if start > end {
                    return Err(BufferError::InvertedRange { start, end });
                }
                Ok(Code::new(&mut bytes[start..end], *base + start as u64))
            }
            Repr::Dummy { .. } => Ok(Code::dummy()),
        }
    }
}
