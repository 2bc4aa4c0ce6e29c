use core::fmt;

/// A header did not fit between its offset and the end of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Truncated;

impl fmt::Display for Truncated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("header runs past end of frame")
    }
}

/// A fixed-size wire header that can be copied out of a frame.
pub trait Header: Sized {
    /// Size on the wire in bytes.
    const LEN: usize;

    /// Reads the header starting at `offset`, failing if `offset + LEN`
    /// exceeds the frame.
    fn read(view: &PacketView<'_>, offset: usize) -> Result<Self, Truncated>;
}

/// Read-only view over a single frame.
///
/// The view never hands out bytes past its end; offsets that overflow are
/// treated the same as offsets past the end.
#[derive(Debug, Clone, Copy)]
pub struct PacketView<'a> {
    data: &'a [u8],
}

impl<'a> PacketView<'a> {
    #[inline(always)]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether `len` bytes starting at `offset` lie inside the frame.
    #[inline(always)]
    pub fn fits(&self, offset: usize, len: usize) -> bool {
        match offset.checked_add(len) {
            Some(end) => end <= self.data.len(),
            None => false,
        }
    }

    #[inline(always)]
    pub fn bytes(&self, offset: usize, len: usize) -> Result<&'a [u8], Truncated> {
        let end = offset.checked_add(len).ok_or(Truncated)?;
        self.data.get(offset..end).ok_or(Truncated)
    }

    #[inline(always)]
    pub fn array<const N: usize>(&self, offset: usize) -> Result<[u8; N], Truncated> {
        let src = self.bytes(offset, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(src);
        Ok(out)
    }

    #[inline(always)]
    pub fn u8_at(&self, offset: usize) -> Result<u8, Truncated> {
        self.data.get(offset).copied().ok_or(Truncated)
    }

    #[inline(always)]
    pub fn u16_be_at(&self, offset: usize) -> Result<u16, Truncated> {
        self.array::<2>(offset).map(u16::from_be_bytes)
    }

    #[inline(always)]
    pub fn header<H: Header>(&self, offset: usize) -> Result<H, Truncated> {
        H::read(self, offset)
    }
}

/// Mutable view over a single frame, used for in-place address rewrites.
#[derive(Debug)]
pub struct PacketViewMut<'a> {
    data: &'a mut [u8],
}

impl<'a> PacketViewMut<'a> {
    #[inline(always)]
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline(always)]
    pub fn as_view(&self) -> PacketView<'_> {
        PacketView::new(self.data)
    }

    /// Copies `src` into the frame at `offset`. Nothing is written unless the
    /// whole range fits.
    #[inline(always)]
    pub fn store_bytes(&mut self, offset: usize, src: &[u8]) -> Result<(), Truncated> {
        let end = offset.checked_add(src.len()).ok_or(Truncated)?;
        let dst = self.data.get_mut(offset..end).ok_or(Truncated)?;
        dst.copy_from_slice(src);
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_in_bounds() {
        let buf = [1u8, 2, 3, 4];
        let view = PacketView::new(&buf);
        assert_eq!(view.bytes(1, 3), Ok(&buf[1..4]));
        assert_eq!(view.bytes(4, 0), Ok(&buf[4..4]));
    }

    #[test]
    fn test_bytes_past_end() {
        let buf = [0u8; 4];
        let view = PacketView::new(&buf);
        assert_eq!(view.bytes(2, 3), Err(Truncated));
        assert_eq!(view.bytes(5, 0), Err(Truncated));
        assert_eq!(view.u8_at(4), Err(Truncated));
    }

    #[test]
    fn test_offset_overflow() {
        let buf = [0u8; 4];
        let view = PacketView::new(&buf);
        assert!(!view.fits(usize::MAX, 2));
        assert_eq!(view.bytes(usize::MAX, 2), Err(Truncated));
    }

    #[test]
    fn test_u16_be() {
        let buf = [0x86, 0xdd];
        assert_eq!(PacketView::new(&buf).u16_be_at(0), Ok(0x86dd));
    }

    #[test]
    fn test_store_bytes_all_or_nothing() {
        let mut buf = [0xffu8; 8];
        let mut view = PacketViewMut::new(&mut buf);
        assert_eq!(view.store_bytes(6, &[0, 0, 0]), Err(Truncated));
        assert_eq!(view.as_bytes(), &[0xff; 8]);

        assert_eq!(view.store_bytes(6, &[0, 0]), Ok(()));
        assert_eq!(&view.as_bytes()[6..], &[0, 0]);
    }
}
