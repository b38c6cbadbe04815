/// A bounds-checked reader over a byte slice.
#[derive(Debug, Clone)]
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    /// The position in bytes.
    cur_pos: usize,
}

impl<'a> Reader<'a> {
    #[inline(always)]
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, cur_pos: 0 }
    }

    /// Read the given number of bytes.
    #[inline(always)]
    pub(crate) fn read_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        let bytes = self.peek_bytes(len)?;
        self.cur_pos += len;

        Some(bytes)
    }

    /// Read a fixed-size array of bytes.
    #[inline(always)]
    pub(crate) fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        self.read_bytes(N)?.try_into().ok()
    }

    /// Peek the given number of bytes.
    #[inline(always)]
    pub(crate) fn peek_bytes(&self, len: usize) -> Option<&'a [u8]> {
        let end = self.cur_pos.checked_add(len)?;
        self.data.get(self.cur_pos..end)
    }
}
