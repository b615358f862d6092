use thiserror::Error;

/// A read ran past the end of the input.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("truncated input: {need} byte(s) needed at offset {offset}, {len} available")]
pub struct Truncated {
    pub offset: usize,
    pub need: usize,
    pub len: usize,
}

/// Bounds-checked reader over kernel-produced bytes in native byte order.
#[derive(Clone, Debug)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

macro_rules! read {
    ($name:ident, $ty:ty) => {
        pub fn $name(&mut self) -> Result<$ty, Truncated> {
            let bytes = self.bytes(size_of::<$ty>())?;
            let mut array = [0; size_of::<$ty>()];
            array.copy_from_slice(bytes);
            Ok(<$ty>::from_ne_bytes(array))
        }
    };
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    read!(u16, u16);
    read!(u32, u32);
    read!(u64, u64);

    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8], Truncated> {
        if len > self.remaining() {
            return Err(Truncated {
                offset: self.pos,
                need: len,
                len: self.remaining(),
            });
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), Truncated> {
        self.bytes(len).map(|_| ())
    }

    /// Reads `n` consecutive `u64`s.
    pub fn u64s(&mut self, n: usize) -> Result<Vec<u64>, Truncated> {
        let need = n.checked_mul(8).unwrap_or(usize::MAX);
        if need > self.remaining() {
            return Err(Truncated {
                offset: self.pos,
                need,
                len: self.remaining(),
            });
        }
        (0..n).map(|_| self.u64()).collect()
    }
}

#[cfg(test)]
mod test {
    use super::{Cursor, Truncated};

    #[test]
    fn test_read() {
        let mut buf = vec![];
        buf.extend(7u16.to_ne_bytes());
        buf.extend(0xdead_beefu32.to_ne_bytes());
        buf.extend(u64::MAX.to_ne_bytes());
        buf.extend(b"abc");

        let mut cursor = Cursor::new(&buf);
        assert_eq!(cursor.u16(), Ok(7));
        assert_eq!(cursor.u32(), Ok(0xdead_beef));
        assert_eq!(cursor.u64(), Ok(u64::MAX));
        assert_eq!(cursor.pos(), 14);
        assert_eq!(cursor.bytes(3), Ok(&b"abc"[..]));
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn test_truncated() {
        let buf = [0u8; 10];
        let mut cursor = Cursor::new(&buf);
        cursor.u64().unwrap();
        assert_eq!(
            cursor.u64(),
            Err(Truncated {
                offset: 8,
                need: 8,
                len: 2
            })
        );
        // A failed read does not advance.
        assert_eq!(cursor.pos(), 8);
        assert!(cursor.u64s(usize::MAX).is_err());
        assert_eq!(cursor.u64s(0), Ok(vec![]));
    }
}
