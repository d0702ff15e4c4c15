use zerocopy::{FromBytes, Immutable, IntoBytes};

/// Trait for memory primitives.
///
/// A primitive is either a byte, half-word, word or double word.
/// That is, [`u8`], [`i8`], [`u16`], [`i16`], [`u32`], [`i32`], [`u64`] or [`i64`].
pub trait Primitive:
    std::fmt::Debug
    + std::fmt::UpperHex
    + Copy
    + Immutable
    + FromBytes
    + IntoBytes
    + Default
    + Send
    + Sync
    + 'static
{
    /// Reads a value of this primitive from the bytes of a buffer (in native endian). If `buf`
    /// does not contain enough data, it's going to be completed with zeros.
    fn read_ne_bytes(buf: &[u8]) -> Self;

    /// Writes this primitive to the given buffer (in native endian). If `buf` is not big enough,
    /// remaining bytes are going to be silently dropped.
    fn write_ne_bytes(self, buf: &mut [u8]);

    /// Reads a value of this primitive from the bytes of a buffer (in big endian). If `buf` does
    /// not contain enough data, it's going to be completed with zeros.
    fn read_be_bytes(buf: &[u8]) -> Self;

    /// Writes this primitive to the given buffer (in big endian). If `buf` is not big enough,
    /// remaining bytes are going to be silently dropped.
    fn write_be_bytes(self, buf: &mut [u8]);
}

macro_rules! impl_primitive {
    ($($type:ty),* $(,)?) => {
        $(
            impl Primitive for $type {
                #[inline(always)]
                fn read_ne_bytes(buf: &[u8]) -> Self {
                    let mut bytes = [0u8; size_of::<$type>()];
                    let len = buf.len().min(bytes.len());
                    bytes[..len].copy_from_slice(&buf[..len]);

                    <$type>::from_ne_bytes(bytes)
                }

                #[inline(always)]
                fn write_ne_bytes(self, buf: &mut [u8]) {
                    let bytes = self.to_ne_bytes();
                    let len = buf.len().min(bytes.len());
                    buf[..len].copy_from_slice(&bytes[..len]);
                }

                #[inline(always)]
                fn read_be_bytes(buf: &[u8]) -> Self {
                    let mut bytes = [0u8; size_of::<$type>()];
                    let len = buf.len().min(bytes.len());
                    bytes[..len].copy_from_slice(&buf[..len]);

                    <$type>::from_be_bytes(bytes)
                }

                #[inline(always)]
                fn write_be_bytes(self, buf: &mut [u8]) {
                    let bytes = self.to_be_bytes();
                    let len = buf.len().min(bytes.len());
                    buf[..len].copy_from_slice(&bytes[..len]);
                }
            }
        )*
    };
}

impl_primitive! {
    u8,
    u16,
    u32,
    u64,

    i8,
    i16,
    i32,
    i64,
}
