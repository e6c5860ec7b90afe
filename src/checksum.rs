use num::{PrimInt, ToPrimitive, Unsigned};
use postcard::ser_flavors::Flavor;

/// Checksum generator
///
/// In principle this is similar to [`core::hash::Hasher`] but allows to use output
/// different than u64.
pub trait ChecksumGen {
    /// Checksum type that can be serialized (e.g. [`u64`])
    type Output: PrimInt + Unsigned;

    /// Reset internal state to start generating checksum for new data
    fn reset(&mut self);

    /// Push data from slice to the generator
    fn push(&mut self, data: &[u8]);

    /// Retrieve checksum of all data pushed since last [`Self::reset`]
    ///
    /// Does not modify the state, so more data may be pushed afterwards.
    fn get(&self) -> Self::Output;

    /// Push `data` and retrieve the final checksum
    fn decode(&mut self, data: &[u8]) -> Self::Output
    where
        Self: Sized
    {
        self.reset();
        self.push(data);
        self.get()
    }

    /// Number of bytes in the output checksum
    const LEN: usize = core::mem::size_of::<Self::Output>();

    /// Write checksum as little-endian bytes to the beginning of `out`
    ///
    /// `out` must be at least [`Self::LEN`] bytes long.
    fn write_le(checksum: Self::Output, out: &mut [u8]) {
        // Unsigned primitive integers are at most 128 bits wide
        let wide = checksum.to_u128().unwrap_or_default();
        out[..Self::LEN].copy_from_slice(&wide.to_le_bytes()[..Self::LEN]);
    }

    /// Encode checksum of `buf[..data_len]` at the end of `buf`
    fn encode<'a>(&mut self, buf: &'a mut [u8], data_len: usize) -> Result<&'a [u8], Error>
    where
        Self: Sized
    {
        let total = data_len.checked_add(Self::LEN)
            .filter(|&total| total <= buf.len())
            .ok_or(Error::BufTooShort)?;
        let checksum = self.decode(&buf[..data_len]);
        Self::write_le(checksum, &mut buf[data_len..]);
        Ok(&buf[..total])
    }

    /// Verify that the data ends with a valid checksum, return data without it
    fn verify<'a>(&mut self, data: &'a [u8]) -> Result<&'a [u8], Error>
    where
        Self: Sized
    {
        if data.len() < Self::LEN {
            return Err(Error::BufTooShort);
        }
        let (data, checksum) = data.split_at(data.len() - Self::LEN);
        let mut computed = [0u8; 16];
        Self::write_le(self.decode(data), &mut computed);
        if checksum == &computed[..Self::LEN] {
            Ok(data)
        } else {
            Err(Error::ChecksumInvalid)
        }
    }
}

/// Checksum error
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum Error {
    ChecksumInvalid,
    BufTooShort,
}

/// Encoder that appends checksum at the end of data
///
/// This is a postcard serialization flavor that uses some [`ChecksumGen`] encoder
/// to append checksum at the end of the data. Checksum bytes are appended in
/// **little-endian** order!
pub struct ChecksumEncoder<'a, F, C>
where
    F: Flavor,
    C: ChecksumGen,
{
    flavor: F,
    state: &'a mut C,
}

impl<'a, F, C> ChecksumEncoder<'a, F, C>
where
    F: Flavor,
    C: ChecksumGen,
{
    /// Initialize the encoder with clear state
    pub fn new(flavor: F, state: &'a mut C) -> Self {
        state.reset();
        Self { flavor, state }
    }
}

impl<'a, F, C> Flavor for ChecksumEncoder<'a, F, C>
where
    F: Flavor,
    C: ChecksumGen,
{
    type Output = <F as Flavor>::Output;

    fn try_push(&mut self, data: u8) -> postcard::Result<()> {
        self.state.push(&[data]);
        self.flavor.try_push(data)
    }

    fn try_extend(&mut self, data: &[u8]) -> postcard::Result<()> {
        self.state.push(data);
        self.flavor.try_extend(data)
    }

    fn finalize(mut self) -> postcard::Result<Self::Output> {
        let mut checksum = [0u8; 16];
        C::write_le(self.state.get(), &mut checksum);
        self.flavor.try_extend(&checksum[..C::LEN])?;
        self.flavor.finalize()
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::vec::Vec;
    use crc::{Crc, CRC_32_MPEG_2};

    /// Buffers all data and computes CRC-32/MPEG-2 with the `crc` crate
    pub struct Crc32(Vec<u8>);

    impl Crc32 {
        pub fn new() -> Self {
            Self(Vec::new())
        }
    }

    impl ChecksumGen for Crc32 {
        type Output = u32;

        fn reset(&mut self) {
            self.0.clear();
        }

        fn push(&mut self, data: &[u8]) {
            self.0.extend_from_slice(data);
        }

        fn get(&self) -> Self::Output {
            let crc = Crc::<u32>::new(&CRC_32_MPEG_2);
            let mut digest = crc.digest();
            digest.update(&self.0);
            digest.finalize()
        }
    }
}
