//! Application image integrity check
//!
//! The application is described by an [`AppDescriptor`] stored in its own flash
//! page: postcard-encoded fields followed by the CRC-64-WE of these bytes in
//! little-endian order. The image itself is trusted only if its CRC-64-WE matches
//! the one recorded in the descriptor.

use postcard::experimental::max_size::MaxSize;
use postcard::ser_flavors::Slice;
use serde::{Deserialize, Serialize};
use static_assertions as sa;

use crate::checksum::{ChecksumEncoder, ChecksumGen};
use crate::config;
use crate::crc::Crc64We;
use crate::error::{ErrorCode, Result};

/// Application image metadata
#[derive(Serialize, Deserialize, MaxSize, Clone, Copy, Debug, PartialEq, Eq, defmt::Format)]
pub struct AppDescriptor {
    /// Number of bytes covered by `image_crc`
    pub image_size: u32,
    /// CRC-64-WE of the image
    pub image_crc: u64,
}

/// Maximum size of a stored descriptor
pub const DESCRIPTOR_MAX_LEN: usize = AppDescriptor::POSTCARD_MAX_SIZE + Crc64We::LEN;

sa::const_assert!(DESCRIPTOR_MAX_LEN <= config::DESCRIPTOR_REGION_SIZE);

impl AppDescriptor {
    /// Describe the given image
    pub fn for_image(image: &[u8]) -> Result<Self> {
        let image_size = u32::try_from(image.len())
            .map_err(|_| ErrorCode::ImageTooLarge)?;
        let mut crc = Crc64We::new();
        crc.add_bytes(image);
        Ok(Self { image_size, image_crc: crc.get() })
    }

    /// Serialize with trailing checksum into `buf`, return the used part
    pub fn store<'a>(&self, buf: &'a mut [u8]) -> Result<&'a mut [u8]> {
        let mut crc = Crc64We::new();
        postcard::serialize_with_flavor(self, ChecksumEncoder::new(Slice::new(buf), &mut crc))
            .map_err(|_| ErrorCode::BufferTooShort)
    }

    /// Load descriptor from the beginning of `region`
    ///
    /// Anything after the checksum is ignored (e.g. erased flash).
    pub fn load(region: &[u8]) -> Result<Self> {
        let (descriptor, rest) = postcard::take_from_bytes::<Self>(region)
            .map_err(|_| ErrorCode::DescriptorCorrupted)?;
        let len = region.len() - rest.len() + Crc64We::LEN;
        if region.len() < len {
            return Err(ErrorCode::DescriptorCorrupted);
        }
        Crc64We::new().verify(&region[..len])
            .map_err(|_| ErrorCode::DescriptorCorrupted)?;
        Ok(descriptor)
    }
}

/// Storage holding the application image
///
/// Allows to stream images that are not memory-mapped or are fragmented.
pub trait ImageSource {
    /// Capacity of the storage in bytes
    fn len(&self) -> usize;

    /// Fill `buf` with bytes starting at `offset`
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result;
}

/// Memory-mapped image storage (e.g. internal flash)
pub struct MemoryImage<'a> {
    data: &'a [u8],
}

impl<'a> MemoryImage<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl<'a> ImageSource for MemoryImage<'a> {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result {
        let src = offset.checked_add(buf.len())
            .and_then(|end| self.data.get(offset..end))
            .ok_or(ErrorCode::ImageReadFailed)?;
        buf.copy_from_slice(src);
        Ok(())
    }
}

/// Compute image checksum and compare it with the descriptor
///
/// Returns the computed checksum.
pub fn verify_image<S: ImageSource>(source: &mut S, descriptor: &AppDescriptor) -> Result<u64> {
    let size = descriptor.image_size as usize;
    if size > source.len() {
        defmt::warn!("Image size {=u32} exceeds storage of {=usize}", descriptor.image_size, source.len());
        return Err(ErrorCode::ImageTooLarge);
    }

    let mut crc = Crc64We::new();
    let mut chunk = [0u8; config::VERIFY_CHUNK_SIZE];
    let mut offset = 0;
    while offset < size {
        let n = (size - offset).min(chunk.len());
        source.read(offset, &mut chunk[..n])?;
        crc.add_bytes(&chunk[..n]);
        offset += n;
        defmt::trace!("Verified {=usize}/{=usize} crc={=u64:x}", offset, size, crc.get());
    }

    let computed = crc.get();
    if computed != descriptor.image_crc {
        defmt::warn!("Image corrupted: crc={=u64:x} expected={=u64:x}", computed, descriptor.image_crc);
        return Err(ErrorCode::ImageCorrupted);
    }
    Ok(computed)
}

/// Load descriptor from `descriptor_region` and verify the image it describes
pub fn check<S: ImageSource>(descriptor_region: &[u8], source: &mut S) -> Result<AppDescriptor> {
    let descriptor = AppDescriptor::load(descriptor_region)
        .map_err(|e| {
            defmt::warn!("No valid application descriptor: {}", e);
            e
        })?;
    defmt::debug!("Application descriptor: {}", descriptor);
    verify_image(source, &descriptor)?;
    defmt::info!("Application image OK ({=u32} bytes)", descriptor.image_size);
    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    fn image(len: usize) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(len as u64);
        (0..len).map(|_| rng.gen()).collect()
    }

    fn stored(descriptor: &AppDescriptor) -> [u8; config::DESCRIPTOR_REGION_SIZE] {
        // Erased flash reads as 0xff
        let mut region = [0xff; config::DESCRIPTOR_REGION_SIZE];
        let mut buf = [0u8; DESCRIPTOR_MAX_LEN];
        let data = descriptor.store(&mut buf).unwrap();
        region[..data.len()].copy_from_slice(data);
        region
    }

    /// Image split into small fragments that must be read one by one
    struct Fragmented {
        fragments: Vec<Vec<u8>>,
        reads: usize,
    }

    impl Fragmented {
        fn new(data: &[u8], fragment: usize) -> Self {
            Self { fragments: data.chunks(fragment).map(|c| c.to_vec()).collect(), reads: 0 }
        }
    }

    impl ImageSource for Fragmented {
        fn len(&self) -> usize {
            self.fragments.iter().map(|f| f.len()).sum()
        }

        fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result {
            self.reads += 1;
            for (i, byte) in buf.iter_mut().enumerate() {
                let mut at = offset + i;
                let mut found = None;
                for f in &self.fragments {
                    if at < f.len() {
                        found = Some(f[at]);
                        break;
                    }
                    at -= f.len();
                }
                *byte = found.ok_or(ErrorCode::ImageReadFailed)?;
            }
            Ok(())
        }
    }

    struct Failing;

    impl ImageSource for Failing {
        fn len(&self) -> usize {
            1024
        }

        fn read(&mut self, _offset: usize, _buf: &mut [u8]) -> Result {
            Err(ErrorCode::ImageReadFailed)
        }
    }

    #[test]
    fn descriptor_roundtrip() {
        let descriptor = AppDescriptor { image_size: 0x1_2345, image_crc: 0x62EC59E3F1A4F00A };
        let region = stored(&descriptor);
        assert_eq!(AppDescriptor::load(&region), Ok(descriptor));
    }

    #[test]
    fn descriptor_store_too_short() {
        let descriptor = AppDescriptor { image_size: 100, image_crc: u64::MAX };
        let mut buf = [0u8; 10];
        assert_eq!(descriptor.store(&mut buf).unwrap_err(), ErrorCode::BufferTooShort);
    }

    #[test]
    fn descriptor_blank_flash() {
        let region = [0xff; config::DESCRIPTOR_REGION_SIZE];
        assert_eq!(AppDescriptor::load(&region), Err(ErrorCode::DescriptorCorrupted));
        assert_eq!(AppDescriptor::load(&[]), Err(ErrorCode::DescriptorCorrupted));
    }

    #[test]
    fn descriptor_corrupted() {
        let descriptor = AppDescriptor { image_size: 4096, image_crc: 0x1234_5678_9abc_def0 };
        let region = stored(&descriptor);
        let mut buf = [0u8; DESCRIPTOR_MAX_LEN];
        let len = descriptor.store(&mut buf).unwrap().len();
        assert!(len < DESCRIPTOR_MAX_LEN);
        for i in 0..len {
            let mut bad = region;
            bad[i] ^= 0x01;
            assert_ne!(AppDescriptor::load(&bad), Ok(descriptor), "flipped byte {}", i);
        }
        // bytes after the checksum are not part of the descriptor
        for i in len..config::DESCRIPTOR_REGION_SIZE {
            let mut padded = region;
            padded[i] ^= 0x01;
            assert_eq!(AppDescriptor::load(&padded), Ok(descriptor), "flipped byte {}", i);
        }
    }

    #[test]
    fn descriptor_truncated_checksum() {
        let descriptor = AppDescriptor { image_size: 1, image_crc: 2 };
        let mut buf = [0u8; DESCRIPTOR_MAX_LEN];
        let len = descriptor.store(&mut buf).unwrap().len();
        assert_eq!(AppDescriptor::load(&buf[..len - 1]), Err(ErrorCode::DescriptorCorrupted));
    }

    #[test]
    fn verify_valid_image() {
        let data = image(1000);
        let descriptor = AppDescriptor::for_image(&data).unwrap();
        assert_eq!(descriptor.image_size, 1000);
        let crc = verify_image(&mut MemoryImage::new(&data), &descriptor).unwrap();
        assert_eq!(crc, descriptor.image_crc);
    }

    #[test]
    fn verify_image_smaller_than_storage() {
        let mut data = image(700);
        let descriptor = AppDescriptor::for_image(&data).unwrap();
        data.resize(2048, 0xff);
        assert!(verify_image(&mut MemoryImage::new(&data), &descriptor).is_ok());
    }

    #[test]
    fn verify_empty_image() {
        let descriptor = AppDescriptor::for_image(&[]).unwrap();
        assert_eq!(descriptor.image_crc, 0);
        assert_eq!(verify_image(&mut MemoryImage::new(&[]), &descriptor), Ok(0));
    }

    #[test]
    fn verify_fragmented_image() {
        let data = image(3 * config::VERIFY_CHUNK_SIZE + 17);
        let descriptor = AppDescriptor::for_image(&data).unwrap();
        let mut source = Fragmented::new(&data, 100);
        assert_eq!(verify_image(&mut source, &descriptor), Ok(descriptor.image_crc));
        assert_eq!(source.reads, 4);
    }

    #[test]
    fn verify_corrupted_image() {
        let mut data = image(512);
        let descriptor = AppDescriptor::for_image(&data).unwrap();
        data[300] ^= 0x40;
        assert_eq!(
            verify_image(&mut MemoryImage::new(&data), &descriptor),
            Err(ErrorCode::ImageCorrupted)
        );
    }

    #[test]
    fn verify_truncated_image() {
        let data = image(512);
        let descriptor = AppDescriptor::for_image(&data).unwrap();
        assert_eq!(
            verify_image(&mut MemoryImage::new(&data[..511]), &descriptor),
            Err(ErrorCode::ImageTooLarge)
        );
    }

    #[test]
    fn verify_read_error() {
        let descriptor = AppDescriptor { image_size: 10, image_crc: 0 };
        assert_eq!(verify_image(&mut Failing, &descriptor), Err(ErrorCode::ImageReadFailed));
    }

    #[test]
    fn memory_image_out_of_bounds() {
        let data = [1u8, 2, 3];
        let mut source = MemoryImage::new(&data);
        let mut buf = [0u8; 2];
        assert_eq!(source.read(1, &mut buf), Ok(()));
        assert_eq!(buf, [2, 3]);
        assert_eq!(source.read(2, &mut buf), Err(ErrorCode::ImageReadFailed));
        assert_eq!(source.read(usize::MAX, &mut buf), Err(ErrorCode::ImageReadFailed));
    }

    #[test]
    fn check_full() {
        let data = image(2000);
        let descriptor = AppDescriptor::for_image(&data).unwrap();
        let region = stored(&descriptor);
        assert_eq!(check(&region, &mut MemoryImage::new(&data)), Ok(descriptor));

        let blank = [0xff; config::DESCRIPTOR_REGION_SIZE];
        assert_eq!(
            check(&blank, &mut MemoryImage::new(&data)),
            Err(ErrorCode::DescriptorCorrupted)
        );
    }
}
