//! VCAM frame header wire format
//!
//! Every frame on the socket starts with a fixed 64-byte record, all fields
//! little-endian and packed in this order:
//!
//! ```text
//! magic version width height chroma planes   pts   pitches[4] lines[4]
//!  u32    u32    u32   u32    u32    u32     u64    u32 x 4    u32 x 4
//! ```
//!
//! The raw pixel payload follows immediately, with no further framing.

use bytes::{Buf, BufMut};

use super::reader::ProtocolError;

/// Protocol tag, `'VCAM'` read as a little-endian u32.
pub const VCAM_MAGIC: u32 = 0x5643_414D;

/// Number of plane slots carried in every header.
pub const MAX_PLANES: usize = 4;

/// On-wire header size in bytes: 6 x u32 + u64 + 4 x u32 + 4 x u32.
pub const HEADER_SIZE: usize = 6 * 4 + 8 + MAX_PLANES * 4 + MAX_PLANES * 4;

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub magic: u32,
    pub version: u32,
    pub width: u32,
    pub height: u32,
    /// Fourcc pixel format tag.
    pub chroma: u32,
    /// Declared plane count. Only the first [`MAX_PLANES`] count towards the payload.
    pub planes: u32,
    pub pts: u64,
    pub pitches: [u32; MAX_PLANES],
    pub lines: [u32; MAX_PLANES],
}

impl FrameHeader {
    /// Decode a header from its wire image. Does not check the magic.
    pub fn decode(raw: &[u8; HEADER_SIZE]) -> Self {
        let mut buf = &raw[..];
        let magic = buf.get_u32_le();
        let version = buf.get_u32_le();
        let width = buf.get_u32_le();
        let height = buf.get_u32_le();
        let chroma = buf.get_u32_le();
        let planes = buf.get_u32_le();
        let pts = buf.get_u64_le();
        let mut pitches = [0u32; MAX_PLANES];
        for p in pitches.iter_mut() {
            *p = buf.get_u32_le();
        }
        let mut lines = [0u32; MAX_PLANES];
        for l in lines.iter_mut() {
            *l = buf.get_u32_le();
        }
        debug_assert!(!buf.has_remaining());

        Self { magic, version, width, height, chroma, planes, pts, pitches, lines }
    }

    /// Encode the header into its 64-byte wire image.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        let mut buf = &mut out[..];
        buf.put_u32_le(self.magic);
        buf.put_u32_le(self.version);
        buf.put_u32_le(self.width);
        buf.put_u32_le(self.height);
        buf.put_u32_le(self.chroma);
        buf.put_u32_le(self.planes);
        buf.put_u64_le(self.pts);
        for p in self.pitches {
            buf.put_u32_le(p);
        }
        for l in self.lines {
            buf.put_u32_le(l);
        }
        debug_assert!(buf.is_empty());
        out
    }

    pub fn has_valid_magic(&self) -> bool {
        self.magic == VCAM_MAGIC
    }

    /// Planes that contribute to the payload: `min(planes, 4)`.
    pub fn planes_used(&self) -> usize {
        (self.planes as usize).min(MAX_PLANES)
    }

    /// Declared plane count exceeds the slots the header can describe.
    ///
    /// Such headers are still accepted (the count is clamped), this only
    /// lets callers flag the producer.
    pub fn planes_overflow(&self) -> bool {
        self.planes as usize > MAX_PLANES
    }

    /// Sum of `pitches[i] * lines[i]` over the used planes.
    pub fn payload_size(&self) -> Result<u64, ProtocolError> {
        let mut total: u64 = 0;
        for i in 0..self.planes_used() {
            let plane = u64::from(self.pitches[i]) * u64::from(self.lines[i]);
            total = total.checked_add(plane).ok_or(ProtocolError::PayloadOverflow {
                planes: self.planes,
            })?;
        }
        Ok(total)
    }

    /// Chroma as a four character code, if every byte is printable ASCII.
    pub fn fourcc(&self) -> Option<String> {
        let bytes = self.chroma.to_le_bytes();
        if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            Some(bytes.iter().map(|&b| b as char).collect())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yuy2_header() -> FrameHeader {
        FrameHeader {
            magic: VCAM_MAGIC,
            version: 1,
            width: 64,
            height: 32,
            chroma: 0x3259_5559,
            planes: 1,
            pts: 1000,
            pitches: [128, 0, 0, 0],
            lines: [32, 0, 0, 0],
        }
    }

    #[test]
    fn test_header_size_is_64() {
        assert_eq!(HEADER_SIZE, 64);
        assert_eq!(yuy2_header().encode().len(), 64);
    }

    #[test]
    fn test_magic_spells_vcam() {
        assert_eq!(&VCAM_MAGIC.to_be_bytes(), b"VCAM");
    }

    #[test]
    fn test_little_endian_layout() {
        let mut header = yuy2_header();
        header.pts = 0x0102_0304_0506_0708;
        header.lines[3] = 0xAABB_CCDD;
        let raw = header.encode();

        assert_eq!(&raw[0..4], &[0x4D, 0x41, 0x43, 0x56]);
        assert_eq!(&raw[4..8], &[1, 0, 0, 0]);
        assert_eq!(&raw[24..32], &[8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(&raw[32..36], &[128, 0, 0, 0]);
        assert_eq!(&raw[48..52], &[32, 0, 0, 0]);
        assert_eq!(&raw[60..64], &[0xDD, 0xCC, 0xBB, 0xAA]);
    }

    #[test]
    fn test_decode_reencode_is_identical() {
        let mut raw = [0u8; HEADER_SIZE];
        for (i, b) in raw.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(37).wrapping_add(11);
        }
        raw[..4].copy_from_slice(&VCAM_MAGIC.to_le_bytes());

        let header = FrameHeader::decode(&raw);
        assert!(header.has_valid_magic());
        assert_eq!(header.encode(), raw);
    }

    #[test]
    fn test_decode_known_header() {
        let header = FrameHeader::decode(&yuy2_header().encode());
        assert_eq!(header, yuy2_header());
        assert_eq!(header.payload_size().unwrap(), 4096);
    }

    #[test]
    fn test_payload_size_sums_used_planes() {
        let mut header = yuy2_header();
        header.planes = 3;
        header.pitches = [64, 32, 32, 999];
        header.lines = [32, 16, 16, 999];
        assert_eq!(header.payload_size().unwrap(), 64 * 32 + 32 * 16 + 32 * 16);
    }

    #[test]
    fn test_zero_planes_means_empty_payload() {
        let mut header = yuy2_header();
        header.planes = 0;
        assert_eq!(header.planes_used(), 0);
        assert_eq!(header.payload_size().unwrap(), 0);
    }

    #[test]
    fn test_planes_above_four_are_clamped() {
        let mut header = yuy2_header();
        header.planes = 9;
        header.pitches = [1, 2, 3, 4];
        header.lines = [10, 10, 10, 10];
        assert!(header.planes_overflow());
        assert_eq!(header.planes_used(), 4);
        assert_eq!(header.payload_size().unwrap(), 100);
    }

    #[test]
    fn test_payload_size_overflow() {
        let mut header = yuy2_header();
        header.planes = 4;
        header.pitches = [u32::MAX; 4];
        header.lines = [u32::MAX; 4];
        assert!(matches!(
            header.payload_size(),
            Err(ProtocolError::PayloadOverflow { planes: 4 })
        ));
    }

    #[test]
    fn test_single_max_plane_fits() {
        let mut header = yuy2_header();
        header.pitches[0] = u32::MAX;
        header.lines[0] = u32::MAX;
        assert_eq!(
            header.payload_size().unwrap(),
            u64::from(u32::MAX) * u64::from(u32::MAX)
        );
    }

    #[test]
    fn test_fourcc() {
        assert_eq!(yuy2_header().fourcc().as_deref(), Some("YUY2"));

        let mut header = yuy2_header();
        header.chroma = 0x0000_0001;
        assert_eq!(header.fourcc(), None);
    }
}
