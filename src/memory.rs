use std::collections::TryReserveError;

// NB. addresses are u16 so every address is in bounds; lengths are usize to stop endless casting

/// how much memory the 6502 can address
pub const ADDRESS_SPACE_LEN: usize = 0x10000;

/// Byte-level view of an address space, shared by the engine and the editors.
pub trait MemoryMap {
    fn read_byte(&self, addr: u16) -> u8 {
        self.get_ro_slice(addr, 1)[0]
    }

    fn write_byte(&mut self, addr: u16, value: u8) {
        self.get_rw_slice(addr, 1)[0] = value;
    }

    /// get a little-endian word; the high byte wraps round to 0x0000
    fn get_word(&self, addr: u16) -> u16 {
        let lo = self.read_byte(addr) as u16;
        let hi = self.read_byte(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    /// store a little-endian word
    fn set_word(&mut self, addr: u16, value: u16) {
        self.write_byte(addr, value as u8);
        self.write_byte(addr.wrapping_add(1), (value >> 8) as u8);
    }

    /// get a r/w slice of the underlying memory (heap)
    fn get_rw_slice(&mut self, addr: u16, len: usize) -> &mut [u8];

    /// get a r/o slice of the underlying memory (heap)
    fn get_ro_slice(&self, addr: u16, len: usize) -> &[u8];

    /// set every byte to `value`
    fn fill(&mut self, value: u8);
}

/// The flat 64K address space of the engine. Its length never changes.
pub struct AddressSpace {
    bytes: Box<[u8]>,
}

impl MemoryMap for AddressSpace {
    fn get_rw_slice(&mut self, addr: u16, len: usize) -> &mut [u8] {
        let a = addr as usize;
        &mut self.bytes[a..(a + len)]
    }
    fn get_ro_slice(&self, addr: u16, len: usize) -> &[u8] {
        let a = addr as usize;
        &self.bytes[a..(a + len)]
    }
    fn fill(&mut self, value: u8) {
        self.bytes.fill(value);
    }
}

impl AddressSpace {
    /// allocates a zeroed address space, reporting allocation failure instead
    /// of aborting
    pub fn try_new() -> Result<Self, TryReserveError> {
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(ADDRESS_SPACE_LEN)?;
        bytes.resize(ADDRESS_SPACE_LEN, 0);
        Ok(AddressSpace {
            bytes: bytes.into_boxed_slice(),
        })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// replace the whole address space with `image`, which must be exactly
    /// [`ADDRESS_SPACE_LEN`] bytes long
    pub fn load_image(&mut self, image: &[u8]) {
        self.bytes.copy_from_slice(image);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_zeroed() -> Result<(), TryReserveError> {
        let m = AddressSpace::try_new()?;
        assert_eq!(m.as_slice().len(), ADDRESS_SPACE_LEN);
        assert!(m.as_slice().iter().all(|b| *b == 0));
        Ok(())
    }

    #[test]
    fn test_read_word_little_endian() {
        let mut m = AddressSpace::try_new().unwrap();
        m.get_rw_slice(0, 8).copy_from_slice(&[0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(m.get_word(0x4), 0x0504);
    }

    #[test]
    fn test_word_wraps_at_top_of_memory() {
        let mut m = AddressSpace::try_new().unwrap();
        m.set_word(0xffff, 0xbeef);
        assert_eq!(m.read_byte(0xffff), 0xef);
        assert_eq!(m.read_byte(0x0000), 0xbe);
        assert_eq!(m.get_word(0xffff), 0xbeef);
    }

    #[test]
    #[should_panic]
    fn test_slice_past_top_of_memory_panics() {
        let mut m = AddressSpace::try_new().unwrap();
        m.get_rw_slice(0xfffc, 8).fill(1);
    }

    #[test]
    fn test_fill_and_load_image() {
        let mut m = AddressSpace::try_new().unwrap();
        m.fill(0xaa);
        assert_eq!(m.read_byte(0x1234), 0xaa);
        let image = vec![0x11; ADDRESS_SPACE_LEN];
        m.load_image(&image);
        assert!(m.as_slice().iter().all(|b| *b == 0x11));
    }
}
