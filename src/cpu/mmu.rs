//! Memory management unit.
//!
//! The MMU routes absolute addresses to backing devices. Each
//! [`MemoryRegion`] covers an inclusive address range; the first region
//! containing an address wins, and an address outside every region is an
//! [`AddressFault`]. Region layout is fixed once the CPU is built.

use std::fmt;

use thiserror::Error;

use crate::isa::Word;

/// A word-addressed backing store.
///
/// Addresses passed to a device are region-relative.
pub trait MemoryDevice: Send {
    /// Short label used in diagnostics.
    fn name(&self) -> &str;

    /// Number of words the device holds.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self, addr: Word) -> Result<Word, AddressFault>;

    fn write(&mut self, addr: Word, value: Word) -> Result<(), AddressFault>;
}

/// An address not covered by any region, or past the end of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("address fault at {addr:#010x}")]
pub struct AddressFault {
    pub addr: Word,
}

/// Invalid region configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MmuError {
    #[error("region {start:#x}..={end:#x} ends before it starts")]
    InvertedRange { start: Word, end: Word },

    #[error("region {start:#x}..={end:#x} exceeds the {limit}-word limit")]
    RegionTooLarge { start: Word, end: Word, limit: u64 },

    #[error("region {start:#x}..={end:#x} overlaps region `{existing}`")]
    Overlap {
        start: Word,
        end: Word,
        existing: String,
    },

    #[error("device `{device}` holds {len} words but the region needs {needed}")]
    DeviceTooSmall {
        device: String,
        len: usize,
        needed: u64,
    },
}

/// A contiguous, inclusive address range backed by one device.
pub struct MemoryRegion {
    start: Word,
    end: Word,
    device: Box<dyn MemoryDevice>,
}

impl MemoryRegion {
    pub fn start(&self) -> Word {
        self.start
    }

    pub fn end(&self) -> Word {
        self.end
    }

    pub fn contains(&self, addr: Word) -> bool {
        (self.start..=self.end).contains(&addr)
    }

    /// Number of addresses the region spans.
    pub fn size(&self) -> u64 {
        self.end as u64 - self.start as u64 + 1
    }

    pub fn device(&self) -> &dyn MemoryDevice {
        self.device.as_ref()
    }

    fn overlaps(&self, start: Word, end: Word) -> bool {
        start <= self.end && self.start <= end
    }
}

impl fmt::Debug for MemoryRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryRegion")
            .field("start", &format_args!("{:#x}", self.start))
            .field("end", &format_args!("{:#x}", self.end))
            .field("device", &self.device.name())
            .finish()
    }
}

/// Where an absolute address lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Translation {
    /// Index into [`Mmu::regions`]
    pub region: usize,
    /// Region-relative address
    pub offset: Word,
}

/// Address-range router over the mapped devices.
#[derive(Debug, Default)]
pub struct Mmu {
    regions: Vec<MemoryRegion>,
}

impl Mmu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `device` at `start..=end`.
    pub fn map(
        &mut self,
        start: Word,
        end: Word,
        device: Box<dyn MemoryDevice>,
    ) -> Result<(), MmuError> {
        if end < start {
            return Err(MmuError::InvertedRange { start, end });
        }
        if let Some(existing) = self.regions.iter().find(|r| r.overlaps(start, end)) {
            return Err(MmuError::Overlap {
                start,
                end,
                existing: existing.device.name().to_string(),
            });
        }
        let needed = end as u64 - start as u64 + 1;
        if (device.len() as u64) < needed {
            return Err(MmuError::DeviceTooSmall {
                device: device.name().to_string(),
                len: device.len(),
                needed,
            });
        }

        tracing::debug!(start, end, device = device.name(), "mapped memory region");
        self.regions.push(MemoryRegion { start, end, device });
        Ok(())
    }

    pub fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    /// Resolve an absolute address to its region and offset.
    pub fn translate(&self, addr: Word) -> Result<Translation, AddressFault> {
        self.regions
            .iter()
            .position(|r| r.contains(addr))
            .map(|region| Translation {
                region,
                offset: addr - self.regions[region].start,
            })
            .ok_or(AddressFault { addr })
    }

    pub fn read(&self, addr: Word) -> Result<Word, AddressFault> {
        let t = self.translate(addr)?;
        self.regions[t.region]
            .device
            .read(t.offset)
            .map_err(|_| AddressFault { addr })
    }

    pub fn write(&mut self, addr: Word, value: Word) -> Result<(), AddressFault> {
        let t = self.translate(addr)?;
        self.regions[t.region]
            .device
            .write(t.offset, value)
            .map_err(|_| AddressFault { addr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::memory::Memory;

    fn mmu() -> Mmu {
        let mut mmu = Mmu::new();
        mmu.map(0x000, 0x0FF, Box::new(Memory::new(0x100))).unwrap();
        mmu.map(0x100, 0x10F, Box::new(Memory::new(0x10))).unwrap();
        mmu
    }

    #[test]
    fn test_translate_relative() {
        let mmu = mmu();
        assert_eq!(mmu.translate(0x000).unwrap(), Translation { region: 0, offset: 0 });
        assert_eq!(mmu.translate(0x0FF).unwrap(), Translation { region: 0, offset: 0xFF });
        assert_eq!(mmu.translate(0x105).unwrap(), Translation { region: 1, offset: 5 });
    }

    #[test]
    fn test_fault_past_last_region() {
        let mmu = mmu();
        assert_eq!(mmu.translate(0x110), Err(AddressFault { addr: 0x110 }));
        assert_eq!(mmu.read(Word::MAX), Err(AddressFault { addr: Word::MAX }));
    }

    #[test]
    fn test_read_write_routes_to_device() {
        let mut mmu = mmu();
        mmu.write(0x103, 77).unwrap();
        assert_eq!(mmu.read(0x103), Ok(77));
        assert_eq!(mmu.read(0x003), Ok(0));
        assert_eq!(mmu.regions()[1].device().read(3), Ok(77));
    }

    #[test]
    fn test_gap_faults() {
        let mut mmu = Mmu::new();
        mmu.map(0, 3, Box::new(Memory::new(4))).unwrap();
        mmu.map(8, 11, Box::new(Memory::new(4))).unwrap();
        assert!(mmu.read(4).is_err());
        assert!(mmu.write(7, 1).is_err());
        assert!(mmu.read(8).is_ok());
    }

    #[test]
    fn test_map_rejects_bad_regions() {
        let mut mmu = mmu();
        assert_eq!(
            mmu.map(0x20, 0x10, Box::new(Memory::new(0x100))),
            Err(MmuError::InvertedRange { start: 0x20, end: 0x10 })
        );
        assert!(matches!(
            mmu.map(0x0F0, 0x1F0, Box::new(Memory::new(0x200))),
            Err(MmuError::Overlap { .. })
        ));
        assert!(matches!(
            mmu.map(0x200, 0x2FF, Box::new(Memory::new(0x10))),
            Err(MmuError::DeviceTooSmall { needed: 0x100, .. })
        ));
    }
}
