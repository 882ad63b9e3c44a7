//! Backing devices for the MMU.
//!
//! [`Memory`] is plain word-addressed RAM. [`Console`] is a memory-mapped
//! output port: it stores words like RAM and echoes printable characters
//! to a byte sink.

use std::io::Write;
use std::sync::{Arc, Mutex};

use crate::cpu::mmu::{AddressFault, MemoryDevice};
use crate::isa::Word;

/// Word-addressed RAM.
#[derive(Clone, PartialEq, Eq)]
pub struct Memory {
    cells: Vec<Word>,
}

impl Memory {
    /// Create `size` zeroed words.
    pub fn new(size: usize) -> Self {
        Self {
            cells: vec![0; size],
        }
    }

    /// Zero every cell.
    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// Copy `words` in starting at `start`.
    pub fn load(&mut self, start: usize, words: &[Word]) -> Result<(), AddressFault> {
        let end = start + words.len();
        if end > self.cells.len() {
            return Err(AddressFault {
                addr: self.cells.len() as Word,
            });
        }
        self.cells[start..end].copy_from_slice(words);
        Ok(())
    }

    /// Dump memory contents (for debugging).
    pub fn dump(&self, start: usize, count: usize) -> Vec<(usize, Word)> {
        let end = (start + count).min(self.cells.len());
        (start.min(end)..end).map(|i| (i, self.cells[i])).collect()
    }

    fn index(&self, addr: Word) -> Result<usize, AddressFault> {
        let index = addr as usize;
        if index < self.cells.len() {
            Ok(index)
        } else {
            Err(AddressFault { addr })
        }
    }
}

impl MemoryDevice for Memory {
    fn name(&self) -> &str {
        "ram"
    }

    fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    fn read(&self, addr: Word) -> Result<Word, AddressFault> {
        Ok(self.cells[self.index(addr)?])
    }

    #[inline]
    fn write(&mut self, addr: Word, value: Word) -> Result<(), AddressFault> {
        let index = self.index(addr)?;
        self.cells[index] = value;
        Ok(())
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.cells.iter().filter(|&&cell| cell != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &self.cells.len())
            .finish()
    }
}

/// Memory-mapped console.
///
/// Every write is stored; if the low byte is printable ASCII or a newline
/// it is also written to the sink.
pub struct Console {
    cells: Memory,
    sink: Box<dyn Write + Send>,
}

impl Console {
    pub fn new(size: usize, sink: Box<dyn Write + Send>) -> Self {
        Self {
            cells: Memory::new(size),
            sink,
        }
    }

    fn echoes(value: Word) -> Option<u8> {
        let byte = u8::try_from(value).ok()?;
        (byte == b'\n' || (0x20..=0x7E).contains(&byte)).then_some(byte)
    }
}

impl MemoryDevice for Console {
    fn name(&self) -> &str {
        "console"
    }

    fn len(&self) -> usize {
        self.cells.len()
    }

    fn read(&self, addr: Word) -> Result<Word, AddressFault> {
        self.cells.read(addr)
    }

    fn write(&mut self, addr: Word, value: Word) -> Result<(), AddressFault> {
        self.cells.write(addr, value)?;
        if let Some(byte) = Self::echoes(value) {
            // Output is best-effort; the store itself already happened.
            if let Err(err) = self.sink.write_all(&[byte]).and_then(|_| self.sink.flush()) {
                tracing::warn!(%err, "console sink write failed");
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console").field("cells", &self.cells).finish()
    }
}

/// A cloneable in-memory sink, for capturing console output in the
/// debugger, the wasm bindings and tests.
#[derive(Debug, Clone, Default)]
pub struct SharedOutput(Arc<Mutex<Vec<u8>>>);

impl SharedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Bytes written so far, lossily decoded.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_read_write() {
        let mut mem = Memory::new(16);
        mem.write(10, 42).unwrap();
        assert_eq!(mem.read(10), Ok(42));
        assert_eq!(mem.read(11), Ok(0));
    }

    #[test]
    fn test_memory_bounds() {
        let mut mem = Memory::new(16);
        assert!(mem.read(15).is_ok());
        assert_eq!(mem.read(16), Err(AddressFault { addr: 16 }));
        assert!(mem.write(16, 1).is_err());
    }

    #[test]
    fn test_load_program() {
        let mut mem = Memory::new(4);
        mem.load(1, &[1, 2, 3]).unwrap();
        assert_eq!(mem.dump(0, 4), vec![(0, 0), (1, 1), (2, 2), (3, 3)]);
        assert!(mem.load(2, &[1, 2, 3]).is_err());
    }

    #[test]
    fn test_console_echoes_printable() {
        let out = SharedOutput::new();
        let mut console = Console::new(4, Box::new(out.clone()));
        for value in [b'H' as Word, b'i' as Word, 0x07, 0x1_0041, b'\n' as Word] {
            console.write(0, value).unwrap();
        }
        assert_eq!(out.text(), "Hi\n");
        assert_eq!(console.read(0), Ok(b'\n' as Word));
    }

    #[test]
    fn test_console_bounds() {
        let mut console = Console::new(2, Box::new(std::io::sink()));
        assert!(console.write(2, b'A' as Word).is_err());
    }
}
