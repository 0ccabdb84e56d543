use std::collections::BTreeMap;
use procdata_base::{fail, ErrorKind, Result};

/// String-to-string map as the host serializes it. Ordering is not part of
/// the wire contract; a sorted map keeps output reproducible.
pub type Dict = BTreeMap<String, String>;

// Everything the host writes is built from three shapes, little-endian:
//
//   u64     8 bytes
//   string  u64 length, then that many raw bytes
//   dict    u64 count, then count * (string key, string value)
//
// Strings are decoded lossily; the host does not promise UTF-8 in values.

pub trait Reader {
    fn read_u64(&mut self) -> Result<u64>;
    fn read_bytes(&mut self, len: usize) -> Result<&[u8]>;

    fn read_len(&mut self) -> Result<usize> {
        let n = self.read_u64()?;
        match usize::try_from(n) {
            Ok(n) => Ok(n),
            Err(_) => fail(ErrorKind::Format, format!("length {} exceeds address space", n)),
        }
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.read_len()?;
        let bytes = self.read_bytes(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    fn read_dict(&mut self) -> Result<Dict> {
        let mut dict = Dict::new();
        self.read_dict_into(&mut dict)?;
        Ok(dict)
    }

    /// Later entries replace earlier ones with the same key, which is how
    /// the legacy request-info map overlays the primary one.
    fn read_dict_into(&mut self, dict: &mut Dict) -> Result<()> {
        let count = self.read_u64()?;
        for _ in 0..count {
            let k = self.read_string()?;
            let v = self.read_string()?;
            dict.insert(k, v);
        }
        Ok(())
    }
}

pub trait Writer {
    fn write_u64(&mut self, val: u64) -> Result<()>;
    fn write(&mut self, bytes: &[u8], add_terminator: bool) -> Result<()>;

    fn write_string(&mut self, val: &str) -> Result<()> {
        self.write_u64(val.len() as u64)?;
        self.write(val.as_bytes(), false)
    }

    fn write_dict(&mut self, dict: &Dict) -> Result<()> {
        self.write_u64(dict.len() as u64)?;
        for (k, v) in dict.iter() {
            self.write_string(k)?;
            self.write_string(v)?;
        }
        Ok(())
    }
}

// MemReader

pub struct MemReader {
    mem: Vec<u8>,
    pos: usize,
}

impl MemReader {
    pub fn pos(&self) -> usize {
        self.pos
    }
}

impl From<Vec<u8>> for MemReader {
    fn from(mem: Vec<u8>) -> Self {
        Self { mem, pos: 0 }
    }
}

impl Reader for MemReader {
    fn read_u64(&mut self) -> Result<u64> {
        let bytes = self.read_bytes(8)?;
        let mut buf = [0_u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }

    fn read_bytes(&mut self, len: usize) -> Result<&[u8]> {
        let end = match self.pos.checked_add(len) {
            Some(end) if end <= self.mem.len() => end,
            _ => return fail(ErrorKind::EndOfData, "end of buffer reached"),
        };
        let start = self.pos;
        self.pos = end;
        Ok(&self.mem[start..end])
    }
}

// MemWriter

#[derive(Default)]
pub struct MemWriter {
    mem: Vec<u8>,
}

impl MemWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.mem
    }

    pub fn into_reader(self) -> MemReader {
        MemReader::from(self.mem)
    }
}

impl Writer for MemWriter {
    fn write_u64(&mut self, val: u64) -> Result<()> {
        self.mem.extend_from_slice(&val.to_le_bytes());
        Ok(())
    }

    fn write(&mut self, bytes: &[u8], add_terminator: bool) -> Result<()> {
        self.mem.extend_from_slice(bytes);
        if add_terminator {
            self.mem.push(0);
        }
        Ok(())
    }
}
