use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};

use fs2::FileExt;
use memmap2::{Mmap, MmapMut, MmapOptions};
use procdata_base::{fail, ErrorKind, Result};
use tracing::debug;

use crate::{
    ioutil::{Reader, Writer},
    page::round_up_to_page,
};

// memmap2 refuses zero-length maps, so an empty file is "open but unmapped".
#[derive(Debug, Default)]
enum Mapping {
    #[default]
    None,
    ReadOnly(Mmap),
    Writable(MmapMut),
}

/// One memory-mapped file with a cursor.
///
/// The buffer is unusable until [`MappedBuffer::map`] attaches it to a path.
/// Any failure while (re)mapping leaves it fully detached (file closed,
/// mapping released) so later calls fail rather than see stale bytes.
#[derive(Debug, Default)]
pub struct MappedBuffer {
    mapping: Mapping,
    file: Option<File>,
    path: PathBuf,
    writable: bool,
    len: usize,
    pos: usize,
}

impl MappedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a fresh buffer mapped at the file's current size.
    pub fn open(path: impl AsRef<Path>, writable: bool) -> Result<Self> {
        let mut buf = Self::new();
        buf.map(path, writable, None)?;
        Ok(buf)
    }

    /// Attach to `path`. Writable buffers create the file if needed and are
    /// resized to `size` when one is given; otherwise the file's current
    /// length is mapped as-is.
    pub fn map(
        &mut self,
        path: impl AsRef<Path>,
        writable: bool,
        size: Option<usize>,
    ) -> Result<()> {
        self.unmap();
        let path = path.as_ref();
        let file = if writable {
            OpenOptions::new().read(true).write(true).create(true).open(path)?
        } else {
            File::open(path)?
        };
        self.file = Some(file);
        self.path = path.to_path_buf();
        self.writable = writable;
        self.remap(size)
    }

    /// Re-establish the mapping at `size` bytes (or the file's current size).
    /// A writable file is truncated or extended to `size` first.
    pub fn remap(&mut self, size: Option<usize>) -> Result<()> {
        let res = self.try_remap(size);
        if res.is_err() {
            self.unmap();
        }
        res
    }

    fn try_remap(&mut self, size: Option<usize>) -> Result<()> {
        let Some(file) = &self.file else {
            return fail(ErrorKind::Io, "buffer not mapped");
        };
        // Never resize a file underneath a live mapping.
        self.mapping = Mapping::None;
        self.len = 0;
        let size = match size {
            None => usize::try_from(file.metadata()?.len())?,
            Some(size) => {
                if self.writable {
                    file.set_len(size as u64)?;
                }
                size
            }
        };
        if size > 0 {
            // SAFETY: the host does not modify input files while the proc runs,
            // and output files are owned by this process until completion.
            self.mapping = if self.writable {
                Mapping::Writable(unsafe { MmapOptions::new().len(size).map_mut(file)? })
            } else {
                Mapping::ReadOnly(unsafe { MmapOptions::new().len(size).map(file)? })
            };
        }
        self.len = size;
        debug!(path = %self.path.display(), size, writable = self.writable, "mapped");
        Ok(())
    }

    /// Release the mapping and close the file. Idempotent.
    pub fn unmap(&mut self) {
        self.mapping = Mapping::None;
        self.file = None;
        self.writable = false;
        self.len = 0;
        self.pos = 0;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_mapped(&self) -> bool {
        self.file.is_some()
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Mapped length in bytes. For a growing writer this includes reserved
    /// tail space beyond [`MappedBuffer::pos`].
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.len
    }

    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.len {
            self.grow_or_fail(pos)?;
        }
        self.pos = pos;
        Ok(())
    }

    pub fn bytes(&self) -> &[u8] {
        match &self.mapping {
            Mapping::None => &[],
            Mapping::ReadOnly(m) => &m[..],
            Mapping::Writable(m) => &m[..],
        }
    }

    pub fn bytes_mut(&mut self) -> Result<&mut [u8]> {
        match &mut self.mapping {
            Mapping::Writable(m) => Ok(&mut m[..]),
            Mapping::None if self.writable => Ok(Default::default()),
            _ => fail(ErrorKind::Io, format!("{} is not mapped writable", self.path.display())),
        }
    }

    /// Make room for `n` more bytes at the cursor.
    pub fn ensure_capacity(&mut self, n: usize) -> Result<()> {
        let Some(required) = self.pos.checked_add(n) else {
            return fail(ErrorKind::Range, "requested capacity overflows");
        };
        if required > self.len {
            self.grow_or_fail(required)?;
        }
        Ok(())
    }

    /// Grow a writable buffer to hold at least `required` bytes, rounded to
    /// the page above.
    pub fn grow_to(&mut self, required: usize) -> Result<()> {
        if !self.writable {
            return fail(ErrorKind::Io, format!("cannot grow read-only {}", self.path.display()));
        }
        self.remap(Some(round_up_to_page(required)))
    }

    fn grow_or_fail(&mut self, required: usize) -> Result<()> {
        if self.writable {
            self.grow_to(required)
        } else {
            fail(ErrorKind::EndOfData, format!("end of {} reached", self.path.display()))
        }
    }

    /// Trim the file and mapping to exactly the cursor.
    pub fn truncate(&mut self) -> Result<()> {
        debug!(path = %self.path.display(), len = self.pos, "truncating");
        self.remap(Some(self.pos))
    }

    pub fn flush(&self) -> Result<()> {
        if let Mapping::Writable(m) = &self.mapping {
            m.flush()?;
        }
        Ok(())
    }

    /// Advisory whole-file lock, blocking until granted.
    pub fn lock(&self, exclusive: bool) -> Result<()> {
        let Some(file) = &self.file else {
            return fail(ErrorKind::Io, "buffer not mapped");
        };
        if exclusive {
            FileExt::lock_exclusive(file)?;
        } else {
            FileExt::lock_shared(file)?;
        }
        Ok(())
    }

    pub fn unlock(&self) -> Result<()> {
        if let Some(file) = &self.file {
            FileExt::unlock(file)?;
        }
        Ok(())
    }
}

impl Reader for MappedBuffer {
    fn read_u64(&mut self) -> Result<u64> {
        let bytes = self.read_bytes(8)?;
        let mut buf = [0_u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }

    fn read_bytes(&mut self, len: usize) -> Result<&[u8]> {
        self.ensure_capacity(len)?;
        let start = self.pos;
        self.pos += len;
        Ok(&self.bytes()[start..start + len])
    }
}

impl Writer for MappedBuffer {
    fn write_u64(&mut self, val: u64) -> Result<()> {
        self.write(&val.to_le_bytes(), false)
    }

    fn write(&mut self, bytes: &[u8], add_terminator: bool) -> Result<()> {
        let total = bytes.len() + usize::from(add_terminator);
        if total == 0 {
            return Ok(());
        }
        self.ensure_capacity(total)?;
        let pos = self.pos;
        let data = self.bytes_mut()?;
        data[pos..pos + bytes.len()].copy_from_slice(bytes);
        if add_terminator {
            data[pos + bytes.len()] = 0;
        }
        self.pos += total;
        Ok(())
    }
}
