// A mapped buffer is one file the host prepared (or expects back), held as a
// shared memory mapping plus a byte cursor. Fixed column data, null flags,
// variable payloads, the control manifest, the results manifest and the
// status channel are all mapped buffers; nothing else on the proc side touches
// the filesystem.
//
// Read-only buffers never change size and fail with end-of-data when the
// cursor would run off the end. Writable buffers grow to the next page
// boundary whenever a write needs more room, and can be trimmed back to the
// cursor once the writer is done.

mod buffer;
mod ioutil;
mod page;


pub use buffer::MappedBuffer;
pub use ioutil::{Dict, MemReader, MemWriter, Reader, Writer};
pub use page::{page_size, round_up_to, round_up_to_page};
