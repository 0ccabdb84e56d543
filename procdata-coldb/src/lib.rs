// The host hands a proc its tables as plain columnar files:
//
// - A fixed-width data file per column, `rows * width` bytes. For the two
//   variable-length kinds (bytes, string) each 8-byte slot is instead the
//   start offset of that row's payload.
//
// - An optional null-flags file, one byte per row, 0 = value, 1 = null.
//   A column with no null file is not nullable.
//
// - For variable-length kinds, a payload file holding every row's bytes
//   back to back. A row ends where the next row starts; the last row ends
//   at the end of the payload. Strings carry one trailing NUL that is not
//   part of the value.
//
// Columns group into tables (sharing a row count) and tables into the two
// datasets of a session: input, read-only and fully sized by the host, and
// output, writable and empty until the proc sizes each table.
//
// Every per-type decision lives in one table of codecs keyed by the column
// type, so the column code never branches on type beyond fixed-vs-var.

mod codec;
mod coltype;
mod column;
mod dataset;
mod slice;
mod table;
mod value;


pub use codec::{
    decode_char, encode_char, pack_date, pack_datetime, pack_time, unpack_date, unpack_datetime,
    unpack_time, Codec, DecodeFn, EncodeFn, Slot,
};
pub use coltype::ColumnType;
pub use column::{Batches, ColumnIter, ColumnRecord, InputColumn, OutputColumn, ITER_BATCH};
pub use dataset::{Dataset, InputDataset, OutputDataset};
pub use slice::Slice;
pub use table::{InputTable, OutputTable, Table};
pub use value::{Decimal, Value};
