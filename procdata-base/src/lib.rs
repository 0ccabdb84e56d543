mod error;


pub use error::{err, fail, Error, ErrorKind, Result};
