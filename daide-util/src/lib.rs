pub mod connection;
pub mod read_ext;

pub use read_ext::ReadExt;
