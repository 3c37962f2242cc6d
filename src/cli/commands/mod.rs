pub mod convert;
pub mod init;
pub mod scan;
mod shared;
