pub mod did;
pub mod session;
