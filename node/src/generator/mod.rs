pub mod profile;
pub mod stream;
