pub mod detect;
pub mod page;
pub mod status;
pub mod stream;
