pub mod assert;
pub mod base64;
pub mod sha1;

pub use assert::{assertion_error, hard_assert, hard_fail};
pub use base64::base64_encode_bytes;
pub use sha1::{sha1_base64, sha1_digest};
