mod sha3;

pub use crate::sha3::{Sha3_256, to_hex};
