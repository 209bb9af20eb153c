//! Módulo de hashing.

pub mod hash;

pub use hash::sha512_hex;
