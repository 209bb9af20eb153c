//! Hash helpers – abstracción para permitir cambiar de algoritmo sin tocar el
//! resto del core.

use sha2::{Digest, Sha512};

/// Hashea un string con SHA-512 y devuelve hex en minúsculas (128 chars).
pub fn sha512_hex(input: &str) -> String {
    let digest = Sha512::digest(input.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest.iter() {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::sha512_hex;
    use crate::constants::KEY_HASH_LENGTH;

    #[test]
    fn fixed_width_hex() {
        assert_eq!(sha512_hex("").len(), KEY_HASH_LENGTH);
        assert_eq!(sha512_hex("x".repeat(10_000).as_str()).len(), KEY_HASH_LENGTH);
        assert!(sha512_hex("abc").starts_with("ddaf35a193617aba"));
    }
}
