//! Normalización de identificadores de jobs.
//!
//! A partir de la lista de segmentos de un id produce:
//! - `raw_id`: segmentos unidos con `/`, sin transformar (diagnóstico).
//! - `database_key`: id crudo normalizado (clave de la tabla relacional).
//! - `blob_key`: segmentos escapados por el `FolderResolver`, unidos con `/`
//!   y normalizados como ruta (segmento de ruta del blob store).
//!
//! Normalizar: si la cadena tiene a lo sumo `MAX_KEY_LENGTH` caracteres se
//! devuelve tal cual; si no, se conserva un prefijo legible y la cola se
//! reemplaza por su SHA-512 en hex. Toda clave queda acotada a 512 caracteres
//! y dos ids distintos sólo colisionan si colisiona el hash.
//!
//! En la clave de blob el hash va en su propio segmento (`prefijo/~hash`):
//! ningún componente de la ruta supera `MAX_FOLDER_SEGMENT_LENGTH`.

mod folder;

pub use folder::{EscapingFolderResolver, FolderResolver};

use std::sync::Arc;

use crate::constants::{KEY_HASH_LENGTH, KEY_HASH_SEPARATOR, MAX_KEY_LENGTH};
use crate::hashing::sha512_hex;
use crate::model::JobId;

/// Acota `joined` a `MAX_KEY_LENGTH` caracteres (prefijo + separador + hash).
pub fn normalize(joined: &str) -> String {
    if joined.chars().count() <= MAX_KEY_LENGTH {
        return joined.to_string();
    }
    let prefix_len = MAX_KEY_LENGTH - (KEY_HASH_SEPARATOR.chars().count() + KEY_HASH_LENGTH);
    let split_at = joined.char_indices().nth(prefix_len).map(|(i, _)| i).unwrap_or(joined.len());
    let (prefix, tail) = joined.split_at(split_at);
    format!("{prefix}{KEY_HASH_SEPARATOR}{}", sha512_hex(tail))
}

/// Como `normalize`, pero para rutas separadas por `/`: el hash de la cola
/// ocupa un segmento aparte, así los segmentos del prefijo nunca crecen.
pub fn normalize_path(joined: &str) -> String {
    if joined.chars().count() <= MAX_KEY_LENGTH {
        return joined.to_string();
    }
    let hash_segment_len = KEY_HASH_SEPARATOR.chars().count() + KEY_HASH_LENGTH;
    let prefix_len = MAX_KEY_LENGTH - hash_segment_len - 1;
    let split_at = joined.char_indices().nth(prefix_len).map(|(i, _)| i).unwrap_or(joined.len());
    let (prefix, tail) = joined.split_at(split_at);
    let hash = sha512_hex(tail);
    match prefix.trim_end_matches('/') {
        "" => format!("{KEY_HASH_SEPARATOR}{hash}"),
        prefix => format!("{prefix}/{KEY_HASH_SEPARATOR}{hash}"),
    }
}

#[derive(Clone)]
pub struct IdNormalizer {
    resolver: Arc<dyn FolderResolver>,
}

impl Default for IdNormalizer {
    fn default() -> Self {
        Self::new(Arc::new(EscapingFolderResolver))
    }
}

impl IdNormalizer {
    pub fn new(resolver: Arc<dyn FolderResolver>) -> Self {
        Self { resolver }
    }

    pub fn raw_id(&self, id: Option<&JobId>) -> String {
        id.map(JobId::to_string).unwrap_or_default()
    }

    pub fn database_key(&self, id: Option<&JobId>) -> String {
        match id {
            Some(id) => normalize(&id.to_string()),
            None => String::new(),
        }
    }

    pub fn blob_key(&self, id: Option<&JobId>) -> String {
        match id {
            Some(id) => normalize_path(&self.resolver.folder_segments(id).join("/")),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_FOLDER_SEGMENT_LENGTH;

    #[test]
    fn short_ids_are_untouched() {
        let n = IdNormalizer::default();
        let id = JobId::new(["wiki", "refactor", "42"]);
        assert_eq!(n.raw_id(Some(&id)), "wiki/refactor/42");
        assert_eq!(n.database_key(Some(&id)), "wiki/refactor/42");
        assert_eq!(n.blob_key(Some(&JobId::new(["wiki:Main", "42"]))), "wiki%3AMain/42");
    }

    #[test]
    fn missing_id_maps_to_empty() {
        let n = IdNormalizer::default();
        assert_eq!(n.raw_id(None), "");
        assert_eq!(n.database_key(None), "");
        assert_eq!(n.blob_key(None), "");
    }

    #[test]
    fn long_keys_are_bounded() {
        let n = IdNormalizer::default();
        for len in [511, 512, 513, 600, 5_000] {
            let id = JobId::new(["s".repeat(len)]);
            let key = n.database_key(Some(&id));
            assert!(key.chars().count() <= MAX_KEY_LENGTH, "len={len}");
            assert!(n.blob_key(Some(&id)).chars().count() <= MAX_KEY_LENGTH);
        }
        let key = n.database_key(Some(&JobId::new(["s".repeat(513)])));
        assert_eq!(key.chars().count(), MAX_KEY_LENGTH);
        assert_eq!(&key[383..384], KEY_HASH_SEPARATOR);
    }

    fn assert_segments_fit(key: &str) {
        for segment in key.split('/') {
            assert!(!segment.is_empty(), "empty segment in {key}");
            assert!(segment.len() <= MAX_FOLDER_SEGMENT_LENGTH, "segment of {} chars", segment.len());
        }
    }

    #[test]
    fn blob_key_segments_fit_a_file_name() {
        let n = IdNormalizer::default();
        let ids = [JobId::new(["s".repeat(513)]),
                   JobId::new(["s".repeat(600)]),
                   JobId::new(["s".repeat(5_000)]),
                   JobId::new(["a".repeat(127), "b".repeat(255), "c".repeat(200)]),
                   JobId::new(["x".repeat(381), "y".repeat(300)]),
                   JobId::new(["é".repeat(400)])];
        for id in &ids {
            let key = n.blob_key(Some(id));
            assert!(key.chars().count() <= MAX_KEY_LENGTH);
            assert_segments_fit(&key);
            let last = key.rsplit('/').next().unwrap();
            assert_eq!(last.len(), KEY_HASH_LENGTH + 1);
            assert!(last.starts_with(KEY_HASH_SEPARATOR));
        }
        let short = n.blob_key(Some(&JobId::new(["wiki", "refactor", "42"])));
        assert_eq!(short, "wiki/refactor/42");
    }

    #[test]
    fn long_blob_keys_stay_distinct() {
        let n = IdNormalizer::default();
        let base = "q".repeat(700);
        let a = n.blob_key(Some(&JobId::new([format!("{base}a")])));
        let b = n.blob_key(Some(&JobId::new([format!("{base}b")])));
        assert_ne!(a, b);
    }

    #[test]
    fn tails_differing_after_600_do_not_collide() {
        let n = IdNormalizer::default();
        let base = "p".repeat(700);
        let a = JobId::new(["job".to_string(), format!("{base}a")]);
        let b = JobId::new(["job".to_string(), format!("{base}b")]);
        let (ka, kb) = (n.database_key(Some(&a)), n.database_key(Some(&b)));
        assert_ne!(ka, kb);
        assert_eq!(ka[..383], kb[..383]);
    }

    #[test]
    fn multibyte_keys_split_on_char_boundary() {
        let key = normalize(&"ü".repeat(700));
        assert_eq!(key.chars().count(), MAX_KEY_LENGTH);
    }
}
