use crate::constants::MAX_FOLDER_SEGMENT_LENGTH;
use crate::model::JobId;

/// Traduce los segmentos de un id a segmentos de ruta seguros para un
/// filesystem o blob store.
pub trait FolderResolver: Send + Sync {
    fn folder_segments(&self, id: &JobId) -> Vec<String>;
}

/// Resolver por defecto.
///
/// - Codifica como `%XX` todo byte fuera de `[A-Za-z0-9._-]`.
/// - `.` y `..` se codifican completos (nunca navegan directorios).
/// - Un segmento codificado de más de 255 caracteres se parte en
///   sub-segmentos consecutivos.
#[derive(Debug, Clone, Copy, Default)]
pub struct EscapingFolderResolver;

fn escape_segment(segment: &str) -> String {
    if segment == "." || segment == ".." {
        return segment.bytes().map(|b| format!("%{b:02X}")).collect();
    }
    let mut out = String::with_capacity(segment.len());
    for b in segment.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

impl FolderResolver for EscapingFolderResolver {
    fn folder_segments(&self, id: &JobId) -> Vec<String> {
        let mut segments = Vec::with_capacity(id.segments().len());
        for raw in id.segments() {
            let escaped = escape_segment(raw);
            if escaped.is_empty() {
                segments.push("%00".to_string());
                continue;
            }
            // Sólo ASCII tras escapar: cortar por bytes es seguro.
            let mut rest = escaped.as_str();
            while rest.len() > MAX_FOLDER_SEGMENT_LENGTH {
                let (head, tail) = rest.split_at(MAX_FOLDER_SEGMENT_LENGTH);
                segments.push(head.to_string());
                rest = tail;
            }
            segments.push(rest.to_string());
        }
        segments
    }
}
