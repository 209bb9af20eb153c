//! Constantes del almacén de estados de jobs.
//!
//! Estos valores forman parte del formato persistido (longitud de claves,
//! topes de columnas, nombres de blobs). Cambiarlos altera claves ya
//! almacenadas: un job guardado con un tope distinto deja de encontrarse.

/// Longitud máxima (en caracteres) de una clave normalizada, tanto para la
/// tabla relacional como para el segmento de ruta del blob store.
pub const MAX_KEY_LENGTH: usize = 512;

/// Separador entre el prefijo legible y el hash de la cola de una clave larga.
pub const KEY_HASH_SEPARATOR: &str = "~";

/// Longitud del hash hexadecimal (SHA-512) usado como sufijo.
pub const KEY_HASH_LENGTH: usize = 128;

/// Tope de `message` / `formatted_message` en la tabla de logs.
pub const MAX_LOG_MESSAGE_LENGTH: usize = 2000;

/// Tope del mensaje de la excepción asociada a un log.
pub const MAX_THROWABLE_MESSAGE_LENGTH: usize = 2000;

/// Tope del nombre de tipo de la excepción asociada a un log.
pub const MAX_THROWABLE_TYPE_LENGTH: usize = 255;

/// Marca agregada al final de un texto truncado (cuenta dentro del tope).
pub const TRUNCATION_MARKER: &str = "...";

/// Tamaño de ventana al paginar la lectura de logs.
pub const LOG_PAGE_SIZE: i64 = 200;

/// Longitud máxima de un segmento de carpeta producido por el resolver.
pub const MAX_FOLDER_SEGMENT_LENGTH: usize = 255;

/// Nombre del blob con el estado serializado comprimido.
pub const STATUS_BLOB_COMPRESSED: &str = "status.xml.zip";

/// Nombre del blob con el estado serializado sin comprimir.
pub const STATUS_BLOB_RAW: &str = "status.xml";

/// Sufijo que identifica un locator comprimido.
pub const ARCHIVE_SUFFIX: &str = ".zip";
