use std::fmt;

use serde::{Deserialize, Serialize};

/// Identificador jerárquico de un job: lista ordenada de segmentos.
///
/// `Display` une los segmentos con `/` sin transformarlos (id crudo).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Vec<String>);

impl JobId {
    pub fn new<I, S>(segments: I) -> Self
        where I: IntoIterator<Item = S>,
              S: Into<String>
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Parsea la forma `a/b/c`. Los segmentos vacíos se descartan.
    pub fn parse(raw: &str) -> Self {
        Self(raw.split('/').filter(|s| !s.is_empty()).map(str::to_string).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

impl<S: Into<String>> FromIterator<S> for JobId {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::new(iter)
    }
}
