pub mod parser;
pub mod reader;
pub(crate) mod service;

/// Ingestion statement kind.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Kind {
    Load,
    Stream,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Load => "LOAD",
            Kind::Stream => "STREAM",
        }
    }
}

/// Destination table reference; missing project/dataset are filled from the
/// connection defaults before execution.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Destination {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl Destination {
    pub(crate) fn init(&mut self, project_id: &str, dataset_id: &str) {
        if self.project_id.is_empty() {
            self.project_id = project_id.to_string();
        }
        if self.dataset_id.is_empty() {
            self.dataset_id = dataset_id.to_string();
        }
    }
}

/// One parsed LOAD/STREAM statement.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Ingestion {
    pub kind: Kind,
    /// Data format as written in the reader body; execution upper-cases before comparing.
    pub format: String,
    /// STREAM only: JSON field whose value becomes the per-row insert id. May be empty.
    pub insert_id_field: String,
    /// Opaque key into the process-wide reader registry.
    pub reader_id: String,
    pub destination: Destination,
    /// Raw JSON hint body captured from the statement, without the fences. May be empty.
    pub hint: String,
}
