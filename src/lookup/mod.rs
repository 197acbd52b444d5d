//! Remote metadata lookup abstraction and concrete adapters.

use std::path::Path;

use crate::error::LookupError;

pub mod http;

/// Interface to the external metadata service.
///
/// `Ok(None)` means the service answered but knows nothing about the file;
/// `Err` means the question could not be answered at all.
pub trait InfoLookup: Send + Sync {
    fn lookup(&self, file: &Path, display_name: &str)
        -> Result<Option<Vec<String>>, LookupError>;
}

/// Name sent to the lookup service when the caller has no better hint: the
/// final path component, or the whole key when there is none.
pub fn display_name_for(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}
