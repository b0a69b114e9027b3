use std::collections::HashMap;

use crate::{StorageManager, UploadedFile};

/// An upload request as delivered by the web layer: form params, headers,
/// file fields already spooled to temporary files, and the storage it targets.
#[derive(Debug)]
pub struct UploadRequest {
    params: HashMap<String, String>,
    headers: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
    file_path: String,
    session: Option<String>,
    manager: StorageManager,
}

impl UploadRequest {
    pub fn new(manager: StorageManager) -> Self {
        Self {
            params: HashMap::new(),
            headers: HashMap::new(),
            files: HashMap::new(),
            file_path: String::new(),
            session: None,
            manager,
        }
    }

    pub fn with_param<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Header names are matched case-insensitively
    pub fn with_header<K: AsRef<str>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_file<K: Into<String>>(mut self, field: K, file: UploadedFile) -> Self {
        self.files.insert(field.into(), file);
        self
    }

    /// Intended destination of the upload, including a file name
    pub fn with_file_path<S: Into<String>>(mut self, path: S) -> Self {
        self.file_path = path.into();
        self
    }

    /// Caller session token; scopes chunk sessions to one client
    pub fn with_session<S: Into<String>>(mut self, session: S) -> Self {
        self.session = Some(session.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn has_file(&self, field: &str) -> bool {
        self.files.contains_key(field)
    }

    pub fn file(&self, field: &str) -> Option<&UploadedFile> {
        self.files.get(field)
    }

    pub fn files(&self) -> impl Iterator<Item = (&str, &UploadedFile)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Take a file out of the request; the caller now owns its cleanup
    pub fn take_file(&mut self, field: &str) -> Option<UploadedFile> {
        self.files.remove(field)
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    pub fn manager(&self) -> &StorageManager {
        &self.manager
    }
}
