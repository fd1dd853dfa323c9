use std::{
    io,
    path::{Component, Path},
};

use crate::data_objects::LocalFile;

/// Guesses a MIME type from the file extension. Unknown extensions are sent as `application/octet-stream`.
pub fn mime_type_for<P: AsRef<Path>>(path: P) -> &'static str {
    let ext = path.as_ref().extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("txt") | Some("log") => "text/plain",
        Some("csv") => "text/csv",
        Some("htm") | Some("html") => "text/html",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("tif") | Some("tiff") => "image/tiff",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("xls") => "application/vnd.ms-excel",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}

/// Reduces a remote resource name to a plain file name, so that it cannot escape the download directory.
pub fn safe_file_name(name: &str) -> Option<&str> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(n)), None) => n.to_str().filter(|s| !s.is_empty()),
        _ => None,
    }
}

/// Resource references normally arrive as absolute URLs. Relative references are resolved against the API base URL.
pub fn resolve_resource_ref(api_url: &str, resource_ref: &str) -> String {
    if resource_ref.starts_with("http://") || resource_ref.starts_with("https://") {
        resource_ref.to_string()
    } else if resource_ref.starts_with('/') {
        format!("{api_url}{resource_ref}")
    } else {
        format!("{api_url}/{resource_ref}")
    }
}

/// Lists the regular files directly inside `dir`, sorted by name.
pub fn local_files_in<P: AsRef<Path>>(dir: P) -> io::Result<Vec<LocalFile>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        let mime_type = mime_type_for(&path).to_string();
        files.push(LocalFile { name, mime_type, path });
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}
