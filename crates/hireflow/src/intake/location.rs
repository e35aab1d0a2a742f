use reqwest::Url;
use serde::Serialize;

const PUBLIC_OBJECT_PREFIX: [&str; 4] = ["storage", "v1", "object", "public"];

/// Bucket and object path addressed by a public object URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageLocation {
    pub bucket: String,
    pub path: String,
}

impl StorageLocation {
    /// Resolves `http(s)://<host>/storage/v1/object/public/<bucket>/<path>`.
    ///
    /// Returns `None` for anything else: other schemes, missing host, credentials in the URL,
    /// missing bucket or path, directory-like paths and empty segments. Query strings and
    /// fragments are ignored. The path keeps the percent-encoding of the URL so it can be
    /// requested from the object store unchanged.
    pub fn from_public_url(url: &str) -> Option<Self> {
        let url = Url::parse(url.trim()).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        if url.host_str().map_or(true, str::is_empty)
            || !url.username().is_empty()
            || url.password().is_some()
        {
            return None;
        }

        let mut segments = url.path_segments()?;
        for expected in PUBLIC_OBJECT_PREFIX {
            if segments.next()? != expected {
                return None;
            }
        }

        let bucket = segments.next().filter(|bucket| !bucket.is_empty())?;
        let path: Vec<&str> = segments.collect();
        if path.is_empty()
            || path
                .iter()
                .any(|segment| segment.is_empty() || *segment == "." || *segment == "..")
        {
            return None;
        }

        Some(Self {
            bucket: bucket.to_string(),
            path: path.join("/"),
        })
    }
}

pub(crate) fn file_extension(path: &str) -> Option<String> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let (stem, extension) = name.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        return None;
    }
    Some(extension.to_ascii_lowercase())
}
