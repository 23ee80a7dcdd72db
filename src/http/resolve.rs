//! Mapping request targets onto files under the served root.
//!
//! The leading `/` of the target is dropped, `%XX` escapes are decoded to
//! raw bytes and the result is joined under the root. Nothing else is
//! rewritten; a query string stays part of the name. The joined path is then
//! canonicalized and must still lie inside the root, so `..` segments,
//! encoded or not, and symlinks cannot reach outside it.

use std::borrow::Cow;
use std::ffi::OsString;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, percent_encode};
use tokio::fs::{self, File};

/// Bytes escaped when an entry name is written into an index link.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'\\');

/// Outcome of resolving a request target.
#[derive(Debug)]
pub enum Resolved {
    /// A regular file, opened for reading
    File { path: PathBuf, file: File },
    /// A directory inside the root
    Directory { path: PathBuf },
    /// Nothing exists at the target
    NotFound,
    /// Permission denied, or the target escapes the root
    Forbidden,
    /// Any other file-system failure
    Failed(io::Error),
}

impl From<io::Error> for Resolved {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            ErrorKind::NotFound | ErrorKind::NotADirectory => Resolved::NotFound,
            ErrorKind::PermissionDenied => Resolved::Forbidden,
            _ => Resolved::Failed(err),
        }
    }
}

/// The directory request targets are resolved against.
#[derive(Debug, Clone)]
pub struct ServedRoot {
    root: PathBuf,
}

impl ServedRoot {
    /// Canonicalizes `root`. Fails if it does not exist or is not a directory.
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = std::fs::canonicalize(root)?;
        if !root.is_dir() {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("{} is not a directory", root.display()),
            ));
        }
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolves a raw request target and opens the file it names.
    pub async fn resolve(&self, target: &str) -> Resolved {
        let Some(relative) = decode_target(target) else {
            return Resolved::NotFound;
        };
        let candidate = self.root.join(relative);

        let path = match fs::canonicalize(&candidate).await {
            Ok(path) => path,
            Err(err) => return err.into(),
        };

        if !path.starts_with(&self.root) {
            tracing::warn!(target_path = target, "Target escapes served root");
            return Resolved::Forbidden;
        }

        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(err) => return err.into(),
        };

        if metadata.is_dir() {
            return Resolved::Directory { path };
        }

        match File::open(&path).await {
            Ok(file) => Resolved::File { path, file },
            Err(err) => err.into(),
        }
    }
}

/// Percent-decodes a target into a path relative to the root.
///
/// Returns `None` if the decoded bytes contain a NUL, which no file name can.
pub fn decode_target(target: &str) -> Option<PathBuf> {
    let decoded: Cow<'_, [u8]> = percent_decode_str(target.trim_start_matches('/')).into();
    if decoded.contains(&0) {
        return None;
    }
    Some(path_from_bytes(&decoded))
}

#[cfg(unix)]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(std::ffi::OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

/// Builds an HTML index of `dir`, linking every entry under `target`.
///
/// Link targets carry the percent-encoded bytes of each name, so names that
/// are not valid UTF-8 or contain reserved characters stay reachable.
pub async fn directory_index(dir: &Path, target: &str) -> io::Result<String> {
    let mut names: Vec<OsString> = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        names.push(entry.file_name());
    }
    names.sort();

    let base = target.trim_end_matches('/');
    let mut page = format!(
        "<html><head><title>Index of {0}</title></head><body><h1>Index of {0}</h1><ul>",
        escape_html(target)
    );
    for name in &names {
        let href = percent_encode(name.as_encoded_bytes(), PATH_SEGMENT).to_string();
        page.push_str(&format!(
            "<li><a href=\"{}/{}\">{}</a></li>",
            escape_html(base),
            escape_html(&href),
            escape_html(&name.to_string_lossy())
        ));
    }
    page.push_str("</ul></body></html>");
    Ok(page)
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
