//! Storage of uploaded task media.
//!
//! Every accepted multipart file field is listed in [`MediaKind`], together
//! with its destination directory and the MIME types allowed in it. Stored
//! files are addressed by public paths of the form `/uploads/<dir>/<name>`.

use chrono::Utc;
use rand::Rng;
use rocket_multipart_form_data::mime::Mime;

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::internal_error::{InternalError, InternalResult};

pub const PUBLIC_PREFIX: &str = "/uploads/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
}

const IMAGE_TYPES: [(&str, &str); 4] = [
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

const AUDIO_TYPES: [(&str, &str); 6] = [
    ("audio/webm", "webm"),
    ("audio/ogg", "ogg"),
    ("audio/mpeg", "mp3"),
    ("audio/wav", "wav"),
    ("audio/x-wav", "wav"),
    ("audio/mp4", "m4a"),
];

impl MediaKind {
    pub const ALL: [MediaKind; 2] = [MediaKind::Image, MediaKind::Audio];

    /// Multipart field name the files arrive under.
    pub fn field_name(self) -> &'static str {
        match self {
            MediaKind::Image => "images",
            MediaKind::Audio => "audios",
        }
    }

    pub fn directory(self) -> &'static str {
        match self {
            MediaKind::Image => "images",
            MediaKind::Audio => "audios",
        }
    }

    /// Key used for the kind in the `task_media` table.
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
        }
    }

    pub fn from_key(key: &str) -> Option<MediaKind> {
        match key {
            "image" => Some(MediaKind::Image),
            "audio" => Some(MediaKind::Audio),
            _ => None,
        }
    }

    pub fn allowed_types(self) -> &'static [(&'static str, &'static str)] {
        match self {
            MediaKind::Image => &IMAGE_TYPES,
            MediaKind::Audio => &AUDIO_TYPES,
        }
    }

    /// File extension for an allowed content type, `None` when the type is
    /// not on the allow-list. Parameters such as `codecs=opus` are ignored.
    pub fn extension_for(self, content_type: &Mime) -> Option<&'static str> {
        let essence = content_type.essence_str();

        self.allowed_types()
            .iter()
            .find(|(mime, _)| mime.eq_ignore_ascii_case(essence))
            .map(|(_, extension)| *extension)
    }
}

/// A file sitting in a temporary location, waiting to be stored.
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub kind: MediaKind,
    pub extension: &'static str,
    pub source: PathBuf,
}

impl PendingUpload {
    /// Checks the declared content type against the allow-list of `kind`.
    pub fn validate(
        kind: MediaKind,
        content_type: Option<&Mime>,
        source: PathBuf,
    ) -> InternalResult<PendingUpload> {
        let extension = content_type
            .and_then(|content_type| kind.extension_for(content_type))
            .ok_or_else(|| {
                InternalError::bad_request(format!(
                    "Unsupported file type for {}: {}",
                    kind.field_name(),
                    content_type
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| String::from("unknown"))
                ))
            })?;

        Ok(PendingUpload {
            kind,
            extension,
            source,
        })
    }
}

pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> MediaStore {
        MediaStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure_directories(&self) -> InternalResult<()> {
        for kind in MediaKind::ALL.iter() {
            fs::create_dir_all(self.root.join(kind.directory()))?;
        }

        Ok(())
    }

    /// Copies a pending upload under a freshly generated name and returns its
    /// public path.
    pub fn store(&self, upload: &PendingUpload) -> InternalResult<String> {
        let file_name = generate_file_name(upload.extension);
        let destination = self.root.join(upload.kind.directory()).join(&file_name);

        fs::copy(&upload.source, &destination)?;
        tracing::debug!("Stored {} as {}", upload.source.display(), destination.display());

        Ok(format!(
            "{}{}/{}",
            PUBLIC_PREFIX,
            upload.kind.directory(),
            file_name
        ))
    }

    /// Maps a public path back onto the upload root. Anything outside the
    /// root, or with `..` in it, maps to `None`.
    pub fn resolve(&self, public_path: &str) -> Option<PathBuf> {
        let relative = Path::new(public_path.strip_prefix(PUBLIC_PREFIX)?);

        let only_normal = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if !only_normal || relative.as_os_str().is_empty() {
            return None;
        }

        Some(self.root.join(relative))
    }

    /// Best-effort removal. Returns whether a file was actually deleted.
    pub fn remove(&self, public_path: &str) -> bool {
        let full_path = match self.resolve(public_path) {
            Some(path) => path,
            None => {
                tracing::warn!("Refusing to delete media outside upload root: {}", public_path);
                return false;
            }
        };

        if !full_path.exists() {
            return false;
        }

        match fs::remove_file(&full_path) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Could not delete {}: {}", full_path.display(), e);
                false
            }
        }
    }

    /// Deletes files that were stored during a request that later failed.
    pub fn discard(&self, public_paths: &[String]) {
        for path in public_paths {
            self.remove(path);
        }
    }
}

fn generate_file_name(extension: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);

    format!("{}-{}.{}", Utc::now().timestamp_millis(), suffix, extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn mime(s: &str) -> Mime {
        s.parse().unwrap()
    }

    #[test]
    fn allow_list_uses_the_essence() {
        assert_eq!(
            MediaKind::Audio.extension_for(&mime("audio/webm;codecs=opus")),
            Some("webm")
        );
        assert_eq!(MediaKind::Image.extension_for(&mime("image/png")), Some("png"));
        assert_eq!(MediaKind::Image.extension_for(&mime("audio/webm")), None);
        assert_eq!(MediaKind::Audio.extension_for(&mime("text/plain")), None);
    }

    #[test]
    fn uploads_without_a_type_are_rejected() {
        let result = PendingUpload::validate(MediaKind::Image, None, PathBuf::from("x"));
        assert!(matches!(result, Err(InternalError::BadRequest(_))));
    }

    #[test]
    fn resolve_stays_inside_the_root() {
        let store = MediaStore::new("/srv/uploads");

        assert_eq!(
            store.resolve("/uploads/images/a.png"),
            Some(PathBuf::from("/srv/uploads/images/a.png"))
        );
        assert_eq!(store.resolve("/uploads/../etc/passwd"), None);
        assert_eq!(store.resolve("/elsewhere/a.png"), None);
        assert_eq!(store.resolve("/uploads/"), None);
    }

    #[test]
    fn store_then_remove() {
        let root = tempfile::tempdir().unwrap();
        let store = MediaStore::new(root.path());
        store.ensure_directories().unwrap();

        let mut source = tempfile::NamedTempFile::new().unwrap();
        source.write_all(b"RIFF").unwrap();

        let upload =
            PendingUpload::validate(MediaKind::Audio, Some(&mime("audio/wav")), source.path().to_path_buf())
                .unwrap();
        let public_path = store.store(&upload).unwrap();

        assert!(public_path.starts_with("/uploads/audios/"));
        assert!(public_path.ends_with(".wav"));
        assert!(store.resolve(&public_path).unwrap().exists());

        assert!(store.remove(&public_path));
        assert!(!store.remove(&public_path));
    }
}
