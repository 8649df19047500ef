//! Product image files under `static/uploads`.
//!
//! Image paths stored in the database are relative to the media root, e.g.
//! `static/uploads/3f2a..._serum.jpg`; the storefront serves them as `/static/...`.

use std::path::Path;

use chrono::Utc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::scraper::BROWSER_USER_AGENT;

/// Prefix of stored image paths.
pub const UPLOADS_PREFIX: &str = "static/uploads";

/// Image shown for products without one.
pub const PLACEHOLDER_IMAGE: &str = "static/images/placeholder.png";

/// Extensions accepted when adding a product or gallery image.
pub const UPLOAD_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// Extensions accepted when replacing a main image from the edit form.
pub const EDIT_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

const ACCEPT_IMAGE: &str = "image/avif,image/webp,image/apng,image/*,*/*;q=0.8";

/// Downloads smaller than this are error pages or tracking pixels.
const MIN_IMAGE_BYTES: usize = 1024;
const MIN_FIRST_CHUNK_BYTES: usize = 8;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Downloaded image is too small ({0} bytes)")]
    TooSmall(usize),

    #[error("File type not allowed: {0}")]
    NotAllowed(String),
}

/// Reduce an uploaded file name to a safe ASCII name.
///
/// Path separators become spaces, non `[A-Za-z0-9_.-]` characters are
/// dropped, whitespace runs become `_` and leading dots or underscores are
/// stripped. Returns an empty string when nothing survives.
#[must_use]
pub fn secure_filename(name: &str) -> String {
    let flattened = name.replace(['/', '\\'], " ");
    let kept: String = flattened
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | ' '))
        .collect();
    kept.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .trim_start_matches(['.', '_'])
        .to_owned()
}

/// Lowercased extension of `name`, if it has one.
fn extension(name: &str) -> Option<String> {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Whether `name` carries one of `allowed` as its extension.
#[must_use]
pub fn allowed_extension(name: &str, allowed: &[&str]) -> bool {
    extension(name).is_some_and(|ext| allowed.contains(&ext.as_str()))
}

/// File extension for a downloaded image: the content type decides, the URL
/// path is the fallback, `jpg` the default.
#[must_use]
pub fn extension_for(content_type: &str, url_path: &str) -> &'static str {
    let content_type = content_type.to_ascii_lowercase();
    if content_type.contains("png") {
        return "png";
    }
    if content_type.contains("gif") {
        return "gif";
    }
    if content_type.contains("webp") {
        return "webp";
    }
    if content_type.contains("jpeg") || content_type.contains("jpg") {
        return "jpg";
    }
    match extension(url_path).as_deref() {
        Some("png") => "png",
        Some("gif") => "gif",
        Some("webp") => "webp",
        Some("svg") => "svg",
        _ => "jpg",
    }
}

/// Stored path for a file name inside the uploads directory.
#[must_use]
pub fn stored_path(file_name: &str) -> String {
    format!("{UPLOADS_PREFIX}/{file_name}")
}

/// Name for an uploaded file added to the catalog.
#[must_use]
pub fn unique_upload_name(original: &str) -> String {
    format!("{}_{}", Uuid::new_v4().simple(), secure_filename(original))
}

/// Name for a main image replaced from the edit form.
#[must_use]
pub fn timestamped_upload_name(original: &str) -> String {
    format!(
        "{}_{}",
        Utc::now().format("%Y%m%d_%H%M%S"),
        secure_filename(original)
    )
}

/// Write uploaded bytes into `uploads_dir` and return the stored path.
///
/// # Errors
///
/// Returns `ImageError::Io` if the directory or file cannot be written.
pub async fn save_upload(
    uploads_dir: &Path,
    file_name: &str,
    bytes: &[u8],
) -> Result<String, ImageError> {
    tokio::fs::create_dir_all(uploads_dir).await?;
    tokio::fs::write(uploads_dir.join(file_name), bytes).await?;
    Ok(stored_path(file_name))
}

/// Download a remote image into `uploads_dir` and return the stored path.
///
/// # Errors
///
/// Returns `ImageError::Http` for failed requests or error statuses,
/// `ImageError::TooSmall` for empty or tiny bodies, and `ImageError::Io`
/// if the file cannot be written.
pub async fn download_image(
    client: &reqwest::Client,
    url: &str,
    uploads_dir: &Path,
) -> Result<String, ImageError> {
    let mut response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
        .header(reqwest::header::ACCEPT, ACCEPT_IMAGE)
        .send()
        .await?
        .error_for_status()?;

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    let ext = extension_for(&content_type, response.url().path());

    let first = response.chunk().await?.unwrap_or_default();
    if first.len() < MIN_FIRST_CHUNK_BYTES {
        return Err(ImageError::TooSmall(first.len()));
    }

    tokio::fs::create_dir_all(uploads_dir).await?;
    let file_name = format!("{}.{ext}", Uuid::new_v4().simple());
    let path = uploads_dir.join(&file_name);

    let total = keep_if_complete(&path, async {
        let mut file = tokio::fs::File::create(&path).await?;
        let mut total = first.len();
        file.write_all(&first).await?;
        while let Some(chunk) = response.chunk().await? {
            total += chunk.len();
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok::<_, ImageError>(total)
    })
    .await?;

    tracing::debug!(url, file_name = %file_name, bytes = total, "Downloaded image");
    Ok(stored_path(&file_name))
}

/// Run `write` for the file at `path` and keep the file only if it finished
/// with at least `MIN_IMAGE_BYTES`. Anything else removes it.
async fn keep_if_complete<F>(path: &Path, write: F) -> Result<usize, ImageError>
where
    F: Future<Output = Result<usize, ImageError>>,
{
    let result = match write.await {
        Ok(total) if total < MIN_IMAGE_BYTES => Err(ImageError::TooSmall(total)),
        other => other,
    };
    if result.is_err()
        && let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial download");
    }
    result
}

/// Delete a stored file; failures are logged and otherwise ignored.
pub async fn remove_media(media_root: &Path, stored: &str) {
    if stored.is_empty() || stored.starts_with("http") || stored == PLACEHOLDER_IMAGE {
        return;
    }
    let path = media_root.join(stored.trim_start_matches('/'));
    if let Err(e) = tokio::fs::remove_file(&path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove image file");
    }
}

/// Whether a product effectively has no image: empty, a placeholder, the
/// literal `None`, or a local path that no longer exists.
#[must_use]
pub fn is_missing_image(image: &str, media_root: &Path) -> bool {
    let image = image.trim();
    if image.is_empty() || image == "None" || image.to_lowercase().contains("placeholder") {
        return true;
    }
    if image.starts_with("http://") || image.starts_with("https://") {
        return false;
    }
    !media_root.join(image.trim_start_matches('/')).exists()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn scratch_file(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("souq-images-{}", Uuid::new_v4().simple()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[tokio::test]
    async fn test_partial_download_removed_on_error() {
        let path = scratch_file("broken.jpg");
        let result = keep_if_complete(&path, async {
            tokio::fs::write(&path, [0u8; 64]).await?;
            Err::<usize, _>(ImageError::Io(std::io::Error::other("connection reset")))
        })
        .await;

        assert!(matches!(result, Err(ImageError::Io(_))));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_short_download_removed() {
        let path = scratch_file("pixel.gif");
        let result = keep_if_complete(&path, async {
            tokio::fs::write(&path, [0u8; 100]).await?;
            Ok::<_, ImageError>(100)
        })
        .await;

        assert!(matches!(result, Err(ImageError::TooSmall(100))));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_complete_download_kept() {
        let path = scratch_file("photo.jpg");
        let result = keep_if_complete(&path, async {
            tokio::fs::write(&path, vec![0u8; 2048]).await?;
            Ok::<_, ImageError>(2048)
        })
        .await;

        assert_eq!(result.unwrap(), 2048);
        assert!(path.exists());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_secure_filename() {
        assert_eq!(secure_filename("My Photo.JPG"), "My_Photo.JPG");
        assert_eq!(secure_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(secure_filename("صورة.png"), "png");
        assert_eq!(secure_filename("..."), "");
    }

    #[test]
    fn test_allowed_extension() {
        assert!(allowed_extension("a.JPEG", UPLOAD_EXTENSIONS));
        assert!(!allowed_extension("a.webp", UPLOAD_EXTENSIONS));
        assert!(allowed_extension("a.webp", EDIT_EXTENSIONS));
        assert!(!allowed_extension("noext", EDIT_EXTENSIONS));
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("image/png", "/x.jpg"), "png");
        assert_eq!(extension_for("image/jpeg", "/x.png"), "jpg");
        assert_eq!(extension_for("application/octet-stream", "/img/x.webp"), "webp");
        assert_eq!(extension_for("", "/img/x.svg"), "svg");
        assert_eq!(extension_for("", "/img/x"), "jpg");
    }

    #[test]
    fn test_upload_names() {
        let name = unique_upload_name("serum.png");
        assert!(name.ends_with("_serum.png"));
        assert_eq!(name.len(), 32 + "_serum.png".len());
        assert_eq!(stored_path("a.png"), "static/uploads/a.png");
    }

    #[test]
    fn test_is_missing_image() {
        let root = PathBuf::from("/nonexistent-media-root");
        assert!(is_missing_image("", &root));
        assert!(is_missing_image("None", &root));
        assert!(is_missing_image("static/images/Placeholder.png", &root));
        assert!(is_missing_image("static/uploads/gone.jpg", &root));
        assert!(!is_missing_image("https://cdn.example/a.jpg", &root));
    }

    #[tokio::test]
    async fn test_save_upload_writes_file() {
        let dir = std::env::temp_dir().join(format!("souq-upload-{}", Uuid::new_v4().simple()));
        let stored = save_upload(&dir, "a.png", b"data").await;
        assert_eq!(stored.ok().as_deref(), Some("static/uploads/a.png"));
        assert!(dir.join("a.png").exists());
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
