use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{ImageFormat, ImageReader, Rgba, RgbaImage};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::PipelineError;

const PLACEHOLDER_FILL: Rgba<u8> = Rgba([236, 236, 236, 255]);

/// Reserves a uniquely named file next to the final images so the finished
/// file can be renamed into place atomically.
pub(crate) fn reserve(dir: &Path, url: &str) -> Result<NamedTempFile, PipelineError> {
    fs::create_dir_all(dir).map_err(|err| {
        PipelineError::download(url, format!("cannot create {}: {}", dir.display(), err))
    })?;
    tempfile::Builder::new()
        .prefix(".download-")
        .suffix(".part")
        .tempfile_in(dir)
        .map_err(|err| PipelineError::download(url, format!("cannot create temp file: {}", err)))
}

/// Decodes the downloaded payload, resizes it to the canonical size and
/// renames the PNG result onto `dest`.
pub(crate) fn finalize(
    raw: NamedTempFile,
    dest: &Path,
    width: u32,
    height: u32,
    url: &str,
) -> Result<PathBuf, PipelineError> {
    let decoded = ImageReader::open(raw.path())
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|err| PipelineError::download(url, format!("cannot read payload: {}", err)))?
        .decode()
        .map_err(|err| PipelineError::download(url, format!("not an image: {}", err)))?;
    let resized = decoded.resize_exact(width, height, FilterType::Lanczos3);

    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let mut out = tempfile::Builder::new()
        .prefix(".resized-")
        .suffix(".png")
        .tempfile_in(dir)
        .map_err(|err| PipelineError::download(url, format!("cannot create temp file: {}", err)))?;
    resized
        .write_to(out.as_file_mut(), ImageFormat::Png)
        .map_err(|err| PipelineError::download(url, format!("cannot encode image: {}", err)))?;
    out.as_file_mut()
        .flush()
        .map_err(|err| PipelineError::download(url, err))?;
    out.persist(dest)
        .map_err(|err| PipelineError::download(url, format!("cannot move into place: {}", err)))?;
    Ok(dest.to_path_buf())
}

/// Writes `bytes` to `dest` through a sibling temp file and an atomic rename.
pub(crate) fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match dest.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create directory: {}", dir.display()))?;
    let mut file = tempfile::Builder::new()
        .prefix(".phylotree-")
        .tempfile_in(&dir)
        .with_context(|| "failed to create temp file")?;
    file.write_all(bytes)
        .with_context(|| format!("failed to write {}", dest.display()))?;
    file.persist(dest)
        .with_context(|| format!("failed to move file into place: {}", dest.display()))?;
    Ok(())
}

/// Makes sure the placeholder shown for failed lookups exists.
pub fn ensure_placeholder(path: &Path, width: u32, height: u32) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    let image = RgbaImage::from_pixel(width.max(1), height.max(1), PLACEHOLDER_FILL);
    let mut bytes = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .with_context(|| "failed to encode placeholder")?;
    write_atomic(path, bytes.get_ref())?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(width: u32, height: u32, color: Rgba<u8>) -> Vec<u8> {
        let mut bytes = std::io::Cursor::new(Vec::new());
        RgbaImage::from_pixel(width, height, color)
            .write_to(&mut bytes, ImageFormat::Png)
            .expect("encode");
        bytes.into_inner()
    }

    #[test]
    fn finalize_resizes_and_replaces_the_reservation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let raw = reserve(dir.path(), "http://x/a.png").expect("reserve");
        let raw_path = raw.path().to_path_buf();
        fs::write(&raw_path, png(20, 10, Rgba([200, 10, 10, 255]))).expect("write");

        let dest = dir.path().join("panthera_leo.png");
        let path = finalize(raw, &dest, 40, 30, "http://x/a.png").expect("finalize");
        assert_eq!(path, dest);
        let image = image::open(&dest).expect("open").to_rgba8();
        assert_eq!(image.dimensions(), (40, 30));
        assert!(!raw_path.exists());
        let leftovers = fs::read_dir(dir.path()).expect("list").count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn non_image_payload_is_download_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let raw = reserve(dir.path(), "http://x/page").expect("reserve");
        fs::write(raw.path(), b"<html>blocked</html>").expect("write");
        let err = finalize(raw, &dir.path().join("x.png"), 10, 10, "http://x/page")
            .expect_err("html is not an image");
        assert!(matches!(err, PipelineError::DownloadFailed { .. }));
        assert!(!dir.path().join("x.png").exists());
    }

    #[test]
    fn placeholder_is_created_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/placeholder.png");
        ensure_placeholder(&path, 8, 8).expect("create");
        assert_eq!(image::open(&path).expect("open").width(), 8);

        fs::write(&path, b"custom").expect("overwrite");
        ensure_placeholder(&path, 8, 8).expect("keep");
        assert_eq!(fs::read(&path).expect("read"), b"custom");
    }
}
