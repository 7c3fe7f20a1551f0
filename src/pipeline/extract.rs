//! Text extraction from uploaded documents.
//!
//! PDFs go through `pdf-extract`, a pure-Rust text-layer reader, so no native
//! library has to be present on the server. Images are decoded with the
//! `image` crate (which also validates them), re-encoded as PNG into a temp
//! file and handed to the `tesseract` binary.
//!
//! The extension is classified before anything is read, so an unsupported
//! upload never reaches an extraction engine.

use crate::config::OcrConfig;
use crate::error::WorkbookError;
use image::{DynamicImage, ImageFormat};
use std::io::{Cursor, Write};
use std::time::Instant;
use tracing::{debug, info};

/// What kind of document an upload is, decided by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image(ImageFormat),
}

impl DocumentKind {
    /// Classify a bare extension (`"pdf"`, `"PNG"`, ...). Case-insensitive.
    pub fn from_extension(extension: &str) -> Result<Self, WorkbookError> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            "png" => Ok(DocumentKind::Image(ImageFormat::Png)),
            "jpg" | "jpeg" => Ok(DocumentKind::Image(ImageFormat::Jpeg)),
            _ => Err(WorkbookError::UnsupportedFileType {
                extension: extension.to_string(),
            }),
        }
    }
}

/// The lower-cased text after the last `.` of a filename.
///
/// A name without a dot yields the whole name, which then fails
/// classification like any other unknown extension.
pub fn extension_of(filename: &str) -> String {
    filename
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Extract plain text from `bytes`, interpreting them per `extension`.
pub async fn extract(
    bytes: &[u8],
    extension: &str,
    ocr: &OcrConfig,
) -> Result<String, WorkbookError> {
    let kind = DocumentKind::from_extension(extension)?;
    let start = Instant::now();
    let text = match kind {
        DocumentKind::Pdf => extract_pdf(bytes.to_vec()).await?,
        DocumentKind::Image(format) => extract_image(bytes, format, ocr).await?,
    };
    info!(
        "Extracted {} chars from {} bytes ({:?}) in {:?}",
        text.chars().count(),
        bytes.len(),
        kind,
        start.elapsed()
    );
    Ok(text)
}

/// First `limit` characters of `text`, never splitting a character.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

// ── PDF ──────────────────────────────────────────────────────────────────────

/// Text-layer extraction, on the blocking pool since parsing is CPU-bound.
///
/// `pdf-extract` can panic on exotic font programs; the panic surfaces as a
/// `JoinError` and is reported like any other parse failure.
async fn extract_pdf(bytes: Vec<u8>) -> Result<String, WorkbookError> {
    tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| WorkbookError::ExtractionFailed {
            kind: "PDF",
            detail: format!("extractor panicked: {e}"),
        })?
        .map_err(|e| WorkbookError::ExtractionFailed {
            kind: "PDF",
            detail: e.to_string(),
        })
}

// ── Image (OCR) ──────────────────────────────────────────────────────────────

async fn extract_image(
    bytes: &[u8],
    format: ImageFormat,
    ocr: &OcrConfig,
) -> Result<String, WorkbookError> {
    let img = decode_image(bytes, format)?;
    debug!("Decoded image → {}x{} px", img.width(), img.height());

    let png = encode_png(&img)?;
    let mut tmp = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .map_err(|e| WorkbookError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(&png)
        .map_err(|e| WorkbookError::Internal(format!("tempfile write: {e}")))?;

    let output = tokio::process::Command::new(&ocr.tesseract_bin)
        .arg(tmp.path())
        .arg("stdout")
        .arg("-l")
        .arg(&ocr.language)
        .output()
        .await
        .map_err(|e| image_error(format!("failed to run {}: {e}", ocr.tesseract_bin.display())))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(image_error(format!(
            "OCR engine exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    // `tmp` is dropped (and the file deleted) on return.
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Decode with the declared format first, then let `image` sniff it; a
/// `.jpg` that is really a PNG is still a readable image.
fn decode_image(bytes: &[u8], format: ImageFormat) -> Result<DynamicImage, WorkbookError> {
    image::load_from_memory_with_format(bytes, format)
        .or_else(|_| image::load_from_memory(bytes))
        .map_err(|e| image_error(e.to_string()))
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, WorkbookError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| image_error(format!("PNG re-encode failed: {e}")))?;
    Ok(buf)
}

fn image_error(detail: String) -> WorkbookError {
    WorkbookError::ExtractionFailed {
        kind: "image",
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn classifies_supported_extensions() {
        assert_eq!(DocumentKind::from_extension("pdf").unwrap(), DocumentKind::Pdf);
        assert_eq!(
            DocumentKind::from_extension("PNG").unwrap(),
            DocumentKind::Image(ImageFormat::Png)
        );
        assert_eq!(
            DocumentKind::from_extension("jpeg").unwrap(),
            DocumentKind::Image(ImageFormat::Jpeg)
        );
        assert_eq!(
            DocumentKind::from_extension("jpg").unwrap(),
            DocumentKind::Image(ImageFormat::Jpeg)
        );
    }

    #[test]
    fn extension_is_text_after_last_dot() {
        assert_eq!(extension_of("notes.final.PDF"), "pdf");
        assert_eq!(extension_of("scan.jpeg"), "jpeg");
        assert_eq!(extension_of("README"), "readme");
        assert_eq!(extension_of(""), "");
    }

    #[tokio::test]
    async fn unsupported_extension_fails_before_io() {
        // The OCR binary does not exist; reaching it would produce a
        // different error.
        let ocr = OcrConfig {
            tesseract_bin: "/nonexistent/tesseract".into(),
            language: "eng".into(),
        };
        let err = extract(b"%PDF-1.4 not really", "docx", &ocr).await.unwrap_err();
        assert!(matches!(err, WorkbookError::UnsupportedFileType { ref extension } if extension == "docx"));
    }

    #[tokio::test]
    async fn corrupt_pdf_is_extraction_error() {
        let err = extract(b"definitely not a pdf", "pdf", &OcrConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkbookError::ExtractionFailed { kind: "PDF", .. }));
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn undecodable_image_is_extraction_error() {
        let err = extract(b"\x89PNG garbage", "png", &OcrConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkbookError::ExtractionFailed { kind: "image", .. }));
    }

    #[tokio::test]
    async fn missing_ocr_engine_is_extraction_error() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([255, 255, 255, 255])));
        let png = encode_png(&img).unwrap();
        let ocr = OcrConfig {
            tesseract_bin: "/nonexistent/tesseract".into(),
            language: "eng".into(),
        };
        let err = extract(&png, "png", &ocr).await.unwrap_err();
        assert!(err.to_string().contains("/nonexistent/tesseract"), "{err}");
    }

    /// A stand-in OCR binary that echoes its arguments and a fixed line.
    #[cfg(unix)]
    fn fake_tesseract(dir: &std::path::Path) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("tesseract");
        std::fs::write(&path, "#!/bin/sh\necho \"args: $1 $2 $3 $4\"\necho \"Hello World\"\n")
            .unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn image_text_comes_from_ocr_engine() {
        let dir = tempfile::tempdir().unwrap();
        let ocr = OcrConfig {
            tesseract_bin: fake_tesseract(dir.path()),
            language: "eng".into(),
        };

        let rgb = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(4, 4, image::Rgb([255, 255, 255])));
        let png = encode_png(&rgb).unwrap();
        let mut jpeg = Vec::new();
        rgb.write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg).unwrap();

        // Real JPEG, real PNG, and a PNG uploaded under a .jpg name.
        for (bytes, ext) in [(&jpeg, "jpg"), (&png, "png"), (&png, "jpeg")] {
            let text = extract(bytes, ext, &ocr).await.unwrap();
            let mut lines = text.lines();
            let args = lines.next().unwrap();
            assert!(args.starts_with("args: "), "{ext}: {text}");
            // The engine always sees a PNG temp file, whatever was uploaded.
            assert!(args.ends_with(".png stdout -l eng"), "{ext}: {args}");
            assert_eq!(lines.next(), Some("Hello World"), "{ext}");
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn ocr_language_is_passed_through() {
        let dir = tempfile::tempdir().unwrap();
        let ocr = OcrConfig {
            tesseract_bin: fake_tesseract(dir.path()),
            language: "eng+deu".into(),
        };
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255])));
        let text = extract(&encode_png(&img).unwrap(), "png", &ocr).await.unwrap();
        assert!(text.lines().next().unwrap().ends_with("stdout -l eng+deu"), "{text}");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("", 3), "");
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
