//! Text extraction for PDF and plain-text documents.
//!
//! PDFs are read with `pdf-extract`. When the direct text layer is too thin
//! to be useful (scanned or image-only PDFs), every page is rendered to an
//! image and run through OCR instead. Plain-text files are decoded as UTF-8,
//! dropping any byte sequences that are not valid UTF-8.
//!
//! Failures never abort a batch: [`Extractor::extract_documents`] logs the
//! error and the failing file contributes no text.

use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::ExtractionConfig;
use crate::models::{Document, DocumentFormat};
use crate::progress::{ProgressEvent, ProgressReporter};

/// Extraction error. The pipeline logs it and skips the document.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OCR failed: {0}")]
    Ocr(String),
}

/// Renders PDF pages to images and recognizes their text.
pub trait OcrEngine: Send + Sync {
    /// Return the recognized text of every page, in page order.
    ///
    /// A page that fails recognition yields an empty string; only failures
    /// that affect the whole document (rendering, missing executables) are
    /// errors.
    fn recognize_pages(&self, pdf_path: &Path) -> Result<Vec<String>, ExtractError>;
}

/// OCR through the poppler `pdftoppm` renderer and the `tesseract` CLI.
pub struct TesseractOcr {
    pdftoppm_bin: String,
    tesseract_bin: String,
    dpi: u32,
    language: String,
}

impl TesseractOcr {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            pdftoppm_bin: config.pdftoppm_bin.clone(),
            tesseract_bin: config.tesseract_bin.clone(),
            dpi: config.ocr_dpi,
            language: config.ocr_language.clone(),
        }
    }

    fn recognize_image(&self, image: &Path) -> Result<String, ExtractError> {
        let output = Command::new(&self.tesseract_bin)
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()
            .map_err(|e| {
                ExtractError::Ocr(format!("failed to run {}: {}", self.tesseract_bin, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::Ocr(format!(
                "{} exited with {}: {}",
                self.tesseract_bin,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize_pages(&self, pdf_path: &Path) -> Result<Vec<String>, ExtractError> {
        let dir = tempfile::tempdir()
            .map_err(|e| ExtractError::Ocr(format!("failed to create temp dir: {}", e)))?;
        let prefix = dir.path().join("page");

        let output = Command::new(&self.pdftoppm_bin)
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-png")
            .arg(pdf_path)
            .arg(&prefix)
            .output()
            .map_err(|e| {
                ExtractError::Ocr(format!("failed to run {}: {}", self.pdftoppm_bin, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::Ocr(format!(
                "page rendering failed: {}",
                stderr.trim()
            )));
        }

        let images = list_page_images(dir.path())?;
        if images.is_empty() {
            return Err(ExtractError::Ocr(
                "page rendering produced no images".to_string(),
            ));
        }

        let mut pages = Vec::with_capacity(images.len());
        for (i, image) in images.iter().enumerate() {
            match self.recognize_image(image) {
                Ok(text) => {
                    debug!(page = i + 1, chars = text.chars().count(), "OCR page");
                    pages.push(text);
                }
                Err(e) => {
                    warn!(page = i + 1, error = %e, "OCR failed for page");
                    pages.push(String::new());
                }
            }
        }
        Ok(pages)
    }
}

/// Rendered page images, sorted by page number. `pdftoppm` zero-pads the
/// number to the width of the page count, so a plain name sort is not enough.
fn list_page_images(dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let entries = std::fs::read_dir(dir).map_err(|e| ExtractError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut images: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("png"))
        .collect();
    images.sort_by_key(|p| page_number(p));
    Ok(images)
}

fn page_number(path: &Path) -> u32 {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.rsplit('-').next())
        .and_then(|n| n.parse::<u32>().ok())
        .unwrap_or(u32::MAX)
}

/// Converts documents into raw text.
pub struct Extractor {
    min_pdf_text_chars: usize,
    ocr: Option<Box<dyn OcrEngine>>,
}

impl Extractor {
    pub fn new(min_pdf_text_chars: usize, ocr: Option<Box<dyn OcrEngine>>) -> Self {
        Self {
            min_pdf_text_chars,
            ocr,
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        let ocr: Option<Box<dyn OcrEngine>> = if config.ocr {
            Some(Box::new(TesseractOcr::from_config(config)))
        } else {
            None
        };
        Self::new(config.min_pdf_text_chars, ocr)
    }

    /// Extract and concatenate the text of every document, in order.
    ///
    /// A document that fails extraction is logged and contributes nothing.
    pub fn extract_documents(&self, docs: &[Document], progress: &dyn ProgressReporter) -> String {
        let mut all_text = String::new();
        let total = docs.len() as u64;

        for (i, doc) in docs.iter().enumerate() {
            progress.report(ProgressEvent::Extracting {
                document: doc.display_name(),
                n: i as u64 + 1,
                total,
            });

            match self.extract_document(doc) {
                Ok(text) => {
                    info!(
                        file = %doc.display_name(),
                        chars = text.chars().count(),
                        "extracted text"
                    );
                    all_text.push_str(&text);
                }
                Err(e) => {
                    error!(file = %doc.path.display(), error = %e, "failed to extract text");
                }
            }
        }

        all_text
    }

    pub fn extract_document(&self, doc: &Document) -> Result<String, ExtractError> {
        match doc.format {
            DocumentFormat::Pdf => self.extract_pdf(&doc.path),
            DocumentFormat::Txt => extract_txt(&doc.path),
        }
    }

    fn extract_pdf(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = std::fs::read(path).map_err(|e| ExtractError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let direct = match pdf_text_by_page(&bytes) {
            Ok(text) => text,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "direct PDF text extraction failed");
                String::new()
            }
        };

        self.direct_or_ocr(path, direct)
    }

    /// Keep `direct` text unless it is too thin to be a real text layer, in
    /// which case the pages are recognized with OCR when an engine is set.
    fn direct_or_ocr(&self, path: &Path, direct: String) -> Result<String, ExtractError> {
        if direct.trim().chars().count() >= self.min_pdf_text_chars {
            return Ok(direct);
        }

        let Some(ocr) = &self.ocr else {
            debug!(file = %path.display(), "PDF text is minimal and OCR is disabled");
            return Ok(direct);
        };

        info!(
            file = %path.display(),
            "text extraction yielded minimal content, attempting OCR"
        );
        let pages = ocr.recognize_pages(path)?;
        let mut text = String::new();
        for page in &pages {
            text.push_str(page);
            text.push('\n');
        }
        info!(
            file = %path.display(),
            pages = pages.len(),
            chars = text.chars().count(),
            "OCR completed"
        );
        Ok(text)
    }
}

/// Direct text layer, one trimmed line group per non-empty page.
fn pdf_text_by_page(bytes: &[u8]) -> Result<String, ExtractError> {
    // pdf-extract panics on some malformed inputs instead of returning an error.
    let raw = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
        .map_err(|_| ExtractError::Pdf("parser panicked".to_string()))?
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;

    let mut text = String::new();
    for (i, page) in raw.split('\x0C').enumerate() {
        let page = page.trim();
        debug!(page = i + 1, chars = page.chars().count(), "PDF page text");
        if !page.is_empty() {
            text.push_str(page);
            text.push('\n');
        }
    }
    Ok(text)
}

fn extract_txt(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path).map_err(|e| ExtractError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut text = decode_utf8_skipping_invalid(&bytes);
    text.truncate(text.trim_end().len());
    text.push('\n');
    Ok(text)
}

/// Decode UTF-8, silently dropping invalid byte sequences.
fn decode_utf8_skipping_invalid(mut bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                out.push_str(valid);
                return out;
            }
            Err(e) => {
                let valid_up_to = e.valid_up_to();
                out.push_str(std::str::from_utf8(&bytes[..valid_up_to]).unwrap_or_default());
                let skip = e.error_len().unwrap_or(bytes.len() - valid_up_to);
                bytes = &bytes[valid_up_to + skip..];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct FakeOcr {
        pages: Result<Vec<String>, String>,
        calls: Arc<AtomicUsize>,
    }

    impl OcrEngine for FakeOcr {
        fn recognize_pages(&self, _pdf_path: &Path) -> Result<Vec<String>, ExtractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pages.clone().map_err(ExtractError::Ocr)
        }
    }

    fn fake_ocr(pages: Result<Vec<&str>, &str>) -> (Box<dyn OcrEngine>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = FakeOcr {
            pages: pages
                .map(|p| p.into_iter().map(String::from).collect())
                .map_err(String::from),
            calls: calls.clone(),
        };
        (Box::new(engine), calls)
    }

    fn write(dir: &TempDir, name: &str, bytes: &[u8]) -> Document {
        let path = dir.path().join(name);
        fs::write(&path, bytes).unwrap();
        Document::from_path(path).unwrap()
    }

    #[test]
    fn txt_strips_trailing_whitespace_and_appends_newline() {
        let tmp = TempDir::new().unwrap();
        let doc = write(&tmp, "notes.txt", b"  Photosynthesis makes sugar.\n\n\t  ");
        let text = Extractor::new(100, None).extract_document(&doc).unwrap();
        assert_eq!(text, "  Photosynthesis makes sugar.\n");
    }

    #[test]
    fn txt_drops_invalid_utf8() {
        let tmp = TempDir::new().unwrap();
        let doc = write(&tmp, "bad.txt", b"caf\xc3\xa9 \xff\xfeok\x80");
        let text = Extractor::new(100, None).extract_document(&doc).unwrap();
        assert_eq!(text, "café ok\n");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let doc = Document::from_path("/nonexistent/dir/missing.txt").unwrap();
        let err = Extractor::new(100, None).extract_document(&doc).unwrap_err();
        assert!(matches!(err, ExtractError::Io { .. }));
    }

    #[test]
    fn batch_length_is_sum_of_contributions() {
        let tmp = TempDir::new().unwrap();
        let a = write(&tmp, "a.txt", b"First file.");
        let b = write(&tmp, "b.txt", b"Second file.  \n");
        let missing = Document::from_path(tmp.path().join("gone.txt")).unwrap();
        let extractor = Extractor::new(100, None);

        let expected: usize = [&a, &missing, &b]
            .iter()
            .map(|d| extractor.extract_document(d).map(|t| t.len()).unwrap_or(0))
            .sum();
        let all = extractor.extract_documents(&[a, missing, b], &NoProgress);

        assert_eq!(all.len(), expected);
        assert_eq!(all, "First file.\nSecond file.\n");
    }

    #[test]
    fn short_pdf_text_falls_back_to_ocr() {
        let (ocr, calls) = fake_ocr(Ok(vec!["Page one from OCR", "Page two from OCR"]));
        let text = Extractor::new(100, Some(ocr))
            .direct_or_ocr(Path::new("scan.pdf"), "short caption\n".to_string())
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(text, "Page one from OCR\nPage two from OCR\n");
    }

    #[test]
    fn threshold_counts_trimmed_characters() {
        let (ocr, calls) = fake_ocr(Ok(vec!["unused"]));
        let extractor = Extractor::new(10, Some(ocr));

        let exactly = format!("   {}\n\n", "é".repeat(10));
        let text = extractor
            .direct_or_ocr(Path::new("book.pdf"), exactly.clone())
            .unwrap();
        assert_eq!(text, exactly);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        extractor
            .direct_or_ocr(Path::new("book.pdf"), format!("   {}\n\n", "é".repeat(9)))
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn long_pdf_text_skips_ocr() {
        let phrase = "mitochondria produce energy for the cell ".repeat(5);
        let (ocr, calls) = fake_ocr(Ok(vec!["unused"]));
        let text = Extractor::new(100, Some(ocr))
            .direct_or_ocr(Path::new("book.pdf"), phrase.clone())
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(text, phrase);
    }

    #[test]
    fn ocr_disabled_keeps_direct_text() {
        let text = Extractor::new(100, None)
            .direct_or_ocr(Path::new("scan.pdf"), "short caption\n".to_string())
            .unwrap();
        assert_eq!(text, "short caption\n");
    }

    #[test]
    fn ocr_engine_failure_is_an_error() {
        let (ocr, _) = fake_ocr(Err("tesseract not found"));
        let err = Extractor::new(100, Some(ocr))
            .direct_or_ocr(Path::new("scan.pdf"), String::new())
            .unwrap_err();
        assert!(matches!(err, ExtractError::Ocr(_)));
    }

    #[test]
    fn unparseable_pdf_tries_ocr_then_contributes_nothing() {
        let tmp = TempDir::new().unwrap();
        let bad = write(&tmp, "broken.pdf", b"not a pdf at all");
        let good = write(&tmp, "ok.txt", b"Still processed.");
        let (ocr, calls) = fake_ocr(Err("pdftoppm not found"));
        let extractor = Extractor::new(100, Some(ocr));

        let err = extractor.extract_document(&bad).unwrap_err();
        assert!(matches!(err, ExtractError::Ocr(_)));

        let all = extractor.extract_documents(&[bad, good], &NoProgress);
        assert_eq!(all, "Still processed.\n");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn page_images_sort_numerically() {
        let tmp = TempDir::new().unwrap();
        for name in ["page-10.png", "page-2.png", "page-1.png", "notes.txt"] {
            fs::write(tmp.path().join(name), b"").unwrap();
        }
        let images = list_page_images(tmp.path()).unwrap();
        let names: Vec<String> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["page-1.png", "page-2.png", "page-10.png"]);
    }
}
