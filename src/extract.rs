//! Embedded image extraction.
//!
//! Scans an HTML document for `data:image/<tag>;base64,<payload>` references,
//! decodes each payload, and writes it to the output directory under a name
//! from the configured `[[images]]` list (see [`crate::naming`]).
//!
//! ## Failure policy
//!
//! Problems with a single image never abort the run:
//!
//! | Situation | Recorded as | Effect |
//! |---|---|---|
//! | payload is not valid base64 | [`ExtractFailure`] | that image skipped |
//! | more images than names (order mode) | [`ExtractWarning::Overflow`] | the rest ignored |
//! | no entry for the alt text (alt mode) | [`ExtractWarning::Unassigned`] | that image skipped |
//!
//! I/O errors on the input document or the output directory do abort, and
//! surface as [`ExtractError`].
//!
//! In order mode a failed image still consumes its positional name, so the
//! images after it keep the names they were meant to have.
//!
//! ## Verification
//!
//! After writing, [`verify`] re-reads every output file and compares its size
//! and SHA-256 digest against what was decoded.

use crate::config::{ExtractConfig, SiteFixConfig};
use crate::naming::{Assigned, ImageName, NameAssigner};
use crate::types::ImageFormat;
use base64::Engine;
use base64::alphabet;
use base64::engine::{GeneralPurpose, GeneralPurposeConfig};
use image::ImageReader;
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid image pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("Source document not found: {0}")]
    SourceNotFound(PathBuf),
}

/// Standard alphabet, padding required, but non-zero bits in the last
/// symbol are accepted the way browsers accept them.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

static ALT_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\balt="([^"]*)""#).expect("alt regex is valid"));

/// One `data:image/...;base64,...` occurrence in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage<'a> {
    /// 0-based index in scan order.
    pub position: usize,
    pub format: ImageFormat,
    /// Base64 text, without the `data:` prefix.
    pub payload: &'a str,
    /// Byte range of the whole `data:` URI in the document.
    pub span: Range<usize>,
    /// `alt` of the `<img>` tag holding the URI, if it sits inside one.
    pub alt: Option<&'a str>,
}

/// Build the `data:` URI pattern for the given format tags.
fn data_uri_regex(formats: &[ImageFormat]) -> Result<Regex, regex::Error> {
    let tags: Vec<&str> = formats.iter().map(|f| f.tag()).collect();
    Regex::new(&format!(
        r"data:image/({});base64,([A-Za-z0-9+/=]+)",
        tags.join("|")
    ))
}

/// Find every embedded image in `html`, in order of appearance.
pub fn find_embedded_images<'a>(
    html: &'a str,
    formats: &[ImageFormat],
) -> Result<Vec<EmbeddedImage<'a>>, ExtractError> {
    let re = data_uri_regex(formats)?;
    let images = re
        .captures_iter(html)
        .enumerate()
        .filter_map(|(position, caps)| {
            let whole = caps.get(0)?;
            let format = caps.get(1)?.as_str().parse().ok()?;
            let payload = caps.get(2)?.as_str();
            Some(EmbeddedImage {
                position,
                format,
                payload,
                span: whole.range(),
                alt: enclosing_alt(html, whole.range()),
            })
        })
        .collect();
    Ok(images)
}

/// Alt text of the `<img>` tag that contains `span`, if any.
///
/// The tag is found textually: the last `<img` before the span with no `>`
/// in between, up to the first `>` after it.
fn enclosing_alt(html: &str, span: Range<usize>) -> Option<&str> {
    let before = &html[..span.start];
    let tag_start = before.rfind("<img")?;
    if before[tag_start..].contains('>') {
        return None;
    }
    let after = &html[span.end..];
    let tag_end = span.end + after.find('>')?;

    [&html[tag_start..span.start], &html[span.end..tag_end]]
        .into_iter()
        .find_map(|part| ALT_ATTR.captures(part))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// A decoded image written to disk.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedImage {
    pub position: usize,
    pub name: String,
    pub format: ImageFormat,
    /// Length of the base64 payload.
    pub encoded_size: usize,
    /// Length of the decoded bytes.
    pub decoded_size: usize,
    /// Extension of the format detected from the bytes themselves.
    pub detected: Option<String>,
    /// `true` when the detected format disagrees with the `data:` tag.
    pub format_mismatch: bool,
    pub dimensions: Option<(u32, u32)>,
    pub sha256: String,
}

impl ExtractedImage {
    /// Bytes saved by storing the image as a file rather than inline text.
    pub fn savings(&self) -> i64 {
        self.encoded_size as i64 - self.decoded_size as i64
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractFailure {
    pub position: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractWarning {
    /// More embedded images than names; extraction stopped.
    Overflow { found: usize, capacity: usize },
    /// Alt mode had no entry for this image.
    Unassigned {
        position: usize,
        alt: Option<String>,
    },
}

/// Everything one extraction pass did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractReport {
    /// Number of embedded images found in the document.
    pub found: usize,
    pub extracted: Vec<ExtractedImage>,
    pub failures: Vec<ExtractFailure>,
    pub warnings: Vec<ExtractWarning>,
}

impl ExtractReport {
    pub fn total_encoded(&self) -> usize {
        self.extracted.iter().map(|i| i.encoded_size).sum()
    }

    pub fn total_decoded(&self) -> usize {
        self.extracted.iter().map(|i| i.decoded_size).sum()
    }

    pub fn total_savings(&self) -> i64 {
        self.extracted.iter().map(|i| i.savings()).sum()
    }

    /// Decoded size as a percentage of encoded size. 0 when nothing was extracted.
    pub fn ratio(&self) -> f64 {
        let encoded = self.total_encoded();
        if encoded == 0 {
            0.0
        } else {
            self.total_decoded() as f64 / encoded as f64 * 100.0
        }
    }
}

/// SHA-256 of a byte slice as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Detected format extension and pixel dimensions, read from headers only.
fn sniff(bytes: &[u8]) -> (Option<image::ImageFormat>, Option<(u32, u32)>) {
    let detected = image::guess_format(bytes).ok();
    let dimensions = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()
        .and_then(|reader| reader.into_dimensions().ok());
    (detected, dimensions)
}

/// Extract every embedded image in `html` into `output_dir`.
pub fn extract(
    html: &str,
    names: &[ImageName],
    settings: &ExtractConfig,
    output_dir: &Path,
) -> Result<ExtractReport, ExtractError> {
    let embedded = find_embedded_images(html, &settings.formats)?;
    std::fs::create_dir_all(output_dir)?;

    let mut report = ExtractReport {
        found: embedded.len(),
        ..Default::default()
    };
    let mut assigner = NameAssigner::new(names, settings.assign);

    for image in &embedded {
        let name = match assigner.assign(image.position, image.alt) {
            Assigned::Name(name) => name,
            Assigned::Exhausted => {
                report.warnings.push(ExtractWarning::Overflow {
                    found: embedded.len(),
                    capacity: assigner.capacity(),
                });
                break;
            }
            Assigned::Unmatched => {
                report.warnings.push(ExtractWarning::Unassigned {
                    position: image.position,
                    alt: image.alt.map(str::to_string),
                });
                continue;
            }
        };

        let bytes = match PAYLOAD_ENGINE.decode(image.payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                report.failures.push(ExtractFailure {
                    position: image.position,
                    message: e.to_string(),
                });
                continue;
            }
        };

        std::fs::write(output_dir.join(&name.file), &bytes)?;

        let (detected, dimensions) = sniff(&bytes);
        report.extracted.push(ExtractedImage {
            position: image.position,
            name: name.file.clone(),
            format: image.format,
            encoded_size: image.payload.len(),
            decoded_size: bytes.len(),
            detected: detected
                .and_then(|f| f.extensions_str().first())
                .map(|ext| ext.to_string()),
            format_mismatch: detected.is_some_and(|f| !image.format.matches_content(f)),
            dimensions,
            sha256: hash_bytes(&bytes),
        });
    }

    Ok(report)
}

/// Result of re-reading one extracted file.
#[derive(Debug, Clone, Serialize)]
pub struct FileCheck {
    pub name: String,
    pub exists: bool,
    /// Size on disk, 0 when missing.
    pub size: u64,
    /// On-disk content hashes to the digest recorded at extraction time.
    pub digest_matches: bool,
}

impl FileCheck {
    pub fn ok(&self) -> bool {
        self.exists && self.digest_matches
    }
}

/// Re-read every extracted file and compare it with what was written.
pub fn verify(report: &ExtractReport, output_dir: &Path) -> Vec<FileCheck> {
    report
        .extracted
        .iter()
        .map(|image| match std::fs::read(output_dir.join(&image.name)) {
            Ok(bytes) => FileCheck {
                name: image.name.clone(),
                exists: true,
                size: bytes.len() as u64,
                digest_matches: hash_bytes(&bytes) == image.sha256,
            },
            Err(_) => FileCheck {
                name: image.name.clone(),
                exists: false,
                size: 0,
                digest_matches: false,
            },
        })
        .collect()
}

/// Extraction plus verification, as run by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractRun {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub report: ExtractReport,
    pub checks: Vec<FileCheck>,
}

impl ExtractRun {
    pub fn all_verified(&self) -> bool {
        self.checks.iter().all(FileCheck::ok)
    }
}

/// Read `input`, extract its images into `output_dir`, and verify the writes.
pub fn extract_file(
    input: &Path,
    output_dir: &Path,
    config: &SiteFixConfig,
) -> Result<ExtractRun, ExtractError> {
    if !input.exists() {
        return Err(ExtractError::SourceNotFound(input.to_path_buf()));
    }
    let html = std::fs::read_to_string(input)?;
    let report = extract(&html, &config.images, &config.extract, output_dir)?;
    let checks = verify(&report, output_dir);
    Ok(ExtractRun {
        input: input.to_path_buf(),
        output_dir: output_dir.to_path_buf(),
        report,
        checks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::Assignment;
    use crate::test_helpers::*;
    use base64::engine::general_purpose::STANDARD;
    use std::fs;
    use tempfile::TempDir;

    fn settings(assign: Assignment) -> ExtractConfig {
        ExtractConfig {
            assign,
            ..ExtractConfig::default()
        }
    }

    // =========================================================================
    // find_embedded_images
    // =========================================================================

    #[test]
    fn finds_images_in_document_order() {
        let html = format!(
            "{}<div style=\"background:url('{}')\"></div>{}",
            img_tag("One", "png", &tiny_png()),
            data_uri("gif", &tiny_gif()),
            img_tag("Three", "jpeg", &fake_jpeg(3)),
        );
        let found = find_embedded_images(&html, &ImageFormat::ALL).unwrap();
        let formats: Vec<ImageFormat> = found.iter().map(|i| i.format).collect();
        assert_eq!(
            formats,
            vec![ImageFormat::Png, ImageFormat::Gif, ImageFormat::Jpeg]
        );
        let positions: Vec<usize> = found.iter().map(|i| i.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn captures_alt_of_enclosing_img() {
        let html = img_tag("Hero Shot", "png", &tiny_png());
        let found = find_embedded_images(&html, &ImageFormat::ALL).unwrap();
        assert_eq!(found[0].alt, Some("Hero Shot"));
    }

    #[test]
    fn alt_before_src_is_found() {
        let html = format!(
            "<img alt=\"First\" src=\"{}\">",
            data_uri("png", &tiny_png())
        );
        let found = find_embedded_images(&html, &ImageFormat::ALL).unwrap();
        assert_eq!(found[0].alt, Some("First"));
    }

    #[test]
    fn background_image_has_no_alt() {
        let html = format!(
            "<img src=\"/x.png\" alt=\"Other\"><div style=\"background:url({})\"></div>",
            data_uri("png", &tiny_png())
        );
        let found = find_embedded_images(&html, &ImageFormat::ALL).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].alt, None);
    }

    #[test]
    fn unlisted_formats_are_ignored() {
        let html = format!(
            "{}{}",
            data_uri("png", &tiny_png()),
            data_uri("gif", &tiny_gif())
        );
        let found = find_embedded_images(&html, &[ImageFormat::Gif]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].format, ImageFormat::Gif);
    }

    #[test]
    fn svg_data_uris_are_not_matched() {
        let html = "<img src=\"data:image/svg+xml;base64,PHN2Zz4=\" alt=\"x\">";
        assert!(find_embedded_images(html, &ImageFormat::ALL)
            .unwrap()
            .is_empty());
    }

    // =========================================================================
    // extract
    // =========================================================================

    #[test]
    fn seven_images_get_seven_names_in_order() {
        let tmp = TempDir::new().unwrap();
        let names = seven_names();
        let payloads: Vec<Vec<u8>> = (0..7).map(|i| fake_jpeg(i as u8)).collect();
        let html = page_with_images(&names, &payloads);

        let report = extract(&html, &names, &settings(Assignment::Order), tmp.path()).unwrap();

        assert_eq!(report.found, 7);
        assert!(report.failures.is_empty());
        assert!(report.warnings.is_empty());
        let written: Vec<&str> = report.extracted.iter().map(|i| i.name.as_str()).collect();
        let expected: Vec<&str> = names.iter().map(|n| n.file.as_str()).collect();
        assert_eq!(written, expected);
        for (name, payload) in names.iter().zip(&payloads) {
            assert_eq!(&fs::read(tmp.path().join(&name.file)).unwrap(), payload);
        }
    }

    #[test]
    fn overflow_stops_at_the_name_list() {
        let tmp = TempDir::new().unwrap();
        let names = seven_names();
        let html: String = (0..9)
            .map(|i| img_tag(&format!("Image {i}"), "png", &fake_jpeg(i)))
            .collect();

        let report = extract(&html, &names, &settings(Assignment::Order), tmp.path()).unwrap();

        assert_eq!(report.found, 9);
        assert_eq!(report.extracted.len(), 7);
        assert_eq!(
            report.warnings,
            vec![ExtractWarning::Overflow {
                found: 9,
                capacity: 7
            }]
        );
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 7);
    }

    #[test]
    fn trailing_bits_in_last_symbol_are_accepted() {
        let tmp = TempDir::new().unwrap();
        let names = seven_names();
        let html = "<img src=\"data:image/png;base64,QR==\" alt=\"x\">";

        let report = extract(html, &names, &settings(Assignment::Order), tmp.path()).unwrap();

        assert!(report.failures.is_empty());
        assert_eq!(report.extracted.len(), 1);
        assert_eq!(fs::read(tmp.path().join(&names[0].file)).unwrap(), b"A");
    }

    #[test]
    fn malformed_payload_is_skipped_and_reported() {
        let tmp = TempDir::new().unwrap();
        let names = seven_names();
        let mut html = String::new();
        for i in 0..7u8 {
            if i == 3 {
                // Padding in the middle of the payload
                html.push_str("<img src=\"data:image/png;base64,AB=CDEF\" alt=\"Broken\">");
            } else {
                html.push_str(&img_tag("Fine", "png", &fake_jpeg(i)));
            }
        }

        let report = extract(&html, &names, &settings(Assignment::Order), tmp.path()).unwrap();

        assert_eq!(report.extracted.len(), 6);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].position, 3);
        // The broken image keeps its slot: later images keep their names
        assert!(!tmp.path().join(&names[3].file).exists());
        assert_eq!(report.extracted[3].name, names[4].file);
    }

    #[test]
    fn alt_mode_names_by_alt_text() {
        let tmp = TempDir::new().unwrap();
        let names = seven_names();
        // Document order reversed relative to the name list
        let html: String = names
            .iter()
            .enumerate()
            .rev()
            .map(|(i, n)| img_tag(&n.alt, "png", &fake_jpeg(i as u8)))
            .collect();

        let report = extract(&html, &names, &settings(Assignment::Alt), tmp.path()).unwrap();

        assert_eq!(report.extracted.len(), 7);
        for (i, name) in names.iter().enumerate() {
            assert_eq!(
                fs::read(tmp.path().join(&name.file)).unwrap(),
                fake_jpeg(i as u8)
            );
        }
    }

    #[test]
    fn alt_mode_reports_unknown_alt() {
        let tmp = TempDir::new().unwrap();
        let names = seven_names();
        let html = img_tag("Nobody", "png", &tiny_png());

        let report = extract(&html, &names, &settings(Assignment::Alt), tmp.path()).unwrap();

        assert!(report.extracted.is_empty());
        assert_eq!(
            report.warnings,
            vec![ExtractWarning::Unassigned {
                position: 0,
                alt: Some("Nobody".to_string())
            }]
        );
    }

    #[test]
    fn creates_missing_output_dir() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("nested/images");
        let names = seven_names();
        let html = img_tag("x", "png", &tiny_png());

        extract(&html, &names, &settings(Assignment::Order), &out).unwrap();

        assert!(out.join("logo.jpg").exists());
    }

    #[test]
    fn records_sizes_and_sniffed_format() {
        let tmp = TempDir::new().unwrap();
        let names = seven_names();
        let png = tiny_png();
        let html = img_tag("x", "jpg", &png);

        let report = extract(&html, &names, &settings(Assignment::Order), tmp.path()).unwrap();

        let image = &report.extracted[0];
        assert_eq!(image.decoded_size, png.len());
        assert_eq!(image.encoded_size, STANDARD.encode(&png).len());
        assert!(image.savings() > 0);
        assert_eq!(image.detected.as_deref(), Some("png"));
        assert!(image.format_mismatch);
        assert_eq!(image.dimensions, Some((1, 1)));
    }

    #[test]
    fn totals_and_ratio() {
        let tmp = TempDir::new().unwrap();
        let names = seven_names();
        let html = format!(
            "{}{}",
            img_tag("a", "png", &tiny_png()),
            img_tag("b", "gif", &tiny_gif())
        );

        let report = extract(&html, &names, &settings(Assignment::Order), tmp.path()).unwrap();

        assert_eq!(
            report.total_decoded(),
            tiny_png().len() + tiny_gif().len()
        );
        assert!(report.ratio() > 0.0 && report.ratio() < 100.0);
        assert_eq!(
            report.total_savings(),
            report.total_encoded() as i64 - report.total_decoded() as i64
        );
    }

    #[test]
    fn empty_report_ratio_is_zero() {
        assert_eq!(ExtractReport::default().ratio(), 0.0);
    }

    // =========================================================================
    // verify / extract_file
    // =========================================================================

    #[test]
    fn verify_passes_for_fresh_files() {
        let tmp = TempDir::new().unwrap();
        let names = seven_names();
        let html = img_tag("x", "png", &tiny_png());
        let report = extract(&html, &names, &settings(Assignment::Order), tmp.path()).unwrap();

        let checks = verify(&report, tmp.path());

        assert_eq!(checks.len(), 1);
        assert!(checks[0].ok());
        assert_eq!(checks[0].size, tiny_png().len() as u64);
    }

    #[test]
    fn verify_flags_missing_and_altered_files() {
        let tmp = TempDir::new().unwrap();
        let names = seven_names();
        let html = format!(
            "{}{}",
            img_tag("a", "png", &tiny_png()),
            img_tag("b", "gif", &tiny_gif())
        );
        let report = extract(&html, &names, &settings(Assignment::Order), tmp.path()).unwrap();
        fs::remove_file(tmp.path().join(&names[0].file)).unwrap();
        fs::write(tmp.path().join(&names[1].file), b"tampered").unwrap();

        let checks = verify(&report, tmp.path());

        assert!(!checks[0].exists);
        assert!(checks[1].exists);
        assert!(!checks[1].digest_matches);
    }

    #[test]
    fn extract_file_missing_input() {
        let tmp = TempDir::new().unwrap();
        let result = extract_file(
            &tmp.path().join("absent.html"),
            &tmp.path().join("images"),
            &crate::config::SiteFixConfig::default(),
        );
        assert!(matches!(result, Err(ExtractError::SourceNotFound(_))));
    }

    #[test]
    fn extract_file_runs_and_verifies() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("page.html");
        fs::write(&input, img_tag("x", "png", &tiny_png())).unwrap();

        let run = extract_file(
            &input,
            &tmp.path().join("images"),
            &crate::config::SiteFixConfig::default(),
        )
        .unwrap();

        assert_eq!(run.report.extracted.len(), 1);
        assert!(run.all_verified());
    }
}
