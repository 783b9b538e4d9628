//! Shared test utilities for the sitefix test suite.
//!
//! Provides tiny but real image payloads, `data:` URI and `<img>` builders,
//! and a page fixture that trips every patch rule.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let html = img_tag("Logo", "png", &tiny_png());
//! let page = site_page(&html);
//! ```

use crate::naming::ImageName;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

// =========================================================================
// Image payloads
// =========================================================================

/// A valid 1x1 PNG.
pub fn tiny_png() -> Vec<u8> {
    STANDARD
        .decode("iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==")
        .unwrap()
}

/// A valid 1x1 GIF.
pub fn tiny_gif() -> Vec<u8> {
    STANDARD
        .decode("R0lGODlhAQABAIAAAAAAAP///yH5BAEAAAAALAAAAAABAAEAAAIBRAA7")
        .unwrap()
}

/// JPEG magic bytes followed by a marker byte, so each call can be told apart.
pub fn fake_jpeg(marker: u8) -> Vec<u8> {
    vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', marker]
}

// =========================================================================
// Markup builders
// =========================================================================

/// `data:image/<tag>;base64,<payload>`
pub fn data_uri(tag: &str, bytes: &[u8]) -> String {
    format!("data:image/{tag};base64,{}", STANDARD.encode(bytes))
}

/// `<img src="data:..." alt="<alt>">`, attribute order as the site writes it.
pub fn img_tag(alt: &str, tag: &str, bytes: &[u8]) -> String {
    format!("<img src=\"{}\" alt=\"{alt}\">", data_uri(tag, bytes))
}

/// The stock seven-entry name list.
pub fn seven_names() -> Vec<ImageName> {
    crate::config::SiteFixConfig::default().images
}

/// One `<img>` per name, in list order, carrying the matching payload.
pub fn page_with_images(names: &[ImageName], payloads: &[Vec<u8>]) -> String {
    names
        .iter()
        .zip(payloads)
        .map(|(name, bytes)| img_tag(&name.alt, "png", bytes))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A page that every patch rule has an anchor in: social meta tags without
/// images, no favicon, the old `setLang` script, the `#` logo link, and a
/// LocalBusiness schema without `sameAs`.
pub fn site_page(body: &str) -> String {
    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta property="og:site_name" content="New Bayit">
<meta name="twitter:card" content="summary_large_image">
<script type="application/ld+json">{{"@context":"https://schema.org","@type":"LocalBusiness","name":"New Bayit","knowsLanguage":["en","es","he"]}}</script>
</head>
<body>
<nav><a href="#" class="nav-logo">Home</a></nav>
{body}
<script>function setLang(btn){{if(btn.textContent.trim()==='ES'){{window.location.href='https://www.newbayit.com/es';}}}}</script>
</body>
</html>
"##
    )
}
