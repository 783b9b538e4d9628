//! Tool configuration module.
//!
//! Handles loading, validating, and merging `sitefix.toml`. Stock defaults
//! reproduce the one site this tool was first written for; a `sitefix.toml`
//! in the working root overrides any subset of them.
//!
//! ## Configuration Options
//!
//! ```toml
//! # Ordered name list shared by the extractor and the image-tag rule.
//! [[images]]
//! file = "logo.jpg"
//! alt = "New Bayit Logo"
//! lazy = false
//!
//! [extract]
//! input = "newbayit_final (4).html"
//! output_dir = "images"
//! formats = ["png", "jpg", "jpeg", "gif", "webp"]
//! assign = "order"            # or "alt"
//!
//! [patch]
//! documents = ["index.html", "es/index.html"]
//! image_base = "/images/"
//! background_fallback = "/images/logo.jpg"
//!
//! [patch.script]
//! find = "..."
//! replace = "..."
//!
//! [patch.nav_link]
//! find = '<a href="#" class="nav-logo">'
//! replace = '<a href="/" class="nav-logo">'
//!
//! [patch.meta]
//! og_image = "https://www.newbayit.com/images/about-photo.png"
//! twitter_image = "https://www.newbayit.com/images/about-photo.png"
//!
//! [patch.favicon]
//! href = "/images/logo.jpg"
//! mime = "image/jpeg"
//!
//! [patch.schema]
//! same_as = ["https://www.facebook.com/newbayit"]
//! ```
//!
//! Tables merge key by key; arrays (including `[[images]]`) replace the stock
//! value wholesale. Unknown keys are rejected to catch typos early.

use crate::naming::{Assignment, ImageName};
use crate::types::ImageFormat;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the config file looked up in the working root.
pub const CONFIG_FILENAME: &str = "sitefix.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Full tool configuration loaded from `sitefix.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteFixConfig {
    /// Ordered name list for embedded images.
    pub images: Vec<ImageName>,
    /// Image extractor settings.
    pub extract: ExtractConfig,
    /// HTML patcher settings.
    pub patch: PatchConfig,
}

impl Default for SiteFixConfig {
    fn default() -> Self {
        Self {
            images: default_images(),
            extract: ExtractConfig::default(),
            patch: PatchConfig::default(),
        }
    }
}

fn default_images() -> Vec<ImageName> {
    vec![
        ImageName::new("logo.jpg", "New Bayit Logo", false),
        ImageName::new("journey-card.png", "Aliyah Planning", true),
        ImageName::new("about-photo.png", "Nicole Jarmusz", true),
        ImageName::new("roadmap-image.png", "90-Day Roadmap", true),
        ImageName::new("services-card.png", "Post-Arrival Support", true),
        ImageName::new("contact-photo.png", "Contact Nicole", true),
        ImageName::new("footer-logo.png", "New Bayit Brand", true),
    ]
}

impl SiteFixConfig {
    /// Validate config values before any file is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.images.is_empty() {
            return Err(ConfigError::Validation("images must not be empty".into()));
        }
        let mut seen = HashSet::new();
        for name in &self.images {
            if name.file.is_empty() {
                return Err(ConfigError::Validation(
                    "images.file must not be empty".into(),
                ));
            }
            if name.file.contains(['/', '\\']) || name.file == "." || name.file == ".." {
                return Err(ConfigError::Validation(format!(
                    "images.file '{}' must be a plain filename",
                    name.file
                )));
            }
            if name.alt.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "images.alt for '{}' must not be empty",
                    name.file
                )));
            }
            if !seen.insert(name.file.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "images.file '{}' is listed twice",
                    name.file
                )));
            }
        }
        if self.extract.formats.is_empty() {
            return Err(ConfigError::Validation(
                "extract.formats must not be empty".into(),
            ));
        }
        if self.patch.documents.is_empty() {
            return Err(ConfigError::Validation(
                "patch.documents must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Image extractor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractConfig {
    /// HTML document to scan, relative to the working root.
    pub input: String,
    /// Directory extracted images are written to, relative to the working root.
    pub output_dir: String,
    /// Format tags recognized after `data:image/`.
    pub formats: Vec<ImageFormat>,
    /// How embedded images are matched to `[[images]]` entries.
    pub assign: Assignment,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            input: "newbayit_final (4).html".to_string(),
            output_dir: "images".to_string(),
            formats: ImageFormat::ALL.to_vec(),
            assign: Assignment::Order,
        }
    }
}

/// HTML patcher settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PatchConfig {
    /// Documents rewritten in place, relative to the working root.
    pub documents: Vec<String>,
    /// URL prefix for rewritten `<img src>` values.
    pub image_base: String,
    /// Path every remaining inline CSS `url(data:...)` collapses to.
    pub background_fallback: String,
    /// Inline script fragment to swap.
    pub script: LiteralReplace,
    /// Navigation anchor to repair.
    pub nav_link: LiteralReplace,
    /// Social preview images.
    pub meta: MetaConfig,
    /// Icon links inserted before `</head>`.
    pub favicon: FaviconConfig,
    /// JSON-LD additions.
    pub schema: SchemaConfig,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            documents: vec!["index.html".to_string(), "es/index.html".to_string()],
            image_base: "/images/".to_string(),
            background_fallback: "/images/logo.jpg".to_string(),
            script: LiteralReplace {
                find: SET_LANG_FIND.to_string(),
                replace: SET_LANG_REPLACE.to_string(),
            },
            nav_link: LiteralReplace {
                find: r##"<a href="#" class="nav-logo">"##.to_string(),
                replace: r#"<a href="/" class="nav-logo">"#.to_string(),
            },
            meta: MetaConfig::default(),
            favicon: FaviconConfig::default(),
            schema: SchemaConfig::default(),
        }
    }
}

const SET_LANG_FIND: &str = "function setLang(btn){if(btn.textContent.trim()==='ES'){window.location.href='https://www.newbayit.com/es';}}";

const SET_LANG_REPLACE: &str = r#"function setLang(btn){
  const lang = btn.textContent.trim();
  if(lang === 'ES' || lang === '🇪🇸 ES'){
    window.location.href='https://www.newbayit.com/es';
  } else if(lang === 'EN' || lang === '🇺🇸 EN'){
    window.location.href='https://www.newbayit.com';
  }
}"#;

/// An exact, whitespace-sensitive text swap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LiteralReplace {
    pub find: String,
    pub replace: String,
}

/// Social preview image URLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetaConfig {
    /// `content` of the inserted `og:image` tag.
    pub og_image: String,
    /// `content` of the inserted `twitter:image` tag.
    pub twitter_image: String,
}

impl Default for MetaConfig {
    fn default() -> Self {
        let url = "https://www.newbayit.com/images/about-photo.png".to_string();
        Self {
            og_image: url.clone(),
            twitter_image: url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FaviconConfig {
    /// Icon URL used by both inserted links.
    pub href: String,
    /// `type` attribute of the `rel="icon"` link.
    pub mime: String,
}

impl Default for FaviconConfig {
    fn default() -> Self {
        Self {
            href: "/images/logo.jpg".to_string(),
            mime: "image/jpeg".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchemaConfig {
    /// Profile URLs for the inserted `sameAs` array.
    pub same_as: Vec<String>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            same_as: vec![
                "https://www.facebook.com/newbayit".to_string(),
                "https://www.instagram.com/newbayit".to_string(),
                "https://www.linkedin.com/company/newbayit".to_string(),
            ],
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteFixConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay (arrays included) replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
pub fn load_raw_config_file(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Load `sitefix.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the directory has no `sitefix.toml`.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    load_raw_config_file(&config_path).map(Some)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteFixConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteFixConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `sitefix.toml` in the given root, falling back to stock
/// defaults when the file is absent.
pub fn load_config(root: &Path) -> Result<SiteFixConfig, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(root)?)
}

/// Load config from an explicit file. A missing file is an error here.
pub fn load_config_file(path: &Path) -> Result<SiteFixConfig, ConfigError> {
    resolve_config(stock_defaults_value(), Some(load_raw_config_file(path)?))
}

/// Returns a fully-commented stock `sitefix.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# sitefix Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Paths are relative to the working root (--root, default ".").
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Image names
# ---------------------------------------------------------------------------
# Ordered list shared by the extractor and the patcher's image-tag rule.
# With extract.assign = "order" the Nth embedded image gets the Nth file.
# With extract.assign = "alt" an image gets the entry whose alt matches the
# alt attribute of its <img> tag. Alt values are compared with the page
# source as written, so an "&" in the page is "&amp;" here too.
# lazy = true adds loading="lazy" when the tag is rewritten (default true).
[[images]]
file = "logo.jpg"
alt = "New Bayit Logo"
lazy = false

[[images]]
file = "journey-card.png"
alt = "Aliyah Planning"
lazy = true

[[images]]
file = "about-photo.png"
alt = "Nicole Jarmusz"
lazy = true

[[images]]
file = "roadmap-image.png"
alt = "90-Day Roadmap"
lazy = true

[[images]]
file = "services-card.png"
alt = "Post-Arrival Support"
lazy = true

[[images]]
file = "contact-photo.png"
alt = "Contact Nicole"
lazy = true

[[images]]
file = "footer-logo.png"
alt = "New Bayit Brand"
lazy = true

# ---------------------------------------------------------------------------
# Extraction
# ---------------------------------------------------------------------------
[extract]
# Document holding the embedded images.
input = "newbayit_final (4).html"

# Where extracted files are written (created if missing).
output_dir = "images"

# Tags recognized in data:image/<tag>;base64, references.
formats = ["png", "jpg", "jpeg", "gif", "webp"]

# "order" or "alt".
assign = "order"

# ---------------------------------------------------------------------------
# Patching
# ---------------------------------------------------------------------------
[patch]
# Documents rewritten in place. No backup is kept.
documents = ["index.html", "es/index.html"]

# Prefix for rewritten <img src> values.
image_base = "/images/"

# Every remaining CSS url(data:image/...) is replaced with this one path.
background_fallback = "/images/logo.jpg"

# Exact text swap for the language switcher script.
[patch.script]
find = '''function setLang(btn){if(btn.textContent.trim()==='ES'){window.location.href='https://www.newbayit.com/es';}}'''
replace = '''function setLang(btn){
  const lang = btn.textContent.trim();
  if(lang === 'ES' || lang === '🇪🇸 ES'){
    window.location.href='https://www.newbayit.com/es';
  } else if(lang === 'EN' || lang === '🇺🇸 EN'){
    window.location.href='https://www.newbayit.com';
  }
}'''

# Exact text swap for the logo link.
[patch.nav_link]
find = '<a href="#" class="nav-logo">'
replace = '<a href="/" class="nav-logo">'

# Inserted only when no og:image / twitter:image exists yet.
[patch.meta]
og_image = "https://www.newbayit.com/images/about-photo.png"
twitter_image = "https://www.newbayit.com/images/about-photo.png"

# Inserted before </head> only when no rel="icon" link exists yet.
[patch.favicon]
href = "/images/logo.jpg"
mime = "image/jpeg"

# Added after the knowsLanguage array of a LocalBusiness schema that has no sameAs.
[patch.schema]
same_as = [
    "https://www.facebook.com/newbayit",
    "https://www.instagram.com/newbayit",
    "https://www.linkedin.com/company/newbayit",
]
"##
}
