//! In-place HTML patching by textual substitution.
//!
//! Applies a fixed, ordered list of rules to the full text of each document
//! and writes the result back over the original. There is no parse tree:
//! every anchor is a first-occurrence substring search, and every presence
//! check is a plain `contains`. A marker inside a comment or a script string
//! counts the same as one in real markup.
//!
//! ## Rules
//!
//! | # | Rule | Guard | Edit |
//! |---|---|---|---|
//! | 1 | [`Rule::ImageTags`] | inline `src` with a known alt | `src` → `image_base + file` (+ `loading="lazy"`) |
//! | 2 | [`Rule::BackgroundFallback`] | CSS `url(data:image/...)` | → `url(<fallback>)`, same quotes |
//! | 3 | [`Rule::ScriptText`] | exact script text | swapped wholesale |
//! | 4 | [`Rule::NavLink`] | exact anchor text | swapped |
//! | 5 | [`Rule::OgImage`] | no `og:image` anywhere | tag after `og:site_name` |
//! | 5 | [`Rule::TwitterImage`] | no `twitter:image` anywhere | tag after `twitter:card` |
//! | 6 | [`Rule::Favicon`] | no `rel="icon"` anywhere | two links before `</head>` |
//! | 7 | [`Rule::StructuredData`] | no `sameAs`, LocalBusiness present | `sameAs` after `knowsLanguage`'s `]` |
//!
//! Every rule reports a [`RuleOutcome`], so a run says which rules fired and
//! why the others did not.
//!
//! ## Idempotence
//!
//! Each insertion is guarded by the absence of what it inserts, and each
//! replacement removes its own match, so patching a patched document is a
//! no-op. The script swap relies on its replacement text not containing the
//! text it replaces.

use crate::config::{PatchConfig, SiteFixConfig};
use maud::html;
use regex::{Captures, Regex};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid rule pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Document not found: {0}")]
    DocumentNotFound(PathBuf),
}

static INLINE_BACKGROUND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\((['"]?)data:image/[^)'"]+['"]?\)"#).expect("background regex is valid")
});

const OG_IMAGE_MARKER: &str = "og:image";
const OG_ANCHOR: &str = r#"<meta property="og:site_name""#;
const TWITTER_IMAGE_MARKER: &str = "twitter:image";
const TWITTER_ANCHOR: &str = r#"<meta name="twitter:card""#;
const FAVICON_MARKER: &str = r#"rel="icon""#;
const HEAD_CLOSE: &str = "</head>";
const SAME_AS_MARKER: &str = "sameAs";
const LOCAL_BUSINESS_MARKER: &str = r#"@type":"LocalBusiness""#;
const KNOWS_LANGUAGE_ANCHOR: &str = r#""knowsLanguage""#;

/// The patch rules, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    ImageTags,
    BackgroundFallback,
    ScriptText,
    NavLink,
    OgImage,
    TwitterImage,
    Favicon,
    StructuredData,
}

impl Rule {
    pub fn label(self) -> &'static str {
        match self {
            Rule::ImageTags => "image tags",
            Rule::BackgroundFallback => "background fallback",
            Rule::ScriptText => "script text",
            Rule::NavLink => "nav link",
            Rule::OgImage => "og:image",
            Rule::TwitterImage => "twitter:image",
            Rule::Favicon => "favicon",
            Rule::StructuredData => "structured data",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What a rule did to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "count", rename_all = "snake_case")]
pub enum RuleOutcome {
    /// The edit was made this many times.
    Applied(usize),
    /// The guard found what the rule would insert.
    AlreadyPresent,
    /// The anchor the insertion hangs off is not in the document.
    AnchorMissing,
    /// Nothing matched the rule's pattern.
    NoMatch,
    /// The rule's configured value is empty.
    Disabled,
}

impl RuleOutcome {
    pub fn applied(self) -> bool {
        matches!(self, RuleOutcome::Applied(_))
    }

    fn from_count(count: usize) -> Self {
        if count == 0 {
            RuleOutcome::NoMatch
        } else {
            RuleOutcome::Applied(count)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RuleResult {
    pub rule: Rule,
    pub outcome: RuleOutcome,
}

/// A patched document and what each rule did to it.
#[derive(Debug, Clone)]
pub struct Patched {
    pub html: String,
    pub results: Vec<RuleResult>,
}

impl Patched {
    pub fn outcome(&self, rule: Rule) -> Option<RuleOutcome> {
        self.results
            .iter()
            .find(|r| r.rule == rule)
            .map(|r| r.outcome)
    }
}

/// One `<img>` rewrite: pattern plus literal replacement.
struct ImageRewrite {
    /// Group 1 is the ` alt="..."` attribute exactly as the document has it.
    pattern: Regex,
    /// Rendered `<img src="...">` without its closing `>`.
    open: String,
    lazy: &'static str,
}

/// Compiled patch rules for one configuration.
///
/// Building it validates every pattern and renders every inserted snippet
/// once, so [`Patcher::apply`] cannot fail.
pub struct Patcher<'c> {
    config: &'c PatchConfig,
    image_rewrites: Vec<ImageRewrite>,
    background: String,
    og_image_tag: String,
    twitter_image_tag: String,
    favicon_tags: String,
    same_as: String,
}

impl<'c> Patcher<'c> {
    pub fn new(config: &'c SiteFixConfig) -> Result<Self, PatchError> {
        let patch = &config.patch;

        let image_rewrites = config
            .images
            .iter()
            .map(|name| -> Result<ImageRewrite, PatchError> {
                // Alt text is matched as written in the document, entities included
                let pattern = Regex::new(&format!(
                    r#"<img src="data:image/[^"]+?"( alt="{}")"#,
                    regex::escape(&name.alt)
                ))?;
                let tag = html! { img src={ (patch.image_base) (name.file) }; }.into_string();
                Ok(ImageRewrite {
                    pattern,
                    open: tag.trim_end_matches('>').to_string(),
                    lazy: if name.lazy { r#" loading="lazy""# } else { "" },
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let og_image_tag = format!(
            "\n{}",
            html! { meta property="og:image" content=(patch.meta.og_image); }.into_string()
        );
        let twitter_image_tag = format!(
            "\n{}",
            html! { meta name="twitter:image" content=(patch.meta.twitter_image); }.into_string()
        );
        let favicon_tags = html! {
            link rel="icon" type=(patch.favicon.mime) href=(patch.favicon.href);
            "\n"
            link rel="apple-touch-icon" href=(patch.favicon.href);
            "\n"
        }
        .into_string();

        Ok(Self {
            config: patch,
            image_rewrites,
            // `$1` is the quote style of the url() being replaced
            background: format!(
                "url(${{1}}{}${{1}})",
                patch.background_fallback.replace('$', "$$")
            ),
            og_image_tag,
            twitter_image_tag,
            favicon_tags,
            same_as: render_same_as(&patch.schema.same_as)?,
        })
    }

    /// Run every rule over `html`, in order.
    pub fn apply(&self, html: &str) -> Patched {
        let mut html = html.to_string();
        let mut results = Vec::with_capacity(8);
        let mut record = |rule, outcome| results.push(RuleResult { rule, outcome });

        record(Rule::ImageTags, self.rewrite_image_tags(&mut html));
        record(Rule::BackgroundFallback, self.rewrite_backgrounds(&mut html));
        record(
            Rule::ScriptText,
            replace_literal(&mut html, &self.config.script.find, &self.config.script.replace),
        );
        record(
            Rule::NavLink,
            replace_literal(
                &mut html,
                &self.config.nav_link.find,
                &self.config.nav_link.replace,
            ),
        );
        let meta = &self.config.meta;
        record(
            Rule::OgImage,
            insert_after_tag(
                &mut html,
                &meta.og_image,
                OG_IMAGE_MARKER,
                OG_ANCHOR,
                &self.og_image_tag,
            ),
        );
        record(
            Rule::TwitterImage,
            insert_after_tag(
                &mut html,
                &meta.twitter_image,
                TWITTER_IMAGE_MARKER,
                TWITTER_ANCHOR,
                &self.twitter_image_tag,
            ),
        );
        record(Rule::Favicon, self.insert_favicon(&mut html));
        record(Rule::StructuredData, self.insert_same_as(&mut html));

        Patched { html, results }
    }

    fn rewrite_image_tags(&self, html: &mut String) -> RuleOutcome {
        let mut count = 0;
        for rewrite in &self.image_rewrites {
            let hits = rewrite.pattern.find_iter(html).count();
            if hits > 0 {
                count += hits;
                let replaced = rewrite
                    .pattern
                    .replace_all(html, |caps: &Captures| {
                        format!("{}{}{}", rewrite.open, &caps[1], rewrite.lazy)
                    })
                    .into_owned();
                *html = replaced;
            }
        }
        RuleOutcome::from_count(count)
    }

    fn rewrite_backgrounds(&self, html: &mut String) -> RuleOutcome {
        if self.config.background_fallback.is_empty() {
            return RuleOutcome::Disabled;
        }
        let count = INLINE_BACKGROUND.find_iter(html).count();
        if count > 0 {
            let replaced = INLINE_BACKGROUND
                .replace_all(html, self.background.as_str())
                .into_owned();
            *html = replaced;
        }
        RuleOutcome::from_count(count)
    }

    fn insert_favicon(&self, html: &mut String) -> RuleOutcome {
        if self.config.favicon.href.is_empty() {
            return RuleOutcome::Disabled;
        }
        if html.contains(FAVICON_MARKER) {
            return RuleOutcome::AlreadyPresent;
        }
        let Some(at) = html.find(HEAD_CLOSE) else {
            return RuleOutcome::AnchorMissing;
        };
        html.insert_str(at, &self.favicon_tags);
        RuleOutcome::Applied(1)
    }

    fn insert_same_as(&self, html: &mut String) -> RuleOutcome {
        if self.config.schema.same_as.is_empty() {
            return RuleOutcome::Disabled;
        }
        if html.contains(SAME_AS_MARKER) {
            return RuleOutcome::AlreadyPresent;
        }
        if !html.contains(LOCAL_BUSINESS_MARKER) {
            return RuleOutcome::AnchorMissing;
        }
        let Some(start) = html.find(KNOWS_LANGUAGE_ANCHOR) else {
            return RuleOutcome::AnchorMissing;
        };
        let Some(bracket) = html[start..].find(']') else {
            return RuleOutcome::AnchorMissing;
        };
        html.insert_str(start + bracket + 1, &self.same_as);
        RuleOutcome::Applied(1)
    }
}

/// Insert `tag` right after the tag that opens with `anchor`, unless `marker`
/// already appears anywhere in the document.
fn insert_after_tag(
    html: &mut String,
    value: &str,
    marker: &str,
    anchor: &str,
    tag: &str,
) -> RuleOutcome {
    if value.is_empty() {
        return RuleOutcome::Disabled;
    }
    if html.contains(marker) {
        return RuleOutcome::AlreadyPresent;
    }
    let Some(start) = html.find(anchor) else {
        return RuleOutcome::AnchorMissing;
    };
    let Some(close) = html[start..].find('>') else {
        return RuleOutcome::AnchorMissing;
    };
    html.insert_str(start + close + 1, tag);
    RuleOutcome::Applied(1)
}

/// Swap every exact occurrence of `find` for `replace`.
fn replace_literal(html: &mut String, find: &str, replace: &str) -> RuleOutcome {
    if find.is_empty() {
        return RuleOutcome::Disabled;
    }
    let count = html.matches(find).count();
    if count > 0 {
        *html = html.replace(find, replace);
    }
    RuleOutcome::from_count(count)
}

/// The `,"sameAs": [...]` fragment, laid out to sit after a JSON array.
fn render_same_as(urls: &[String]) -> Result<String, serde_json::Error> {
    let items = urls
        .iter()
        .map(|url| serde_json::to_string(url).map(|quoted| format!("    {quoted}")))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!(",\n  \"sameAs\": [\n{}\n  ]", items.join(",\n")))
}

/// Size and rule outcomes for one document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub path: PathBuf,
    pub original_size: usize,
    pub new_size: usize,
    /// `false` for dry runs.
    pub written: bool,
    pub rules: Vec<RuleResult>,
}

impl DocumentReport {
    pub fn size_delta(&self) -> i64 {
        self.new_size as i64 - self.original_size as i64
    }

    pub fn applied_count(&self) -> usize {
        self.rules.iter().filter(|r| r.outcome.applied()).count()
    }
}

/// Patch one document. With `write` false nothing is written.
pub fn patch_file(
    path: &Path,
    patcher: &Patcher<'_>,
    write: bool,
) -> Result<DocumentReport, PatchError> {
    if !path.exists() {
        return Err(PatchError::DocumentNotFound(path.to_path_buf()));
    }
    let original = std::fs::read_to_string(path)?;
    let patched = patcher.apply(&original);
    if write {
        std::fs::write(path, &patched.html)?;
    }
    Ok(DocumentReport {
        path: path.to_path_buf(),
        original_size: original.len(),
        new_size: patched.html.len(),
        written: write,
        rules: patched.results,
    })
}

/// Patch each document (relative to `root`) in turn.
///
/// Stops at the first document that cannot be read or written; documents
/// already patched stay patched.
pub fn patch_documents(
    root: &Path,
    documents: &[String],
    config: &SiteFixConfig,
    write: bool,
) -> Result<Vec<DocumentReport>, PatchError> {
    let patcher = Patcher::new(config)?;
    documents
        .iter()
        .map(|doc| patch_file(&root.join(doc), &patcher, write))
        .collect()
}
