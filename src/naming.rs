//! Assigning output filenames to embedded images.
//!
//! The page embeds its images without any filename, so every extracted image
//! gets its name from the configured `[[images]]` list. Two strategies exist:
//!
//! - **Order** (default): the Nth embedded image found in the document gets
//!   the Nth name. This assumes the list was written in document order; if
//!   the page is rearranged the names silently stop describing their images.
//! - **Alt**: the image gets the entry whose `alt` equals the `alt` attribute
//!   of the `<img>` tag carrying it. Order no longer matters, but images
//!   outside an `<img>` tag (CSS backgrounds) cannot be named.
//!
//! The same list drives the patcher's image-tag rule, which is why each entry
//! carries both the filename and the alt text.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One entry of the `[[images]]` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageName {
    /// Output filename, e.g. `logo.jpg`.
    pub file: String,
    /// `alt` attribute of the `<img>` tag that shows this image, written as
    /// it appears in the page source (entities such as `&amp;` included).
    pub alt: String,
    /// Add `loading="lazy"` when the patcher rewrites the tag.
    #[serde(default = "default_lazy")]
    pub lazy: bool,
}

fn default_lazy() -> bool {
    true
}

impl ImageName {
    pub fn new(file: &str, alt: &str, lazy: bool) -> Self {
        Self {
            file: file.to_string(),
            alt: alt.to_string(),
            lazy,
        }
    }
}

/// How embedded images are matched to names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Assignment {
    #[default]
    Order,
    Alt,
}

/// Result of asking the assigner for a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assigned<'a> {
    Name(&'a ImageName),
    /// Order mode ran past the end of the list. Nothing further gets a name.
    Exhausted,
    /// Alt mode found no unused entry for this alt text.
    Unmatched,
}

/// Hands out names from the list according to an [`Assignment`].
pub struct NameAssigner<'a> {
    names: &'a [ImageName],
    mode: Assignment,
    /// Entries already handed out in alt mode.
    used: HashSet<usize>,
}

impl<'a> NameAssigner<'a> {
    pub fn new(names: &'a [ImageName], mode: Assignment) -> Self {
        Self {
            names,
            mode,
            used: HashSet::new(),
        }
    }

    /// Number of names available.
    pub fn capacity(&self) -> usize {
        self.names.len()
    }

    /// Name for the embedded image at `position` (0-based scan order) whose
    /// enclosing tag has alt text `alt`.
    pub fn assign(&mut self, position: usize, alt: Option<&str>) -> Assigned<'a> {
        match self.mode {
            Assignment::Order => match self.names.get(position) {
                Some(name) => Assigned::Name(name),
                None => Assigned::Exhausted,
            },
            Assignment::Alt => {
                let Some(alt) = alt else {
                    return Assigned::Unmatched;
                };
                let found = self
                    .names
                    .iter()
                    .enumerate()
                    .find(|(i, n)| n.alt == alt && !self.used.contains(i));
                match found {
                    Some((i, name)) => {
                        self.used.insert(i);
                        Assigned::Name(name)
                    }
                    None => Assigned::Unmatched,
                }
            }
        }
    }
}
