//! Content identity: validation and variant derivation
//!
//! A content ID is 16 hex characters. The character at offset 7 tells which
//! variant of a title the ID names: `0` for the base title, `c` for add-on
//! content and `e` for a patch. Swapping that one character gives the sibling
//! ID of another variant of the same title. A derived ID says nothing about
//! whether that content exists remotely.

use crate::error::{Result, ShelfError};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const CONTENT_ID_LEN: usize = 16;
pub const VARIANT_OFFSET: usize = 7;

/// Variant of a title named by the discriminator character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variant {
    Base,
    AddOn,
    Patch,
}

impl Variant {
    pub const ALL: [Variant; 3] = [Variant::Base, Variant::AddOn, Variant::Patch];

    pub fn discriminator(self) -> char {
        match self {
            Variant::Base => '0',
            Variant::AddOn => 'c',
            Variant::Patch => 'e',
        }
    }

    pub fn from_discriminator(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            '0' => Some(Variant::Base),
            'c' => Some(Variant::AddOn),
            'e' => Some(Variant::Patch),
            _ => None,
        }
    }

    /// Label used for the download action of this variant
    pub fn download_label(self) -> &'static str {
        match self {
            Variant::Base => "Download Game",
            Variant::AddOn => "Download DLC",
            Variant::Patch => "Download Patch",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Base => write!(f, "base"),
            Variant::AddOn => write!(f, "add-on"),
            Variant::Patch => write!(f, "patch"),
        }
    }
}

/// True iff `id` is exactly 16 hexadecimal characters
pub fn is_valid(id: &str) -> bool {
    id.len() == CONTENT_ID_LEN && id.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Replace the discriminator of `id` with `discriminator`.
///
/// A malformed `id` comes back unchanged, so the result is still invalid.
pub fn with_variant(id: &str, discriminator: char) -> String {
    if !is_valid(id) {
        return id.to_string();
    }
    let mut derived = String::with_capacity(CONTENT_ID_LEN);
    for (i, c) in id.chars().enumerate() {
        derived.push(if i == VARIANT_OFFSET { discriminator } else { c });
    }
    derived
}

/// Strip dashes and surrounding whitespace from a typed-in ID
pub fn normalize_input(raw: &str) -> String {
    raw.trim().chars().filter(|c| *c != '-').collect()
}

/// Variants whose derived ID is well-formed for `id`
pub fn offerable_variants(id: &str) -> Vec<Variant> {
    Variant::ALL
        .into_iter()
        .filter(|v| is_valid(&with_variant(id, v.discriminator())))
        .collect()
}

/// A validated content ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentId(String);

impl ContentId {
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.len() != CONTENT_ID_LEN {
            return Err(ShelfError::InvalidContentId {
                id: raw.to_string(),
                reason: format!("expected {} characters, got {}", CONTENT_ID_LEN, raw.len()),
            });
        }
        if !is_valid(raw) {
            return Err(ShelfError::InvalidContentId {
                id: raw.to_string(),
                reason: "contains non-hex characters".to_string(),
            });
        }
        Ok(Self(raw.to_string()))
    }

    /// Parse user input, tolerating dashes and whitespace
    pub fn parse_input(raw: &str) -> Result<Self> {
        Self::parse(&normalize_input(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn discriminator(&self) -> char {
        self.0.as_bytes()[VARIANT_OFFSET] as char
    }

    /// `None` when the discriminator is a hex digit with no known variant
    pub fn variant(&self) -> Option<Variant> {
        Variant::from_discriminator(self.discriminator())
    }

    pub fn with_variant(&self, variant: Variant) -> ContentId {
        ContentId(with_variant(&self.0, variant.discriminator()))
    }

    pub fn offerable_variants(&self) -> Vec<Variant> {
        offerable_variants(&self.0)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentId {
    type Error = ShelfError;

    fn try_from(value: String) -> Result<Self> {
        ContentId::parse(&value)
    }
}

impl From<ContentId> for String {
    fn from(id: ContentId) -> Self {
        id.0
    }
}

impl std::str::FromStr for ContentId {
    type Err = ShelfError;

    fn from_str(s: &str) -> Result<Self> {
        ContentId::parse(s)
    }
}
