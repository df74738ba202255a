//! Blessing names, patterns and credentials.
//!
//! A blessing name is a `/`-separated chain of components such as
//! `device/alice/phone`. Each trailing component names a principal the
//! previous one delegated to, so `device/alice/phone` is an extension of
//! `device/alice`.
//!
//! A [`BlessingPattern`] is what the device stores as its owner. It is
//! matched by the exact name and by every extension of it, unless it ends
//! in `/$`, in which case only the exact name matches.

use std::{fmt, str::FromStr};

use latch_proto::CredentialPayload;
use serde::{Deserialize, Serialize};

/// Separator between blessing components.
pub const CHAIN_SEPARATOR: char = '/';

/// Longest accepted component, in bytes.
pub const MAX_COMPONENT_LEN: usize = 64;

/// Longest accepted full name, in bytes.
pub const MAX_NAME_LEN: usize = 512;

/// Suffix marking a pattern as exact-match only.
const EXACT_SUFFIX: &str = "/$";

/// Why a string is not a valid blessing name or component.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    /// Nothing to parse.
    #[error("blessing name is empty")]
    Empty,

    /// Two separators in a row, or a leading/trailing separator.
    #[error("blessing name has an empty component")]
    EmptyComponent,

    /// Full name exceeds [`MAX_NAME_LEN`].
    #[error("blessing name too long: {len} bytes (max {max})")]
    TooLong {
        /// Actual length.
        len: usize,
        /// Limit.
        max: usize,
    },

    /// A component exceeds [`MAX_COMPONENT_LEN`].
    #[error("blessing component too long: {len} bytes (max {max})")]
    ComponentTooLong {
        /// Actual length.
        len: usize,
        /// Limit.
        max: usize,
    },

    /// A character reserved for chains or patterns.
    #[error("blessing name contains reserved character {ch:?}")]
    ReservedChar {
        /// The offending character.
        ch: char,
    },

    /// A multi-component name where a single component was required.
    #[error("expected a single blessing component, got {components}")]
    NotAComponent {
        /// Number of components found.
        components: usize,
    },
}

fn validate_component(component: &str) -> Result<(), NameError> {
    if component.is_empty() {
        return Err(NameError::EmptyComponent);
    }
    if component.len() > MAX_COMPONENT_LEN {
        return Err(NameError::ComponentTooLong { len: component.len(), max: MAX_COMPONENT_LEN });
    }
    if let Some(ch) =
        component.chars().find(|&c| matches!(c, ',' | '$') || c.is_whitespace() || c.is_control())
    {
        return Err(NameError::ReservedChar { ch });
    }
    Ok(())
}

/// A validated blessing name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlessingName(String);

impl BlessingName {
    /// Parse a full `/`-separated name.
    pub fn parse(name: impl Into<String>) -> Result<Self, NameError> {
        let name = name.into();
        if name.is_empty() {
            return Err(NameError::Empty);
        }
        if name.len() > MAX_NAME_LEN {
            return Err(NameError::TooLong { len: name.len(), max: MAX_NAME_LEN });
        }
        for component in name.split(CHAIN_SEPARATOR) {
            validate_component(component)?;
        }
        Ok(Self(name))
    }

    /// Parse a single component, as supplied by a claimant.
    pub fn component(component: impl Into<String>) -> Result<Self, NameError> {
        let name = Self::parse(component)?;
        match name.components().count() {
            1 => Ok(name),
            components => Err(NameError::NotAComponent { components }),
        }
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Components from root to leaf.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split(CHAIN_SEPARATOR)
    }

    /// Append `extension` (one or more components) to this name.
    pub fn extend(&self, extension: &Self) -> Result<Self, NameError> {
        let len = self.0.len() + 1 + extension.0.len();
        if len > MAX_NAME_LEN {
            return Err(NameError::TooLong { len, max: MAX_NAME_LEN });
        }
        Ok(Self(format!("{}{CHAIN_SEPARATOR}{}", self.0, extension.0)))
    }

    /// Whether this name equals `base` or was delegated from it.
    ///
    /// Component-wise: `device/alicex` is not an extension of `device/alice`.
    pub fn is_extension_of(&self, base: &Self) -> bool {
        match self.0.strip_prefix(base.as_str()) {
            Some("") => true,
            Some(rest) => rest.starts_with(CHAIN_SEPARATOR),
            None => false,
        }
    }
}

impl fmt::Display for BlessingName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BlessingName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for BlessingName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Pattern a presented blessing must satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlessingPattern {
    name: BlessingName,
    exact: bool,
}

impl BlessingPattern {
    /// Pattern matched by `name` and all of its extensions.
    pub fn delegable(name: BlessingName) -> Self {
        Self { name, exact: false }
    }

    /// Pattern matched by `name` only.
    pub fn exact(name: BlessingName) -> Self {
        Self { name, exact: true }
    }

    /// Parse `device/alice` or `device/alice/$`.
    pub fn parse(pattern: &str) -> Result<Self, NameError> {
        match pattern.strip_suffix(EXACT_SUFFIX) {
            Some(name) => Ok(Self::exact(BlessingName::parse(name)?)),
            None => Ok(Self::delegable(BlessingName::parse(pattern)?)),
        }
    }

    /// The blessing name at the root of the pattern.
    pub fn name(&self) -> &BlessingName {
        &self.name
    }

    /// Whether extensions are rejected.
    pub fn is_exact(&self) -> bool {
        self.exact
    }

    /// Whether `name` satisfies this pattern.
    pub fn matched_by(&self, name: &BlessingName) -> bool {
        if self.exact { name == &self.name } else { name.is_extension_of(&self.name) }
    }
}

impl fmt::Display for BlessingPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.exact { write!(f, "{}{EXACT_SUFFIX}", self.name) } else { write!(f, "{}", self.name) }
    }
}

impl FromStr for BlessingPattern {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for BlessingPattern {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<BlessingPattern> for String {
    fn from(pattern: BlessingPattern) -> Self {
        pattern.to_string()
    }
}

/// Blessing names presented by a caller on one call.
///
/// Supplied by the transport after its security handshake; never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerCredential {
    names: Vec<BlessingName>,
}

impl CallerCredential {
    /// Credential presenting the given names.
    pub fn new(names: Vec<BlessingName>) -> Self {
        Self { names }
    }

    /// Credential presenting no names at all.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Build from raw strings, dropping any that are not valid names.
    ///
    /// A malformed name can never satisfy a pattern, so dropping it does not
    /// change any authorization outcome.
    pub fn from_presented<I, S>(presented: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = presented
            .into_iter()
            .filter_map(|raw| match BlessingName::parse(raw) {
                Ok(name) => Some(name),
                Err(e) => {
                    tracing::debug!("ignoring malformed presented blessing: {}", e);
                    None
                },
            })
            .collect();
        Self { names }
    }

    /// Presented names.
    pub fn names(&self) -> &[BlessingName] {
        &self.names
    }
}

impl fmt::Display for CallerCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.names.is_empty() {
            return f.write_str("<anonymous>");
        }
        for (i, name) in self.names.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{name}")?;
        }
        Ok(())
    }
}

/// Credential minted for a successful claimant.
///
/// Only `pattern` is retained by the device.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedCredential {
    /// Full blessing, the device identity extended with the claimant name.
    pub blessing: BlessingName,
    /// Pattern the device authorizes from now on.
    pub pattern: BlessingPattern,
    /// Issuer public key; empty for identities that do not sign.
    pub issuer_key: Vec<u8>,
    /// Issuer signature over `blessing`; empty for identities that do not sign.
    pub signature: Vec<u8>,
}

impl IssuedCredential {
    /// Credential without a signature.
    pub fn unsigned(blessing: BlessingName) -> Self {
        let pattern = BlessingPattern::delegable(blessing.clone());
        Self { blessing, pattern, issuer_key: Vec::new(), signature: Vec::new() }
    }

    /// Wire representation.
    pub fn to_payload(&self) -> CredentialPayload {
        CredentialPayload {
            blessing: self.blessing.to_string(),
            pattern: self.pattern.to_string(),
            issuer_key: self.issuer_key.clone(),
            signature: self.signature.clone(),
        }
    }
}

impl fmt::Debug for IssuedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedCredential")
            .field("blessing", &self.blessing)
            .field("pattern", &self.pattern)
            .field("signature", &format!("<redacted {} bytes>", self.signature.len()))
            .finish_non_exhaustive()
    }
}
