//! Fixed scope value table.
//!
//! Scope names are symbolic. The legacy backend persists a scope as the
//! bitwise OR of the values below; the modern backend persists the names
//! joined by spaces.

use std::fmt;

/// Symbolic scope names and their legacy integer values, in canonical order.
pub const SCOPE_VALUES: &[(&str, i32)] = &[
    ("openid", 1),
    ("profile", 2),
    ("email", 4),
    ("course_staff", 8),
    ("course_instructor", 16),
    ("permissions", 32),
];

/// Look up the legacy value for a scope name.
pub fn value_for(name: &str) -> Option<i32> {
    SCOPE_VALUES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, v)| *v)
}

/// Resolve a name to its `'static` table entry.
fn canonical(name: &str) -> Option<&'static str> {
    SCOPE_VALUES.iter().find(|(n, _)| *n == name).map(|(n, _)| *n)
}

/// An ordered set of scope names drawn from [`SCOPE_VALUES`].
///
/// The empty scope is valid and is what an exchange without a `scope` field
/// resolves to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Scope {
    names: Vec<&'static str>,
}

impl Scope {
    /// The empty scope.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a scope from names. Returns the first name missing from the table.
    pub fn from_names<'a, I>(names: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut resolved = Vec::new();
        for name in names {
            let name = canonical(name).ok_or_else(|| name.to_string())?;
            if !resolved.contains(&name) {
                resolved.push(name);
            }
        }
        resolved.sort_by_key(|n| value_for(n).unwrap_or(i32::MAX));
        Ok(Self { names: resolved })
    }

    /// Parse the space-separated form stored by the modern backend.
    /// Unknown names are dropped.
    pub fn from_stored(raw: &str) -> Self {
        Self::from_names(raw.split_whitespace().filter(|n| canonical(n).is_some()))
            .unwrap_or_default()
    }

    /// Decode the legacy integer representation.
    pub fn from_bits(bits: i32) -> Self {
        let names = SCOPE_VALUES
            .iter()
            .filter(|(_, v)| bits & v != 0)
            .map(|(n, _)| *n)
            .collect();
        Self { names }
    }

    /// Encode as the legacy integer representation.
    pub fn to_bits(&self) -> i32 {
        self.names
            .iter()
            .filter_map(|n| value_for(n))
            .fold(0, |acc, v| acc | v)
    }

    pub fn names(&self) -> &[&'static str] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names.join(" "))
    }
}
