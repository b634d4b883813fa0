use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// A line color in `#rrggbb` form. Can only be constructed from a valid hex string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color {0:?}, expected #rrggbb or #rgb")]
pub struct InvalidColor(pub String);

impl Color {
    pub fn black() -> Self {
        Self("#000000".into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::black()
    }
}

impl FromStr for Color {
    type Err = InvalidColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let Some(digits) = trimmed.strip_prefix('#') else {
            return Err(InvalidColor(s.to_string()));
        };

        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(InvalidColor(s.to_string()));
        }

        let digits = digits.to_ascii_lowercase();
        match digits.len() {
            6 => Ok(Self(format!("#{digits}"))),
            // #abc is shorthand for #aabbcc
            3 => Ok(Self(digits.chars().fold(String::from("#"), |mut acc, c| {
                acc.push(c);
                acc.push(c);
                acc
            }))),
            _ => Err(InvalidColor(s.to_string())),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = InvalidColor;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(value: Color) -> Self {
        value.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
