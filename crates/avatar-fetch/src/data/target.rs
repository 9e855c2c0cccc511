use std::fmt;

/// Short text shown while no image is available.
///
/// Blank labels normalise to `"??"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FallbackLabel(String);

impl FallbackLabel {
    pub const PLACEHOLDER: &'static str = "??";

    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.trim().is_empty() {
            Self(Self::PLACEHOLDER.to_string())
        } else {
            Self(text)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for FallbackLabel {
    fn default() -> Self {
        Self(Self::PLACEHOLDER.to_string())
    }
}

impl fmt::Display for FallbackLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the display collaborator asked for: a URL and the label to show
/// until (unless) an image arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    url: String,
    fallback_label: FallbackLabel,
}

impl RequestTarget {
    pub fn new(url: impl Into<String>, fallback_label: FallbackLabel) -> Self {
        Self {
            url: url.into(),
            fallback_label,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn fallback_label(&self) -> &FallbackLabel {
        &self.fallback_label
    }
}
