use crate::{EmitterError, Encoding, ScalarStyle};

/// The line break written between lines of output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LineBreak {
    #[default]
    Lf,
    Cr,
    CrLf,
}

impl LineBreak {
    pub fn as_str(self) -> &'static str {
        match self {
            LineBreak::Lf => "\n",
            LineBreak::Cr => "\r",
            LineBreak::CrLf => "\r\n",
        }
    }
}

/// Options controlling how values are written.
///
/// The defaults produce block-style output with sorted keys, two-space
/// indentation and lines wrapped at 80 columns.
#[derive(Clone, Debug, PartialEq)]
pub struct DumpConfig {
    /// Force this style on every scalar. `None` picks the simplest style
    /// that reads back as the same value.
    pub default_style: Option<ScalarStyle>,
    /// `Some(true)` writes every collection in flow style, `Some(false)`
    /// in block style. `None` uses flow style only for collections of
    /// plain scalars.
    pub default_flow_style: Option<bool>,
    /// Explicit tags, double quotes and flow collections everywhere.
    pub canonical: bool,
    /// Spaces per indentation level, in `1..=9`.
    pub indent: usize,
    /// Preferred maximum line length. `None` never wraps.
    pub width: Option<usize>,
    /// Write non-ASCII printable characters as-is instead of escaping them.
    pub allow_unicode: bool,
    pub line_break: LineBreak,
    /// Output encoding used by [`dumps_encoded`](crate::dumps_encoded).
    pub encoding: Option<Encoding>,
    /// Start every document with `---`.
    pub explicit_start: bool,
    /// End every document with `...`.
    pub explicit_end: bool,
    /// Write a `%YAML` directive with this version.
    pub version: Option<(u32, u32)>,
    /// `%TAG` directives, as `(handle, prefix)` pairs.
    pub tags: Vec<(String, String)>,
    /// Write mapping keys in sorted order.
    pub sort_keys: bool,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            default_style: None,
            default_flow_style: Some(false),
            canonical: false,
            indent: 2,
            width: Some(80),
            allow_unicode: false,
            line_break: LineBreak::Lf,
            encoding: None,
            explicit_start: false,
            explicit_end: false,
            version: None,
            tags: Vec::new(),
            sort_keys: true,
        }
    }
}

impl DumpConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_style(mut self, style: Option<ScalarStyle>) -> Self {
        self.default_style = style;
        self
    }

    pub fn with_default_flow_style(mut self, flow: Option<bool>) -> Self {
        self.default_flow_style = flow;
        self
    }

    pub fn with_canonical(mut self, canonical: bool) -> Self {
        self.canonical = canonical;
        self
    }

    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    pub fn with_width(mut self, width: Option<usize>) -> Self {
        self.width = width;
        self
    }

    pub fn with_allow_unicode(mut self, allow_unicode: bool) -> Self {
        self.allow_unicode = allow_unicode;
        self
    }

    pub fn with_line_break(mut self, line_break: LineBreak) -> Self {
        self.line_break = line_break;
        self
    }

    pub fn with_encoding(mut self, encoding: Option<Encoding>) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_explicit_start(mut self, explicit_start: bool) -> Self {
        self.explicit_start = explicit_start;
        self
    }

    pub fn with_explicit_end(mut self, explicit_end: bool) -> Self {
        self.explicit_end = explicit_end;
        self
    }

    pub fn with_version(mut self, version: Option<(u32, u32)>) -> Self {
        self.version = version;
        self
    }

    pub fn with_tag(mut self, handle: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.tags.push((handle.into(), prefix.into()));
        self
    }

    pub fn with_sort_keys(mut self, sort_keys: bool) -> Self {
        self.sort_keys = sort_keys;
        self
    }

    pub fn validate(&self) -> Result<(), EmitterError> {
        if !(1..=9).contains(&self.indent) {
            return Err(EmitterError::InvalidConfig(format!(
                "indent must be between 1 and 9, got {}",
                self.indent
            )));
        }
        if let Some(width) = self.width {
            if width <= self.indent {
                return Err(EmitterError::InvalidConfig(format!(
                    "width {width} must be greater than indent {}",
                    self.indent
                )));
            }
        }
        if let Some((major, minor)) = self.version {
            if major != 1 {
                return Err(EmitterError::UnsupportedVersion(major, minor));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = DumpConfig::default();
        assert_eq!(config.indent, 2);
        assert_eq!(config.width, Some(80));
        assert_eq!(config.default_flow_style, Some(false));
        assert!(config.sort_keys);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation() {
        assert!(matches!(
            DumpConfig::new().with_indent(0).validate(),
            Err(EmitterError::InvalidConfig(_))
        ));
        assert!(matches!(
            DumpConfig::new().with_indent(10).validate(),
            Err(EmitterError::InvalidConfig(_))
        ));
        assert!(matches!(
            DumpConfig::new().with_indent(4).with_width(Some(4)).validate(),
            Err(EmitterError::InvalidConfig(_))
        ));
        assert_eq!(
            DumpConfig::new().with_version(Some((2, 0))).validate(),
            Err(EmitterError::UnsupportedVersion(2, 0))
        );
        assert!(DumpConfig::new()
            .with_indent(9)
            .with_width(None)
            .with_version(Some((1, 1)))
            .validate()
            .is_ok());
    }
}
