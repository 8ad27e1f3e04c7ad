use crate::CharExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScalarStyle {
    /// Unquoted text. Subject to implicit type resolution.
    Plain,
    /// Text in single quotes, where `''` stands for one quote.
    SingleQuoted,
    /// Text in double quotes, with backslash escapes.
    DoubleQuoted,
    /// A `|` block scalar. Line breaks are kept.
    Literal,
    /// A `>` block scalar. Single line breaks fold into spaces.
    Folded,
}

impl ScalarStyle {
    #[inline]
    pub fn is_block(self) -> bool {
        matches!(self, ScalarStyle::Literal | ScalarStyle::Folded)
    }

    pub fn indicator(self) -> &'static str {
        match self {
            ScalarStyle::Plain => "",
            ScalarStyle::SingleQuoted => "'",
            ScalarStyle::DoubleQuoted => "\"",
            ScalarStyle::Literal => "|",
            ScalarStyle::Folded => ">",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CollectionStyle {
    #[default]
    Block,
    Flow,
}

bitflags::bitflags! {
    /// What the emitter may do with a scalar's text.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ScalarFlags: u8 {
        const EMPTY = 0b0000_0001;
        const MULTILINE = 0b0000_0010;
        const ALLOW_FLOW_PLAIN = 0b0000_0100;
        const ALLOW_BLOCK_PLAIN = 0b0000_1000;
        const ALLOW_SINGLE_QUOTED = 0b0001_0000;
        const ALLOW_BLOCK = 0b0010_0000;
    }
}

/// The outcome of inspecting a scalar's text before choosing how to write
/// it. Double quoting is always possible and has no flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScalarAnalysis {
    pub flags: ScalarFlags,
}

impl ScalarAnalysis {
    pub fn analyze(value: &str, allow_unicode: bool) -> Self {
        if value.is_empty() {
            return Self {
                flags: ScalarFlags::EMPTY
                    | ScalarFlags::ALLOW_BLOCK_PLAIN
                    | ScalarFlags::ALLOW_SINGLE_QUOTED,
            };
        }

        let chars: Vec<char> = value.chars().collect();
        let len = chars.len();

        let mut block_indicators = false;
        let mut flow_indicators = false;
        let mut line_breaks = false;
        let mut special_characters = false;

        let mut leading_space = false;
        let mut leading_break = false;
        let mut trailing_space = false;
        let mut trailing_break = false;
        let mut break_space = false;
        let mut space_break = false;

        if value.starts_with("---") || value.starts_with("...") {
            block_indicators = true;
            flow_indicators = true;
        }

        let mut preceded_by_whitespace = true;
        let mut followed_by_whitespace = len == 1 || chars[1].is_blankz();
        let mut previous_space = false;
        let mut previous_break = false;

        for (index, &ch) in chars.iter().enumerate() {
            if index == 0 {
                if "#,[]{}&*!|>'\"%@`".contains(ch) {
                    flow_indicators = true;
                    block_indicators = true;
                }
                if ch == '?' || ch == ':' {
                    flow_indicators = true;
                    if followed_by_whitespace {
                        block_indicators = true;
                    }
                }
                if ch == '-' && followed_by_whitespace {
                    flow_indicators = true;
                    block_indicators = true;
                }
            } else {
                if ",?[]{}".contains(ch) {
                    flow_indicators = true;
                }
                if ch == ':' {
                    flow_indicators = true;
                    if followed_by_whitespace {
                        block_indicators = true;
                    }
                }
                if ch == '#' && preceded_by_whitespace {
                    flow_indicators = true;
                    block_indicators = true;
                }
            }

            let is_break = matches!(ch, '\n' | '\u{85}' | '\u{2028}' | '\u{2029}');
            if is_break {
                line_breaks = true;
            }
            if !(ch == '\n' || ('\x20'..='\x7e').contains(&ch)) {
                // NEL and characters outside the BMP are always escaped.
                let unicode = matches!(ch, '\u{a0}'..='\u{d7ff}' | '\u{e000}'..='\u{fffd}')
                    && ch != '\u{feff}';
                if !unicode || !allow_unicode {
                    special_characters = true;
                }
            }

            if ch == ' ' {
                if index == 0 {
                    leading_space = true;
                }
                if index == len - 1 {
                    trailing_space = true;
                }
                if previous_break {
                    break_space = true;
                }
                previous_space = true;
                previous_break = false;
            } else if is_break {
                if index == 0 {
                    leading_break = true;
                }
                if index == len - 1 {
                    trailing_break = true;
                }
                if previous_space {
                    space_break = true;
                }
                previous_space = false;
                previous_break = true;
            } else {
                previous_space = false;
                previous_break = false;
            }

            preceded_by_whitespace = ch.is_blankz();
            followed_by_whitespace = index + 2 >= len || chars[index + 2].is_blankz();
        }

        let mut flags = ScalarFlags::ALLOW_FLOW_PLAIN
            | ScalarFlags::ALLOW_BLOCK_PLAIN
            | ScalarFlags::ALLOW_SINGLE_QUOTED
            | ScalarFlags::ALLOW_BLOCK;
        let plain = ScalarFlags::ALLOW_FLOW_PLAIN | ScalarFlags::ALLOW_BLOCK_PLAIN;

        if leading_space || leading_break || trailing_space || trailing_break {
            flags.remove(plain);
        }
        if trailing_space {
            flags.remove(ScalarFlags::ALLOW_BLOCK);
        }
        // Spaces at the start of a line survive only in block scalars.
        if break_space {
            flags.remove(plain | ScalarFlags::ALLOW_SINGLE_QUOTED);
        }
        if space_break || special_characters {
            flags.remove(plain | ScalarFlags::ALLOW_SINGLE_QUOTED | ScalarFlags::ALLOW_BLOCK);
        }
        if line_breaks {
            flags.remove(plain);
            flags.insert(ScalarFlags::MULTILINE);
        }
        if flow_indicators {
            flags.remove(ScalarFlags::ALLOW_FLOW_PLAIN);
        }
        if block_indicators {
            flags.remove(ScalarFlags::ALLOW_BLOCK_PLAIN);
        }

        Self { flags }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.flags.contains(ScalarFlags::EMPTY)
    }

    #[inline]
    pub fn is_multiline(&self) -> bool {
        self.flags.contains(ScalarFlags::MULTILINE)
    }

    #[inline]
    pub fn allows(&self, flag: ScalarFlags) -> bool {
        self.flags.contains(flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn flags(value: &str) -> ScalarFlags {
        ScalarAnalysis::analyze(value, false).flags
    }

    #[test]
    fn simple_word() {
        assert!(flags("hello").contains(
            ScalarFlags::ALLOW_FLOW_PLAIN | ScalarFlags::ALLOW_BLOCK_PLAIN | ScalarFlags::ALLOW_BLOCK
        ));
    }

    #[test]
    fn indicators() {
        assert!(!flags("- a").contains(ScalarFlags::ALLOW_BLOCK_PLAIN));
        assert!(flags("a,b").contains(ScalarFlags::ALLOW_BLOCK_PLAIN));
        assert!(!flags("a,b").contains(ScalarFlags::ALLOW_FLOW_PLAIN));
        assert!(!flags("a: b").contains(ScalarFlags::ALLOW_BLOCK_PLAIN));
        assert!(flags("a:b").contains(ScalarFlags::ALLOW_BLOCK_PLAIN));
        assert!(!flags("a #b").contains(ScalarFlags::ALLOW_BLOCK_PLAIN));
        assert!(!flags("--- x").contains(ScalarFlags::ALLOW_BLOCK_PLAIN));
    }

    #[test]
    fn whitespace() {
        assert!(!flags(" a").contains(ScalarFlags::ALLOW_BLOCK_PLAIN));
        assert!(!flags("a ").contains(ScalarFlags::ALLOW_BLOCK));
        let multiline = flags("a\nb");
        assert!(multiline.contains(ScalarFlags::MULTILINE | ScalarFlags::ALLOW_BLOCK));
        assert!(!multiline.contains(ScalarFlags::ALLOW_BLOCK_PLAIN));
        assert!(!flags("a \nb").contains(ScalarFlags::ALLOW_SINGLE_QUOTED));
    }

    #[test]
    fn special_characters() {
        assert!(!flags("a\x07").contains(ScalarFlags::ALLOW_SINGLE_QUOTED));
        assert!(!flags("caf\u{e9}").contains(ScalarFlags::ALLOW_SINGLE_QUOTED));
        assert!(ScalarAnalysis::analyze("caf\u{e9}", true)
            .allows(ScalarFlags::ALLOW_BLOCK_PLAIN));
    }

    #[test]
    fn empty() {
        let analysis = ScalarAnalysis::analyze("", false);
        assert!(analysis.is_empty());
        assert!(!analysis.allows(ScalarFlags::ALLOW_FLOW_PLAIN));
    }
}
