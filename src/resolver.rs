//! Implicit tag resolution for YAML 1.1.
//!
//! Untagged plain scalars are typed by matching their text against an
//! ordered list of rules; the first rule that matches decides the tag.
//! Non-plain scalars are always strings.

use crate::timestamp;

pub const TAG_PREFIX: &str = "tag:yaml.org,2002:";

pub const NULL_TAG: &str = "tag:yaml.org,2002:null";
pub const BOOL_TAG: &str = "tag:yaml.org,2002:bool";
pub const INT_TAG: &str = "tag:yaml.org,2002:int";
pub const FLOAT_TAG: &str = "tag:yaml.org,2002:float";
pub const STR_TAG: &str = "tag:yaml.org,2002:str";
pub const BINARY_TAG: &str = "tag:yaml.org,2002:binary";
pub const TIMESTAMP_TAG: &str = "tag:yaml.org,2002:timestamp";
pub const MERGE_TAG: &str = "tag:yaml.org,2002:merge";
pub const VALUE_TAG: &str = "tag:yaml.org,2002:value";
pub const SEQ_TAG: &str = "tag:yaml.org,2002:seq";
pub const MAP_TAG: &str = "tag:yaml.org,2002:map";
pub const SET_TAG: &str = "tag:yaml.org,2002:set";
pub const OMAP_TAG: &str = "tag:yaml.org,2002:omap";
pub const PAIRS_TAG: &str = "tag:yaml.org,2002:pairs";

pub const DEFAULT_SCALAR_TAG: &str = STR_TAG;
pub const DEFAULT_SEQUENCE_TAG: &str = SEQ_TAG;
pub const DEFAULT_MAPPING_TAG: &str = MAP_TAG;

/// One implicit typing rule. `first` lists the characters a matching
/// value can start with, so most rules are skipped without looking at the
/// whole value.
struct ImplicitRule {
    tag: &'static str,
    first: &'static str,
    matches: fn(&str) -> bool,
}

const IMPLICIT_RULES: &[ImplicitRule] = &[
    ImplicitRule {
        tag: BOOL_TAG,
        first: "yYnNtTfFoO",
        matches: is_bool,
    },
    ImplicitRule {
        tag: FLOAT_TAG,
        first: "-+0123456789.",
        matches: is_float,
    },
    ImplicitRule {
        tag: INT_TAG,
        first: "-+0123456789",
        matches: is_int,
    },
    ImplicitRule {
        tag: MERGE_TAG,
        first: "<",
        matches: |value| value == "<<",
    },
    ImplicitRule {
        tag: NULL_TAG,
        first: "~nN",
        matches: is_null,
    },
    ImplicitRule {
        tag: TIMESTAMP_TAG,
        first: "0123456789",
        matches: timestamp::matches,
    },
    ImplicitRule {
        tag: VALUE_TAG,
        first: "=",
        matches: |value| value == "=",
    },
];

/// The tag an untagged scalar resolves to. `plain` is true when the scalar
/// was written (or is to be written) in plain style.
pub fn resolve_scalar(value: &str, plain: bool) -> &'static str {
    if !plain {
        return DEFAULT_SCALAR_TAG;
    }
    let Some(first) = value.chars().next() else {
        return NULL_TAG;
    };
    IMPLICIT_RULES
        .iter()
        .find(|rule| rule.first.contains(first) && (rule.matches)(value))
        .map_or(DEFAULT_SCALAR_TAG, |rule| rule.tag)
}

/// Shorten a `tag:yaml.org,2002:` tag to its `!!` form, for messages.
pub fn short_tag(tag: &str) -> std::borrow::Cow<'_, str> {
    match tag.strip_prefix(TAG_PREFIX) {
        Some(suffix) => format!("!!{suffix}").into(),
        None => tag.into(),
    }
}

pub(crate) fn is_bool(value: &str) -> bool {
    matches!(
        value,
        "yes"
            | "Yes"
            | "YES"
            | "no"
            | "No"
            | "NO"
            | "true"
            | "True"
            | "TRUE"
            | "false"
            | "False"
            | "FALSE"
            | "on"
            | "On"
            | "ON"
            | "off"
            | "Off"
            | "OFF"
    )
}

pub(crate) fn is_null(value: &str) -> bool {
    matches!(value, "" | "~" | "null" | "Null" | "NULL")
}

#[inline]
fn strip_sign(value: &str) -> &str {
    value
        .strip_prefix(['-', '+'])
        .unwrap_or(value)
}

/// Non-empty, and every character satisfies `pred`.
#[inline]
fn all_of(s: &str, pred: impl Fn(char) -> bool) -> bool {
    !s.is_empty() && s.chars().all(pred)
}

#[inline]
fn is_digit_or_underscore(c: char) -> bool {
    c.is_ascii_digit() || c == '_'
}

/// `[0-5]?[0-9]`
fn is_sexagesimal_digit(part: &str) -> bool {
    match part.as_bytes() {
        [a] => a.is_ascii_digit(),
        [a, b] => (b'0'..=b'5').contains(a) && b.is_ascii_digit(),
        _ => false,
    }
}

/// `[0-9][0-9_]*`
fn is_digits_leading(s: &str) -> bool {
    s.starts_with(|c: char| c.is_ascii_digit()) && s.chars().all(is_digit_or_underscore)
}

/// `[eE][-+][0-9]+`
fn is_exponent(s: &str) -> bool {
    let Some(rest) = s.strip_prefix(['e', 'E']) else {
        return false;
    };
    let Some(digits) = rest.strip_prefix(['-', '+']) else {
        return false;
    };
    all_of(digits, |c| c.is_ascii_digit())
}

/// `[0-9_]*([eE][-+][0-9]+)?`
fn is_fraction(s: &str, allow_exponent: bool) -> bool {
    match s.find(['e', 'E']) {
        Some(pos) => {
            allow_exponent
                && s[..pos].chars().all(is_digit_or_underscore)
                && is_exponent(&s[pos..])
        }
        None => s.chars().all(is_digit_or_underscore),
    }
}

pub(crate) fn is_int(value: &str) -> bool {
    let digits = strip_sign(value);

    if let Some(binary) = digits.strip_prefix("0b") {
        return all_of(binary, |c| matches!(c, '0' | '1' | '_'));
    }
    if let Some(hex) = digits.strip_prefix("0x") {
        return all_of(hex, |c| c.is_ascii_hexdigit() || c == '_');
    }
    if let Some(octal) = digits.strip_prefix("0o") {
        return all_of(octal, |c| matches!(c, '0'..='7' | '_'));
    }
    if digits == "0" {
        return true;
    }
    if let Some(octal) = digits.strip_prefix('0') {
        return all_of(octal, |c| matches!(c, '0'..='7' | '_'));
    }

    let mut parts = digits.split(':');
    let Some(head) = parts.next() else {
        return false;
    };
    head.starts_with(|c: char| matches!(c, '1'..='9'))
        && head.chars().all(is_digit_or_underscore)
        && parts.all(is_sexagesimal_digit)
}

pub(crate) fn is_float(value: &str) -> bool {
    if matches!(
        value,
        ".inf"
            | ".Inf"
            | ".INF"
            | "+.inf"
            | "+.Inf"
            | "+.INF"
            | "-.inf"
            | "-.Inf"
            | "-.INF"
            | ".nan"
            | ".NaN"
            | ".NAN"
    ) {
        return true;
    }

    // `.5`, without a sign.
    if let Some(fraction) = value.strip_prefix('.') {
        return fraction.starts_with(|c: char| c.is_ascii_digit()) && is_fraction(fraction, true);
    }

    let Some((whole, fraction)) = strip_sign(value).split_once('.') else {
        return false;
    };
    let mut parts = whole.split(':');
    let Some(head) = parts.next() else {
        return false;
    };
    if !is_digits_leading(head) {
        return false;
    }
    let mut sexagesimal = false;
    for part in parts {
        if !is_sexagesimal_digit(part) {
            return false;
        }
        sexagesimal = true;
    }
    is_fraction(fraction, !sexagesimal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn assert_resolves(values: &[&str], tag: &str) {
        for value in values {
            assert_eq!(resolve_scalar(value, true), tag, "resolving {value:?}");
        }
    }

    #[test]
    fn null() {
        assert_resolves(&["", "~", "null", "Null", "NULL"], NULL_TAG);
        assert_resolves(&["nULL", "nil", "None"], STR_TAG);
    }

    #[test]
    fn bool() {
        assert_resolves(
            &["yes", "No", "TRUE", "false", "on", "OFF", "Off"],
            BOOL_TAG,
        );
        assert_resolves(&["y", "n", "tRUE", "yES"], STR_TAG);
    }

    #[test]
    fn int() {
        assert_resolves(
            &[
                "0", "-0", "+12", "1_000", "0b1010", "-0b1_0", "017", "0o17", "0x1F", "0xdead_beef",
                "190:20:30", "-1:30",
            ],
            INT_TAG,
        );
        assert_resolves(&["08", "0x", "0b", "1:60", "0b12", "1__a", "+"], STR_TAG);
    }

    #[test]
    fn float() {
        assert_resolves(
            &[
                "1.0", "-1.5", "+.inf", "-.Inf", ".NaN", "1.", "6.8523015e+5", "685.230_15e+03",
                ".5", ".5e-3", "190:20:30.15", "1_000.000_1",
            ],
            FLOAT_TAG,
        );
        assert_resolves(
            &["1e3", "1.0e3", "-.5", "-.nan", "1.2.3", "190:20:30.15e+1", "._"],
            STR_TAG,
        );
    }

    #[test]
    fn timestamp() {
        assert_resolves(
            &["2001-12-14", "2001-12-14t21:59:43.10-05:00", "2001-12-14 21:59:43.10 -5"],
            TIMESTAMP_TAG,
        );
    }

    #[test]
    fn special() {
        assert_resolves(&["<<"], MERGE_TAG);
        assert_resolves(&["="], VALUE_TAG);
        assert_resolves(&["<", "=="], STR_TAG);
    }

    #[test]
    fn non_plain_is_string() {
        for value in ["", "123", "true", "~", "1.5"] {
            assert_eq!(resolve_scalar(value, false), STR_TAG);
        }
    }

    #[test]
    fn short() {
        assert_eq!(short_tag(INT_TAG), "!!int");
        assert_eq!(short_tag("!custom"), "!custom");
    }
}
