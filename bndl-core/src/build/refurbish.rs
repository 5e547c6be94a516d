//! Compiler flag filtering: strips optimization, debug and CPU tuning
//! switches so the build tools invoked later pick their own.

use std::sync::OnceLock;

use regex::Regex;

/// Flag variables rewritten by [`refurbish_flags`].
pub const FLAG_VARS: &[&str] = &[
    "CFLAGS",
    "CXXFLAGS",
    "OBJCFLAGS",
    "OBJCXXFLAGS",
    "CPPFLAGS",
    "LDFLAGS",
];

fn stripped_flag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(concat!(
            r"^(?:",
            r"-O\S*|-fast|-g\S*",
            r"|-march=.+|-mtune=.+|-mcpu=.+",
            r"|-pipe|-pedantic|-pedantic-errors|-no-cpp-precomp|-Werror",
            r"|-Wno-long-double|-Wno-unused-but-set-variable",
            // gcc-only switches clang rejects
            r"|-fopenmp|-lgomp|-mno-fused-madd|-fforce-addr|-fno-defer-pop",
            r"|-mno-dynamic-no-pic|-fearly-inlining|-f(?:no-)?inline-functions-called-once",
            r"|-finline-limit=\d+|-f(?:no-)?check-new|-fno-delete-null-pointer-checks",
            r"|-fcaller-saves|-fthread-jumps|-fgcse-after-reload|-freg-struct-return",
            r"|-fregmove|-frename-registers|-fcse-follow-jumps|-fcse-skip-blocks",
            r"|-fforce-mem|-fno-unit-at-a-time",
            r")$"
        ))
        .expect("refurbish pattern is a valid regex")
    })
}

pub fn is_stripped_flag(flag: &str) -> bool {
    stripped_flag_pattern().is_match(flag)
}

/// Removes stripped flags from a whitespace separated flag string.
pub fn refurbish_flags(value: &str) -> String {
    value
        .split_whitespace()
        .filter(|flag| !is_stripped_flag(flag))
        .collect::<Vec<_>>()
        .join(" ")
}
