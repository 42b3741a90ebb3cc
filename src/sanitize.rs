//! Cleaning and screening of model-written drawing code.
//!
//! The denylist is a fast reject, not a sandbox. Whoever runs the result
//! must still bind only `ctx`, `width` and `height` and nothing else.

use lazy_static::lazy_static;
use regex::{Regex, RegexSet};
use tracing::warn;

use crate::error::SanitizeError;
use crate::metrics::DENYLIST_HITS;

/// Shortest accepted drawing body, in characters.
pub const MIN_CODE_CHARS: usize = 50;

// (rule name, pattern); matched case-insensitively
const DENYLIST: &[(&str, &str)] = &[
    ("eval", r"\beval\s*\("),
    ("function-constructor", r"\bfunction\s*\("),
    ("set-timeout", r"\bsettimeout\b"),
    ("set-interval", r"\bsetinterval\b"),
    ("document", r"\bdocument\s*[.\[]"),
    ("window", r"\bwindow\s*[.\[]"),
    ("global-this", r"\bglobalthis\b"),
    ("process", r"\bprocess\s*[.\[]"),
    ("require", r"\brequire\s*\("),
    ("import", r"\bimport\b"),
    ("fetch", r"\bfetch\s*\("),
    ("xml-http-request", r"xmlhttprequest"),
    ("location", r"\blocation\s*[.\[=]"),
    ("history", r"\bhistory\s*[.\[]"),
];

lazy_static! {
    // ``` with an optional language tag that ends its line
    static ref FENCE: Regex = Regex::new(r"```(?:[\w+-]*[ \t]*\r?\n)?").unwrap();
    static ref CTX_CALL: Regex = Regex::new(r"\bctx\.[A-Za-z_$][\w$]*\(").unwrap();
    static ref UNSAFE: RegexSet =
        RegexSet::new(DENYLIST.iter().map(|(_, p)| format!("(?i){}", p))).unwrap();
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CodeSanitizer;

impl CodeSanitizer {
    pub fn new() -> Self {
        Self
    }

    /// Strip fences, check the code draws something, reject anything on the denylist.
    pub fn sanitize(&self, raw: &str) -> Result<String, SanitizeError> {
        let code = strip_fences(raw);

        if !CTX_CALL.is_match(&code) {
            return Err(SanitizeError::InvalidGeneratedCode("no ctx drawing call"));
        }
        if code.chars().count() < MIN_CODE_CHARS {
            return Err(SanitizeError::InvalidGeneratedCode("code too short"));
        }

        if let Some(rule) = first_unsafe_rule(&code) {
            DENYLIST_HITS.with_label_values(&[rule]).inc();
            warn!(rule, "generated code matched denylist");
            return Err(SanitizeError::UnsafeGeneratedCode(rule));
        }

        Ok(code)
    }
}

pub fn strip_fences(raw: &str) -> String {
    FENCE.replace_all(raw, "").trim().to_string()
}

fn first_unsafe_rule(code: &str) -> Option<&'static str> {
    UNSAFE
        .matches(code)
        .into_iter()
        .next()
        .map(|idx| DENYLIST[idx].0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAN: &str = "const g = ctx.createLinearGradient(0, 0, width, height);\n\
        g.addColorStop(0, '#fdf6e3');\n\
        g.addColorStop(1, '#eee8d5');\n\
        ctx.fillStyle = g;\n\
        ctx.fillRect(0, 0, width, height);";

    fn with_ctx(extra: &str) -> String {
        format!("ctx.fillStyle = '#123456';\nctx.fillRect(0, 0, width, height);\n{}", extra)
    }

    #[test]
    fn clean_code_is_returned_unchanged() {
        let out = CodeSanitizer::new().sanitize(CLEAN).unwrap();
        assert_eq!(out, CLEAN);
    }

    #[test]
    fn sanitize_is_idempotent() {
        let s = CodeSanitizer::new();
        let once = s.sanitize(&format!("  ```javascript\n{}\n```  \n", CLEAN)).unwrap();
        assert_eq!(s.sanitize(&once).unwrap(), once);
    }

    #[test]
    fn fenced_code_matches_unfenced() {
        let s = CodeSanitizer::new();
        let plain = s.sanitize(CLEAN).unwrap();
        for wrapped in [
            format!("```javascript\n{}\n```", CLEAN),
            format!("```js\n{}\n```", CLEAN),
            format!("```\n{}\n```", CLEAN),
            format!("\n\n```JavaScript \r\n{}\r\n```\n", CLEAN),
        ] {
            assert_eq!(s.sanitize(&wrapped).unwrap(), plain);
        }
    }

    #[test]
    fn fence_without_newline_keeps_following_code() {
        assert_eq!(strip_fences("```ctx.fillRect(0,0,1,1)```"), "ctx.fillRect(0,0,1,1)");
    }

    #[test]
    fn code_without_drawing_calls_is_invalid() {
        let s = CodeSanitizer::new();
        let no_calls = "const a = width * height; const b = a / 2; const c = b + a + 1234567;";
        assert_eq!(
            s.sanitize(no_calls),
            Err(SanitizeError::InvalidGeneratedCode("no ctx drawing call"))
        );
        // property access alone is not a call
        let assignment_only = "ctx.fillStyle = '#ffffff'; ctx.strokeStyle = '#000000'; ctx.lineWidth = 4;";
        assert!(matches!(
            s.sanitize(assignment_only),
            Err(SanitizeError::InvalidGeneratedCode(_))
        ));
    }

    #[test]
    fn short_code_is_invalid() {
        let s = CodeSanitizer::new();
        assert_eq!(
            s.sanitize("```js\nctx.fillRect(0,0,width,height);\n```"),
            Err(SanitizeError::InvalidGeneratedCode("code too short"))
        );
        assert!(matches!(s.sanitize(""), Err(SanitizeError::InvalidGeneratedCode(_))));
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let s = CodeSanitizer::new();
        // 23 ascii chars plus 24 two-byte chars: 47 chars, 71 bytes
        let code = format!("ctx.fillText('{}', 0, 0);", "é".repeat(24));
        assert!(code.chars().count() < MIN_CODE_CHARS);
        assert!(code.len() >= MIN_CODE_CHARS);
        assert_eq!(
            s.sanitize(&code),
            Err(SanitizeError::InvalidGeneratedCode("code too short"))
        );
    }

    #[test]
    fn denylisted_terms_are_unsafe_in_any_case() {
        let s = CodeSanitizer::new();
        let cases = [
            ("eval('1+1');", "eval"),
            ("EVAL ('x');", "eval"),
            ("new Function('return this')();", "function-constructor"),
            ("setTimeout(() => {}, 10);", "set-timeout"),
            ("SETINTERVAL(tick, 10);", "set-interval"),
            ("document.title = 'x';", "document"),
            ("Document . cookie;", "document"),
            ("window.location = 'evil';", "window"),
            ("globalThis.foo = 1;", "global-this"),
            ("process.exit(1);", "process"),
            ("require('fs');", "require"),
            ("import x from 'y';", "import"),
            ("fetch('https://evil.example');", "fetch"),
            ("new XMLHttpRequest();", "xml-http-request"),
            ("new xmlhttprequest();", "xml-http-request"),
            ("location.href = 'x';", "location"),
            ("location = 'x';", "location"),
            ("history.back();", "history"),
        ];

        for (snippet, rule) in cases {
            assert_eq!(
                s.sanitize(&with_ctx(snippet)),
                Err(SanitizeError::UnsafeGeneratedCode(rule)),
                "snippet {:?}",
                snippet
            );
        }
    }

    #[test]
    fn lookalike_identifiers_are_not_flagged() {
        let s = CodeSanitizer::new();
        let code = with_ctx(
            "const evaluation = 3; const documentWidth = width; const important = [1,2].map((x) => x * 2);",
        );
        assert_eq!(s.sanitize(&code).unwrap(), code);
    }
}
