//! Obfuscation indicator detection.
//!
//! A cheap substring scan over source text that names the wrapping
//! techniques it recognises and which codec to try for each.  It only looks;
//! nothing here decodes.

use serde::Serialize;

use crate::codec::CodecId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    BytesLiteral,
    Marshal,
    Base64,
    Zlib,
    Hyperion,
    PyObfuscate,
    ExecEval,
    Lambda,
    Hex,
    Unknown,
}

/// Scan order; also the order of [`detect`]'s result.
const ALL: [Indicator; 9] = [
    Indicator::BytesLiteral,
    Indicator::Marshal,
    Indicator::Base64,
    Indicator::Zlib,
    Indicator::Hyperion,
    Indicator::PyObfuscate,
    Indicator::ExecEval,
    Indicator::Lambda,
    Indicator::Hex,
];

impl Indicator {
    pub fn label(self) -> &'static str {
        match self {
            Indicator::BytesLiteral => "Bytes encoding",
            Indicator::Marshal      => "Marshal bytecode",
            Indicator::Base64       => "Base64 encoding",
            Indicator::Zlib         => "Zlib compression",
            Indicator::Hyperion     => "Hyperion obfuscation",
            Indicator::PyObfuscate  => "PyObfuscate detected",
            Indicator::ExecEval     => "Exec/Eval obfuscation",
            Indicator::Lambda       => "Lambda obfuscation",
            Indicator::Hex          => "Hex encoding",
            Indicator::Unknown      => "Unknown pattern, try auto-detection",
        }
    }

    /// Codec worth trying first, if one applies directly.  Exec/eval and
    /// lambda wrappers are better handled by `neutralize`.
    pub fn suggested_codec(self) -> Option<CodecId> {
        match self {
            Indicator::BytesLiteral => Some(CodecId::BytesLiteral),
            Indicator::Marshal      => Some(CodecId::Marshal),
            Indicator::Base64       => Some(CodecId::Base64),
            Indicator::Zlib         => Some(CodecId::Zlib),
            Indicator::Hyperion     => Some(CodecId::Zlib),
            Indicator::Hex          => Some(CodecId::Escapes),
            Indicator::PyObfuscate
            | Indicator::ExecEval
            | Indicator::Lambda
            | Indicator::Unknown    => None,
        }
    }

    fn matches(self, code: &str) -> bool {
        match self {
            Indicator::BytesLiteral => code.contains("bytes([") || code.contains("bytes.fromhex"),
            Indicator::Marshal      => code.contains("marshal.loads"),
            Indicator::Base64       => code.contains("base64.b64") || code.contains("b64decode"),
            Indicator::Zlib         => code.contains("zlib.decompress"),
            Indicator::Hyperion     => {
                code.contains("exec((_)") || code.contains("__import__('zlib').decompress")
            }
            Indicator::PyObfuscate  => code.to_ascii_lowercase().contains("pyobfuscate"),
            Indicator::ExecEval     => code.contains("exec(") || code.contains("eval("),
            Indicator::Lambda       => code.contains("lambda"),
            Indicator::Hex          => code.contains(".fromhex") || code.contains("\\x"),
            Indicator::Unknown      => false,
        }
    }
}

/// Every indicator present in `code`, in scan order.  Never empty: input with
/// no known marker yields `[Indicator::Unknown]`.
pub fn detect(code: &str) -> Vec<Indicator> {
    let found: Vec<Indicator> = ALL.iter().copied().filter(|i| i.matches(code)).collect();
    if found.is_empty() {
        vec![Indicator::Unknown]
    } else {
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_unknown() {
        assert_eq!(detect("print('hi')"), vec![Indicator::Unknown]);
    }

    #[test]
    fn hyperion_wrapper() {
        let src = "_ = lambda __ : __import__('zlib').decompress(__[::-1]);exec((_)(b'...'))";
        let found = detect(src);
        assert!(found.contains(&Indicator::Hyperion));
        assert!(found.contains(&Indicator::ExecEval));
        assert!(found.contains(&Indicator::Lambda));
        assert!(!found.contains(&Indicator::Unknown));
    }

    #[test]
    fn results_follow_scan_order() {
        let src = r"exec(marshal.loads(base64.b64decode('...')))  # \x41";
        assert_eq!(
            detect(src),
            vec![Indicator::Marshal, Indicator::Base64, Indicator::ExecEval, Indicator::Hex]
        );
    }

    #[test]
    fn pyobfuscate_is_case_insensitive() {
        assert_eq!(detect("# Obfuscated with PyObfuscate"), vec![Indicator::PyObfuscate]);
    }

    #[test]
    fn suggestions_point_at_registry_codecs() {
        assert_eq!(Indicator::BytesLiteral.suggested_codec(), Some(CodecId::BytesLiteral));
        assert_eq!(Indicator::Unknown.suggested_codec(), None);
    }
}
