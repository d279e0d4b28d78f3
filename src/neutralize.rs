//! Rewrite `exec(` / `eval(` call sites to `print(` so a payload can be
//! inspected instead of run.

const TARGETS: [&str; 2] = ["exec(", "eval("];
const REPLACEMENT: &str = "print(";

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Returns the rewritten text and the number of call sites replaced.
/// A keyword preceded by an identifier character (`myexec(`) is left alone.
pub fn neutralize(code: &str) -> (String, usize) {
    let bytes = code.as_bytes();
    let mut out = String::with_capacity(code.len());
    let mut count = 0;
    let mut i = 0;

    while i < code.len() {
        let rest = &code[i..];
        let hit = TARGETS.iter().find(|t| rest.starts_with(*t));
        let standalone = i == 0 || !is_ident_byte(bytes[i - 1]);

        match hit {
            Some(target) if standalone => {
                out.push_str(REPLACEMENT);
                count += 1;
                i += target.len();
            }
            _ => {
                // Advance one whole char; targets are ASCII so boundaries line up.
                let ch = rest.chars().next().map_or(1, char::len_utf8);
                out.push_str(&rest[..ch]);
                i += ch;
            }
        }
    }

    (out, count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_both_keywords() {
        let (out, n) = neutralize("exec(eval('1+1'))");
        assert_eq!(out, "print(print('1+1'))");
        assert_eq!(n, 2);
    }

    #[test]
    fn leaves_longer_identifiers_alone() {
        let (out, n) = neutralize("myexec(x); obj.eval(y); _eval(z)");
        assert_eq!(out, "myexec(x); obj.print(y); _eval(z)");
        assert_eq!(n, 1);
    }

    #[test]
    fn nothing_to_do() {
        let (out, n) = neutralize("print('ünïcode')");
        assert_eq!(out, "print('ünïcode')");
        assert_eq!(n, 0);
    }
}
