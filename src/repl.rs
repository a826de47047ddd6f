use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Completer, Helper, Highlighter, Hinter, Result};

/// Helper that extends editor
///
/// Currently only implements `Validator` trait to trigger multiline editing when a `\` is seen at
/// the end of a line or when a block, list or argument list is left open.
#[derive(Completer, Helper, Highlighter, Hinter)]
pub struct ReplHelper {}

impl ReplHelper {
    pub fn new() -> Self {
        ReplHelper {}
    }
}

impl Validator for ReplHelper {
    fn validate(&self, ctx: &mut ValidationContext) -> Result<ValidationResult> {
        let input = ctx.input();
        if input.ends_with('\\') || open_delimiters(input) > 0 {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

/// Count `{`, `[` and `(` not yet closed, ignoring anything inside string literals
///
/// Stray closing delimiters are left for the parser to complain about.
fn open_delimiters(input: &str) -> usize {
    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escaped = false;

    for c in input.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => (),
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' | '[' | '(' => depth += 1,
            '}' | ']' | ')' => depth = depth.saturating_sub(1),
            _ => (),
        }
    }

    depth
}

/// Fixup input so the parser is happy
///
/// Removes the multiline escape created by `ReplHelper`
pub fn fixup_input(input: &str) -> String {
    input.replace("\\\n", " ")
}

#[test]
fn test_open_delimiters() {
    let data = vec![
        ("let x = 1;", 0),
        ("fn f(a) {", 1),
        ("fn f(a) { if (a) {", 2),
        ("fn f(a) { a }", 0),
        ("[1, [2,", 2),
        (r#""{ not a block""#, 0),
        (r#""escaped \" {" + ("#, 1),
        ("}", 0),
        (") (", 1),
    ];

    for (input, expected) in data {
        assert_eq!(open_delimiters(input), expected, "{}", input);
    }
}

#[test]
fn test_fixup_input() {
    assert_eq!(fixup_input("asdf \\\nme"), "asdf  me");
    assert_eq!(fixup_input("asdf \\ \nme"), "asdf \\ \nme");
    assert_eq!(fixup_input("fn f() {\n1\n}"), "fn f() {\n1\n}");
    assert_eq!(fixup_input("meline;"), "meline;");
}
