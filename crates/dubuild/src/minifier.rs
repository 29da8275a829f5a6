//! Whole-program text compaction for minified builds
//!
//! The compiler only relies on the [`Minifier`] contract: the output is equivalent Lua, never
//! longer than the input, and malformed input is reported as [`BuildError::Minify`].

use std::{
    fmt,
    io::Write,
    process::{Command, Stdio},
};

use log::debug;

use crate::error::{BuildError, BuildResult};

/// Text-to-text transform applied to the merged sources of a minified build
pub trait Minifier: fmt::Debug {
    fn minify(&self, source: &str) -> BuildResult<String>;
}

/// Returns its input unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityMinifier;

impl Minifier for IdentityMinifier {
    fn minify(&self, source: &str) -> BuildResult<String> {
        Ok(source.to_owned())
    }
}

/// Built-in minifier: drops comments and redundant whitespace, keeps strings verbatim
///
/// Line breaks between statements are kept, so the result parses exactly as the input did.
#[derive(Debug, Clone, Copy, Default)]
pub struct StripMinifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Gap {
    None,
    Space,
    Newline,
}

/// Characters that never fuse with a neighbour into a longer token
fn is_separator(c: char) -> bool {
    matches!(c, '(' | ')' | '{' | '}' | ',' | ';' | '"' | '\'')
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || !c.is_ascii()
}

/// Whether dropping the whitespace between `last` and `next` could change how Lua tokenizes
fn needs_space(last: char, next: char) -> bool {
    if is_separator(last) || is_separator(next) {
        return false;
    }
    match (is_word(last), is_word(next)) {
        (true, true) | (false, false) => true,
        // numerals swallow a following `.`
        (true, false) => next == '.',
        (false, true) => last == '.',
    }
}

/// Level of a long bracket opening at `at` (`[[`, `[=[`, ...) and the offset after it
fn long_bracket_open(source: &str, at: usize) -> Option<(usize, usize)> {
    let rest = source.get(at..)?.strip_prefix('[')?;
    let level = rest.bytes().take_while(|b| *b == b'=').count();
    rest[level..]
        .starts_with('[')
        .then_some((level, at + level + 2))
}

/// Offset just past the long bracket closing `level`, searching from `from`
fn long_bracket_close(source: &str, from: usize, level: usize) -> Option<usize> {
    let closing = format!("]{}]", "=".repeat(level));
    source[from..]
        .find(&closing)
        .map(|offset| from + offset + closing.len())
}

fn is_lua_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

/// Offset just past the escape sequence whose body starts at `at` (after the backslash)
fn escape_end(bytes: &[u8], at: usize) -> usize {
    match bytes.get(at) {
        // `\z` skips the whitespace that follows, line breaks included
        Some(b'z') => {
            let mut i = at + 1;
            while bytes.get(i).copied().is_some_and(is_lua_space) {
                i += 1;
            }
            i
        }
        // escaped line break; `\r\n` and `\n\r` count as one
        Some(&first @ (b'\r' | b'\n')) => match bytes.get(at + 1) {
            Some(&second) if (second == b'\r' || second == b'\n') && second != first => at + 2,
            _ => at + 1,
        },
        _ => at + 1,
    }
}

/// Offset just past the quoted string opening at `at`
fn quoted_string_end(source: &str, at: usize) -> BuildResult<usize> {
    let bytes = source.as_bytes();
    let quote = bytes[at];
    let mut i = at + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i = escape_end(bytes, i + 1),
            b'\n' => break,
            b if b == quote => return Ok(i + 1),
            _ => i += 1,
        }
    }
    Err(BuildError::Minify(format!(
        "unterminated string starting at byte {at}"
    )))
}

impl Minifier for StripMinifier {
    fn minify(&self, source: &str) -> BuildResult<String> {
        let mut out = String::with_capacity(source.len());
        let mut gap = Gap::None;
        let mut i = 0;

        while let Some(c) = source[i..].chars().next() {
            if c.is_whitespace() {
                gap = gap.max(if c == '\n' { Gap::Newline } else { Gap::Space });
                i += c.len_utf8();
                continue;
            }

            if source[i..].starts_with("--") {
                if let Some((level, body)) = long_bracket_open(source, i + 2) {
                    i = long_bracket_close(source, body, level).ok_or_else(|| {
                        BuildError::Minify(format!("unterminated comment starting at byte {i}"))
                    })?;
                    gap = gap.max(Gap::Space);
                } else {
                    i = source[i..].find('\n').map_or(source.len(), |offset| i + offset);
                }
                continue;
            }

            if let Some(last) = out.chars().next_back() {
                match gap {
                    Gap::Newline => out.push('\n'),
                    Gap::Space if needs_space(last, c) => out.push(' '),
                    _ => {}
                }
            }
            gap = Gap::None;

            let end = match c {
                '"' | '\'' => quoted_string_end(source, i)?,
                '[' => match long_bracket_open(source, i) {
                    Some((level, body)) => long_bracket_close(source, body, level).ok_or_else(
                        || BuildError::Minify(format!("unterminated long string at byte {i}")),
                    )?,
                    None => i + 1,
                },
                _ => i + c.len_utf8(),
            };
            out.push_str(&source[i..end]);
            i = end;
        }

        debug!("Minified {} bytes into {}", source.len(), out.len());
        Ok(out)
    }
}

/// Pipes the source through an external program (stdin to stdout)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMinifier {
    program: String,
    args: Vec<String>,
}

impl CommandMinifier {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a command line such as `["luamin", "--stdin"]`
    pub fn from_command_line(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }
}

impl Minifier for CommandMinifier {
    fn minify(&self, source: &str) -> BuildResult<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BuildError::Minify(format!("could not start '{}': {e}", self.program)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| BuildError::Minify("minifier stdin is unavailable".into()))?;
        let input = source.to_owned();
        let writer = std::thread::spawn(move || stdin.write_all(input.as_bytes()));

        let output = child
            .wait_with_output()
            .map_err(|e| BuildError::Minify(format!("'{}' did not finish: {e}", self.program)))?;
        let written = writer
            .join()
            .map_err(|_| BuildError::Minify("minifier input writer panicked".into()))?;

        if !output.status.success() {
            return Err(BuildError::Minify(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        written.map_err(|e| BuildError::Minify(format!("could not feed '{}': {e}", self.program)))?;

        String::from_utf8(output.stdout)
            .map_err(|_| BuildError::Minify(format!("'{}' produced invalid UTF-8", self.program)))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn strip(source: &str) -> String {
        StripMinifier.minify(source).unwrap()
    }

    #[test]
    fn test_identity_returns_input() {
        assert_eq!(IdentityMinifier.minify("local a = 1 -- x").unwrap(), "local a = 1 -- x");
    }

    #[test]
    fn test_comments_and_indentation_are_removed() {
        let source = "-- header\nlocal function add(a, b)\n    -- sum\n    return a + b\nend\n\n\n";
        assert_eq!(strip(source), "local function add(a,b)\nreturn a+b\nend");
    }

    #[test]
    fn test_long_comments_are_removed() {
        assert_eq!(strip("local a--[==[ spans\n ]] lines ]==]= 1"), "local a=1");
        assert_eq!(strip("x = 1 --[ not long\ny = 2"), "x=1\ny=2");
    }

    #[test]
    fn test_strings_are_preserved() {
        let source = "print(\"-- not a comment\",'it\\'s  spaced',[==[\n  raw ]] -- text\n]==])";
        assert_eq!(strip(source), source);
    }

    #[test]
    fn test_placeholders_survive() {
        assert_eq!(
            strip("local rev = '%GIT_FILE_LAST_COMMIT%'"),
            "local rev='%GIT_FILE_LAST_COMMIT%'"
        );
    }

    #[test]
    fn test_operators_keep_their_spacing() {
        assert_eq!(strip("a = b - -c"), "a=b- -c");
        assert_eq!(strip("s = 1 .. x"), "s=1 .. x");
        assert_eq!(strip("t = { 1 , 2 }"), "t={1,2}");
        assert_eq!(strip("if a == nil then return end"), "if a==nil then return end");
        assert_eq!(strip("x = a --[[gone]] - b"), "x=a-b");
    }

    #[test]
    fn test_escaped_line_breaks_stay_inside_strings() {
        assert_eq!(
            strip("local s = \"abc\\z\n   def\"\n"),
            "local s=\"abc\\z\n   def\""
        );
        assert_eq!(strip("s = 'a\\z  \r\n\tb'"), "s='a\\z  \r\n\tb'");
        assert_eq!(strip("s = 'one\\\r\ntwo'"), "s='one\\\r\ntwo'");
        assert_eq!(strip("s = 'one\\\n\rtwo'"), "s='one\\\n\rtwo'");
        assert_eq!(strip("s = 'one\\\ntwo'"), "s='one\\\ntwo'");
    }

    #[test]
    fn test_output_is_never_longer() {
        let source = "local t = {\n  a = 1, -- one\n  b = \"two\",\n}\nreturn t\n";
        assert!(strip(source).len() <= source.len());
    }

    #[test]
    fn test_unterminated_input_is_rejected() {
        assert!(matches!(
            StripMinifier.minify("print('oops)"),
            Err(BuildError::Minify(_))
        ));
        assert!(matches!(
            StripMinifier.minify("print(\"line\nbreak\")"),
            Err(BuildError::Minify(_))
        ));
        assert!(matches!(
            StripMinifier.minify("x = [[never closed"),
            Err(BuildError::Minify(_))
        ));
        assert!(matches!(
            StripMinifier.minify("--[[ never closed"),
            Err(BuildError::Minify(_))
        ));
    }

    #[test]
    fn test_command_line_parsing() {
        assert_eq!(CommandMinifier::from_command_line(&[]), None);
        assert_eq!(
            CommandMinifier::from_command_line(&["luamin".into(), "-c".into()]),
            Some(CommandMinifier::new("luamin", vec!["-c".into()]))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_command_output_is_used() {
        let minifier = CommandMinifier::new("tr", vec!["a-z".into(), "A-Z".into()]);
        assert_eq!(minifier.minify("local x").unwrap(), "LOCAL X");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_failure_is_reported() {
        let failing = CommandMinifier::new("false", vec![]);
        assert!(matches!(failing.minify("x"), Err(BuildError::Minify(_))));

        let missing = CommandMinifier::new("dubuild-no-such-minifier", vec![]);
        assert!(matches!(missing.minify("x"), Err(BuildError::Minify(_))));
    }
}
