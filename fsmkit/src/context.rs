use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;

use fsmkit_core::Key;
use fsmkit_util::HostType;

use crate::error::{CompilationError, DriverError, ErrorLoc};

/// One alternative of the pattern list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    /// Zero-based line in the source.
    pub line: usize,
    pub text: Vec<u8>,
}

impl Pattern {
    /// The pattern's bytes as keys of the host alphabet. Bytes above 127 wrap
    /// around on signed hosts.
    pub fn keys(&self, host: HostType) -> Vec<Key> {
        self.text.iter()
            .map(|b| if host.is_signed() { Key::new(*b as i8 as i64) } else { Key::from(*b) })
            .collect()
    }
}

#[derive(Clone)]
pub struct Context {
    pub source: TextProvider,
    text: String,
}

impl Context {
    pub fn new(source: TextProvider) -> Result<Context, DriverError> {
        let text = source.read_all()?;
        Ok(Context { source, text })
    }

    /// Non-empty lines not starting with `#`, with escapes resolved.
    pub fn patterns(&self) -> Result<Vec<Pattern>, DriverError> {
        self.text.lines()
            .enumerate()
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
            .map(|(line, text)| {
                let text = unescape(text).ok_or(DriverError::InvalidEscape { line })?;
                Ok(Pattern { line, text })
            })
            .collect()
    }

    fn print_error_loc(&self, loc: ErrorLoc) {
        let line = match loc {
            ErrorLoc::NoLocation() => return,
            ErrorLoc::Line(line) => line,
        };
        let Some(current) = self.text.lines().nth(line) else { return };
        let line_loc_str = format!("{}", line + 1);
        eprintln!(" {} |{}", line_loc_str, current);
        eprintln!(" {} |{}", " ".repeat(line_loc_str.len()), "^".repeat(current.len().max(1)));
    }

    pub fn print_error(&self, error: &dyn CompilationError) {
        eprintln!("--------------------");
        eprintln!("{}: {}!", error.error_type(), error.summarize());
        self.print_error_loc(error.loc());
        eprintln!(">{}", error.description())
    }
}

/// Resolves `\\`, `\#`, `\n`, `\t` and `\xHH`.
fn unescape(text: &str) -> Option<Vec<u8>> {
    let mut res = Vec::with_capacity(text.len());
    let mut bytes = text.bytes();
    while let Some(b) = bytes.next() {
        if b != b'\\' {
            res.push(b);
            continue;
        }
        let byte = match bytes.next()? {
            b'\\' => b'\\',
            b'#' => b'#',
            b'n' => b'\n',
            b't' => b'\t',
            b'x' => {
                let hex = [bytes.next()?, bytes.next()?];
                if !hex.iter().all(u8::is_ascii_hexdigit) {
                    return None;
                }
                u8::from_str_radix(std::str::from_utf8(&hex).ok()?, 16).ok()?
            }
            _ => return None,
        };
        res.push(byte);
    }
    Some(res)
}

#[derive(Clone, Debug)]
pub enum TextProvider {
    Plain(String),
    File(PathBuf),
}

impl TextProvider {
    pub fn read_all(&self) -> io::Result<String> {
        match self {
            TextProvider::Plain(x) => Ok(x.clone()),
            TextProvider::File(x) => {
                let mut file = File::open(x)?;
                let mut str = String::new();
                file.read_to_string(&mut str)?;
                Ok(str)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use fsmkit_core::Key;
    use fsmkit_util::HostType;

    use crate::error::DriverError;

    use super::{Context, TextProvider};

    #[test]
    fn patterns_skip_comments() {
        let context = Context::new(TextProvider::Plain("# words\nfor\n\n\\#if\nwhile\n".to_owned())).unwrap();
        let patterns = context.patterns().unwrap();
        let texts: Vec<&[u8]> = patterns.iter().map(|p| p.text.as_slice()).collect();
        assert_eq!(texts, vec![&b"for"[..], &b"#if"[..], &b"while"[..]]);
        assert_eq!(patterns[1].line, 3);
    }

    #[test]
    fn file_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "alpha").unwrap();
        writeln!(file, "beta").unwrap();

        let context = Context::new(TextProvider::File(file.path().to_path_buf())).unwrap();
        assert_eq!(context.patterns().unwrap().len(), 2);
    }

    #[test]
    fn signed_keys_wrap() {
        let context = Context::new(TextProvider::Plain("é".to_owned())).unwrap();
        let pattern = &context.patterns().unwrap()[0];
        assert_eq!(pattern.keys(HostType::UChar)[0], Key::from(0xc3u8));
        assert_eq!(pattern.keys(HostType::Char)[0], Key::new(0xc3u8 as i8 as i64));
    }

    #[test]
    fn escapes() {
        let context = Context::new(TextProvider::Plain("a\\\\b\\x00\\xFf\\t\nok\n\\q\n".to_owned())).unwrap();
        match context.patterns() {
            Err(DriverError::InvalidEscape { line }) => assert_eq!(line, 2),
            other => panic!("unexpected {:?}", other),
        }

        let context = Context::new(TextProvider::Plain("a\\\\b\\x00\\xFf\\t\n".to_owned())).unwrap();
        let patterns = context.patterns().unwrap();
        assert_eq!(patterns[0].text, vec![b'a', b'\\', b'b', 0, 0xff, b'\t']);

        let context = Context::new(TextProvider::Plain("abc\\x4".to_owned())).unwrap();
        assert!(context.patterns().is_err());
    }

    #[test]
    fn missing_file() {
        let res = Context::new(TextProvider::File("/nonexistent/patterns".into()));
        assert!(matches!(res, Err(DriverError::Io(_))));
    }
}
