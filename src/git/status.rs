//! Decoder for `git status -z` output
//!
//! Each record is two status characters, one separator, an optional
//! NUL-terminated rename field (only when the index status is `R`) and a
//! NUL-terminated path. The final NUL may be missing.

use serde::Serialize;

/// Index status marking a rename record
const RENAME: char = 'R';

/// One changed path reported by `git status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStatus {
    /// Index (staged) status
    pub x: char,
    /// Worktree status
    pub y: char,
    pub path: String,
    /// Extra path of an `R` record, read before `path`.
    ///
    /// git writes the new name here and the old name in `path`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rename: Option<String>,
}

impl FileStatus {
    /// The two-character porcelain status code, e.g. `"M "` or `"??"`
    pub fn code(&self) -> String {
        [self.x, self.y].iter().collect()
    }

    pub fn is_untracked(&self) -> bool {
        self.x == '?' && self.y == '?'
    }
}

/// Parse raw `status -z` text into entries.
///
/// Entries whose path ends with `/` are nested repositories and are skipped.
/// A trailing record too short to hold its status prefix ends the scan.
pub fn parse_status(raw: &str) -> Vec<FileStatus> {
    let mut entries = Vec::new();
    let mut cursor = Cursor::new(raw);

    while !cursor.at_end() {
        let (Some(x), Some(y)) = (cursor.next_char(), cursor.next_char()) else {
            break;
        };
        if cursor.next_char().is_none() {
            break;
        }

        let rename = (x == RENAME).then(|| cursor.field().to_string());
        let path = cursor.field();

        // nested repository
        if path.ends_with('/') {
            continue;
        }

        entries.push(FileStatus {
            x,
            y,
            path: path.to_string(),
            rename,
        });
    }

    entries
}

struct Cursor<'a> {
    raw: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(raw: &'a str) -> Self {
        Self { raw, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.raw.len()
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.raw[self.pos..].chars().next()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Read up to the next NUL (consumed) or to the end of input
    fn field(&mut self) -> &'a str {
        let rest = &self.raw[self.pos..];
        match rest.find('\0') {
            Some(end) => {
                self.pos += end + 1;
                &rest[..end]
            }
            None => {
                self.pos = self.raw.len();
                rest
            }
        }
    }
}
