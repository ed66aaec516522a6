//! Text sink for the finished document

use std::fmt;
use std::io;

/// One tab-separated output line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HumdrumLine {
    tokens: Vec<String>,
}

impl HumdrumLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, token: impl Into<String>) {
        self.tokens.push(token.into());
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for HumdrumLine {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            tokens: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for HumdrumLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens.join("\t"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HumdrumFile {
    lines: Vec<HumdrumLine>,
}

impl HumdrumFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_line(&mut self, line: HumdrumLine) {
        self.lines.push(line);
    }

    /// Insert at `index`, clamped to the end of the file
    pub fn insert_line(&mut self, index: usize, line: HumdrumLine) {
        let index = index.min(self.lines.len());
        self.lines.insert(index, line);
    }

    pub fn lines(&self) -> &[HumdrumLine] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Write every line, newline-terminated
    pub fn write_to<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        for line in &self.lines {
            writeln!(writer, "{}", line)?;
        }
        writer.flush()
    }
}

impl fmt::Display for HumdrumFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}
