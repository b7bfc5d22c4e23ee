use regex::Regex;

use crate::error::Result;

use super::compile_regex;

/// How a record (or a `split()` string) is divided into fields
#[derive(Debug, Clone)]
pub enum FieldSplitter {
    /// FS = " ": runs of blanks and newlines, ignoring leading/trailing ones
    Whitespace,
    /// FS = "": every character is a field
    Chars,
    /// Any other single character, taken literally
    Char(char),
    /// Multi-character FS, or a regex literal passed to `split()`
    Regex(Regex),
}

impl FieldSplitter {
    pub fn from_fs(fs: &str) -> Result<Self> {
        let mut chars = fs.chars();
        Ok(match (chars.next(), chars.next()) {
            (None, _) => FieldSplitter::Chars,
            (Some(' '), None) => FieldSplitter::Whitespace,
            (Some(c), None) => FieldSplitter::Char(c),
            _ => FieldSplitter::Regex(compile_regex(fs)?),
        })
    }

    pub fn from_regex(source: &str) -> Result<Self> {
        Ok(FieldSplitter::Regex(compile_regex(source)?))
    }

    /// Split `text`; with `newline_separates`, a newline also ends a field
    pub fn split<'t>(&self, text: &'t str, newline_separates: bool) -> Vec<&'t str> {
        if text.is_empty() {
            return Vec::new();
        }
        match self {
            FieldSplitter::Whitespace => text
                .split([' ', '\t', '\n'])
                .filter(|field| !field.is_empty())
                .collect(),
            FieldSplitter::Chars => text
                .char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .filter(|field| !newline_separates || *field != "\n")
                .collect(),
            FieldSplitter::Char(sep) if newline_separates => {
                text.split([*sep, '\n']).collect()
            }
            FieldSplitter::Char(sep) => text.split(*sep).collect(),
            FieldSplitter::Regex(regex) if newline_separates => text
                .split('\n')
                .flat_map(|line| regex.split(line))
                .collect(),
            FieldSplitter::Regex(regex) => regex.split(text).collect(),
        }
    }
}

/// The current record and its fields.
///
/// At any time either the text or the fields are authoritative; the other
/// side is recomputed on demand. Assigning `$0` invalidates the fields,
/// assigning a field or NF invalidates the text, which is rebuilt with OFS.
#[derive(Debug)]
pub struct Record {
    text: String,
    fields: Vec<String>,
    text_valid: bool,
    fields_valid: bool,
    splitter: FieldSplitter,
    paragraph_mode: bool,
}

impl Default for Record {
    fn default() -> Self {
        Self {
            text: String::new(),
            fields: Vec::new(),
            text_valid: true,
            fields_valid: true,
            splitter: FieldSplitter::Whitespace,
            paragraph_mode: false,
        }
    }
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn splitter(&self) -> &FieldSplitter {
        &self.splitter
    }

    /// New field separator; re-splits the record on next access unless
    /// fields were assigned since it was read
    pub fn set_splitter(&mut self, splitter: FieldSplitter) {
        self.splitter = splitter;
        if self.text_valid {
            self.fields_valid = false;
        }
    }

    /// In paragraph mode (RS = "") newline always separates fields
    pub fn set_paragraph_mode(&mut self, enabled: bool) {
        if self.paragraph_mode != enabled {
            self.paragraph_mode = enabled;
            if self.text_valid {
                self.fields_valid = false;
            }
        }
    }

    pub fn set_record(&mut self, text: String) {
        self.text = text;
        self.text_valid = true;
        self.fields_valid = false;
    }

    fn ensure_fields(&mut self) {
        if self.fields_valid {
            return;
        }
        self.fields = self
            .splitter
            .split(&self.text, self.paragraph_mode)
            .into_iter()
            .map(String::from)
            .collect();
        self.fields_valid = true;
    }

    fn ensure_text(&mut self, ofs: &str) {
        if self.text_valid {
            return;
        }
        self.text = self.fields.join(ofs);
        self.text_valid = true;
    }

    /// `$0`, rebuilt with `ofs` if a field changed
    pub fn text(&mut self, ofs: &str) -> &str {
        self.ensure_text(ofs);
        &self.text
    }

    pub fn nf(&mut self) -> usize {
        self.ensure_fields();
        self.fields.len()
    }

    /// `$index`; empty beyond NF
    pub fn field(&mut self, index: usize, ofs: &str) -> &str {
        if index == 0 {
            return self.text(ofs);
        }
        self.ensure_fields();
        self.fields.get(index - 1).map_or("", String::as_str)
    }

    /// Assign `$index`, padding with empty fields when it extends NF
    pub fn set_field(&mut self, index: usize, value: String) {
        if index == 0 {
            self.set_record(value);
            return;
        }
        self.ensure_fields();
        if self.fields.len() < index {
            self.fields.resize(index, String::new());
        }
        self.fields[index - 1] = value;
        self.text_valid = false;
    }

    /// Assign NF, truncating or padding the fields
    pub fn set_nf(&mut self, nf: usize) {
        self.ensure_fields();
        self.fields.resize(nf, String::new());
        self.text_valid = false;
    }
}
