use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::process::{Child, ChildStdin, Command, Stdio};

use log::debug;
use regex::Regex;

use crate::error::{Error, Result};

use super::compile_regex;

/// How RS divides input into records
#[derive(Debug, Clone)]
pub enum RecordSeparator {
    /// A single character, taken literally
    Char(char),
    /// Multi-character RS, used as a regex
    Regex(Regex),
    /// RS = "": records are separated by blank lines
    Paragraph(Regex),
}

impl RecordSeparator {
    pub fn from_rs(rs: &str) -> Result<Self> {
        let mut chars = rs.chars();
        Ok(match (chars.next(), chars.next()) {
            (None, _) => RecordSeparator::Paragraph(compile_regex("\n\n+")?),
            (Some(c), None) => RecordSeparator::Char(c),
            _ => RecordSeparator::Regex(compile_regex(rs)?),
        })
    }
}

impl Default for RecordSeparator {
    fn default() -> Self {
        RecordSeparator::Char('\n')
    }
}

/// Reads records from a byte stream according to a [`RecordSeparator`]
pub struct RecordReader<'a> {
    input: Box<dyn BufRead + 'a>,
    pending: String,
    eof: bool,
}

impl<'a> RecordReader<'a> {
    pub fn new(input: Box<dyn BufRead + 'a>) -> Self {
        Self {
            input,
            pending: String::new(),
            eof: false,
        }
    }

    /// Read more input into `pending`, up to and including `delimiter`
    fn fill(&mut self, delimiter: u8) -> io::Result<()> {
        let mut bytes = Vec::new();
        if self.input.read_until(delimiter, &mut bytes)? == 0 {
            self.eof = true;
        } else {
            self.pending.push_str(&String::from_utf8_lossy(&bytes));
        }
        Ok(())
    }

    fn take_rest(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }

    pub fn read_record(&mut self, separator: &RecordSeparator) -> io::Result<Option<String>> {
        match separator {
            RecordSeparator::Char(sep) => self.read_until_char(*sep),
            RecordSeparator::Regex(regex) => self.read_until_match(regex),
            RecordSeparator::Paragraph(regex) => {
                // Leading newlines never start a paragraph
                loop {
                    let trimmed = self.pending.trim_start_matches('\n').len();
                    self.pending.drain(..self.pending.len() - trimmed);
                    if !self.pending.is_empty() || self.eof {
                        break;
                    }
                    self.fill(b'\n')?;
                }
                let record = self.read_until_match(regex)?;
                Ok(record.map(|mut text| {
                    let trimmed = text.trim_end_matches('\n').len();
                    text.truncate(trimmed);
                    text
                }))
            }
        }
    }

    fn read_until_char(&mut self, sep: char) -> io::Result<Option<String>> {
        let delimiter = if sep.is_ascii() { sep as u8 } else { b'\n' };
        loop {
            if let Some(pos) = self.pending.find(sep) {
                let record = self.pending[..pos].to_string();
                self.pending.drain(..pos + sep.len_utf8());
                return Ok(Some(record));
            }
            if self.eof {
                return Ok(self.take_rest());
            }
            self.fill(delimiter)?;
        }
    }

    fn read_until_match(&mut self, regex: &Regex) -> io::Result<Option<String>> {
        loop {
            // A match touching the end of the buffer might grow with more input
            let found = regex
                .find(&self.pending)
                .filter(|m| !m.is_empty() && (self.eof || m.end() < self.pending.len()))
                .map(|m| (m.start(), m.end()));
            if let Some((start, end)) = found {
                let record = self.pending[..start].to_string();
                self.pending.drain(..end);
                return Ok(Some(record));
            }
            if self.eof {
                return Ok(self.take_rest());
            }
            self.fill(b'\n')?;
        }
    }
}

/// Redirection mode of an output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Truncate,
    Append,
    Pipe,
}

enum OutputStream {
    File(BufWriter<File>),
    Pipe {
        child: Child,
        stdin: Option<BufWriter<ChildStdin>>,
    },
}

impl Write for OutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputStream::File(file) => file.write(buf),
            OutputStream::Pipe { stdin: Some(stdin), .. } => stdin.write(buf),
            OutputStream::Pipe { stdin: None, .. } => Err(io::ErrorKind::BrokenPipe.into()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputStream::File(file) => file.flush(),
            OutputStream::Pipe { stdin: Some(stdin), .. } => stdin.flush(),
            OutputStream::Pipe { stdin: None, .. } => Ok(()),
        }
    }
}

impl OutputStream {
    fn open(name: &str, mode: OutputMode) -> io::Result<Self> {
        Ok(match mode {
            OutputMode::Truncate => OutputStream::File(BufWriter::new(File::create(name)?)),
            OutputMode::Append => OutputStream::File(BufWriter::new(
                OpenOptions::new().create(true).append(true).open(name)?,
            )),
            OutputMode::Pipe => {
                let mut child = shell(name).stdin(Stdio::piped()).spawn()?;
                let stdin = child.stdin.take().map(BufWriter::new);
                OutputStream::Pipe { child, stdin }
            }
        })
    }

    /// Flush and release the stream; pipes report the command's exit status
    fn close(self) -> io::Result<i32> {
        match self {
            OutputStream::File(mut file) => {
                file.flush()?;
                Ok(0)
            }
            OutputStream::Pipe { mut child, stdin } => {
                if let Some(mut stdin) = stdin {
                    stdin.flush()?;
                }
                Ok(exit_code(child.wait()?))
            }
        }
    }
}

enum InputStream {
    File(RecordReader<'static>),
    Pipe {
        child: Child,
        reader: RecordReader<'static>,
    },
}

impl InputStream {
    fn open(name: &str, is_command: bool) -> io::Result<Self> {
        if is_command {
            let mut child = shell(name).stdout(Stdio::piped()).spawn()?;
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| io::Error::other("command has no output"))?;
            Ok(InputStream::Pipe {
                child,
                reader: RecordReader::new(Box::new(BufReader::new(stdout))),
            })
        } else {
            let file = File::open(name)?;
            Ok(InputStream::File(RecordReader::new(Box::new(BufReader::new(file)))))
        }
    }

    fn reader(&mut self) -> &mut RecordReader<'static> {
        match self {
            InputStream::File(reader) => reader,
            InputStream::Pipe { reader, .. } => reader,
        }
    }

    fn close(self) -> io::Result<i32> {
        match self {
            InputStream::File(_) => Ok(0),
            InputStream::Pipe { mut child, reader } => {
                drop(reader);
                Ok(exit_code(child.wait()?))
            }
        }
    }
}

fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

fn exit_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Run a shell command, returning its exit status
pub fn run_command(command: &str) -> i32 {
    match shell(command).status() {
        Ok(status) => exit_code(status),
        Err(err) => {
            debug!("system({command}) failed: {err}");
            -1
        }
    }
}

/// Named files and commands opened by redirections and getline
#[derive(Default)]
pub struct Streams {
    outputs: HashMap<String, OutputStream>,
    inputs: HashMap<String, InputStream>,
}

impl Streams {
    pub fn new() -> Self {
        Self::default()
    }

    /// The output stream for `name`, opened on first use. Later uses keep
    /// the stream as first opened, so `>` truncates only once.
    pub fn output(&mut self, name: &str, mode: OutputMode) -> Result<&mut dyn Write> {
        let stream: &mut dyn Write = match self.outputs.entry(name.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let stream = OutputStream::open(name, mode).map_err(|err| {
                    Error::runtime(format!("output redirection error for \"{name}\": {err}"))
                })?;
                debug!("opened output {name:?} ({mode:?})");
                entry.insert(stream)
            }
        };
        Ok(stream)
    }

    /// Next record from a file or command for getline. Errors opening or
    /// reading are returned to the caller, which reports them as -1.
    pub fn read_record(
        &mut self,
        name: &str,
        is_command: bool,
        separator: &RecordSeparator,
    ) -> io::Result<Option<String>> {
        let stream = match self.inputs.entry(name.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let stream = InputStream::open(name, is_command)?;
                debug!("opened input {name:?}");
                entry.insert(stream)
            }
        };
        stream.reader().read_record(separator)
    }

    /// Close every stream called `name`. Returns -1 if none was open,
    /// otherwise 0 for files and the exit status for commands.
    pub fn close(&mut self, name: &str) -> i32 {
        let mut status = None;
        if let Some(stream) = self.outputs.remove(name) {
            status = Some(stream.close().unwrap_or(-1));
        }
        if let Some(stream) = self.inputs.remove(name) {
            status = Some(stream.close().unwrap_or(-1));
        }
        if status.is_some() {
            debug!("closed {name:?}");
        }
        status.unwrap_or(-1)
    }

    /// Flush one output stream; -1 if it is not open
    pub fn flush(&mut self, name: &str) -> i32 {
        match self.outputs.get_mut(name) {
            Some(stream) => match stream.flush() {
                Ok(()) => 0,
                Err(_) => -1,
            },
            None => -1,
        }
    }

    pub fn flush_all(&mut self) -> Result<()> {
        for stream in self.outputs.values_mut() {
            stream.flush()?;
        }
        Ok(())
    }

    /// Close everything, reporting the first error after trying all streams
    pub fn close_all(&mut self) -> Result<()> {
        let mut first_error = None;
        for (name, stream) in self.outputs.drain() {
            debug!("closing output {name:?}");
            if let Err(err) = stream.close() {
                first_error.get_or_insert(err);
            }
        }
        for (name, stream) in self.inputs.drain() {
            debug!("closing input {name:?}");
            if let Err(err) = stream.close() {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(Error::Io(err)),
            None => Ok(()),
        }
    }
}
