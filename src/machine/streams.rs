//! Byte streams.

use crate::atom_table::*;

use std::fmt;
use std::io;
use std::io::{Cursor, ErrorKind, Read, Write};
use std::ops::{Deref, DerefMut};

/// The element type of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamType {
    /// Bytes.
    Binary,
    /// Characters.
    Text,
}

impl StreamType {
    #[inline]
    pub(crate) fn as_atom(&self) -> Atom {
        match self {
            StreamType::Binary => atom!("binary_stream"),
            StreamType::Text => atom!("text_stream"),
        }
    }
}

/// What a read past the end of the stream does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EOFAction {
    /// Keep returning the end-of-file code.
    EOFCode,
    /// Raise a permission error.
    Error,
}

/// Options carried by every stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct StreamOptions {
    /// Whether the stream carries text or bytes.
    pub stream_type: StreamType,
    /// Behaviour on reads past the end of the stream.
    pub eof_action: EOFAction,
    alias: Option<Atom>,
}

impl StreamOptions {
    /// The alias the stream was opened with, if any.
    #[inline]
    pub fn get_alias(self) -> Option<Atom> {
        self.alias
    }

    /// Records the alias the stream is registered under.
    #[inline]
    pub fn set_alias_to_atom_opt(&mut self, alias: Option<Atom>) {
        self.alias = alias;
    }
}

impl Default for StreamOptions {
    #[inline]
    fn default() -> Self {
        StreamOptions {
            stream_type: StreamType::Binary,
            eof_action: EOFAction::EOFCode,
            alias: None,
        }
    }
}

/// A stream body together with its options and position bookkeeping.
#[derive(Debug)]
pub struct StreamLayout<T> {
    /// The stream options.
    pub options: StreamOptions,
    past_end_of_stream: bool,
    stream: T,
}

impl<T> StreamLayout<T> {
    #[inline]
    fn new(stream: T) -> Self {
        Self {
            options: StreamOptions::default(),
            past_end_of_stream: false,
            stream,
        }
    }
}

impl<T> Deref for StreamLayout<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.stream
    }
}

impl<T> DerefMut for StreamLayout<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.stream
    }
}

/// A byte stream reachable from builtins through a foreign handle.
pub enum Stream {
    /// An input stream that is always at its end.
    NullInput(StreamOptions),
    /// An output stream that discards what is written to it.
    NullOutput(StreamOptions),
    /// A stream released by `close/1`. Every operation on it fails.
    Closed(StreamOptions),
    /// In-memory input.
    Byte(StreamLayout<Cursor<Vec<u8>>>),
    /// In-memory output.
    Memory(StreamLayout<Vec<u8>>),
    /// The process standard input.
    StandardInput(StreamLayout<io::Stdin>),
    /// The process standard output.
    StandardOutput(StreamLayout<io::Stdout>),
    /// The process standard error.
    StandardError(StreamLayout<io::Stderr>),
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::NullInput(_) => write!(f, "NullInput"),
            Stream::NullOutput(_) => write!(f, "NullOutput"),
            Stream::Closed(_) => write!(f, "Closed"),
            Stream::Byte(cursor) => write!(f, "Byte(position = {})", cursor.position()),
            Stream::Memory(buf) => write!(f, "Memory(len = {})", buf.len()),
            Stream::StandardInput(_) => write!(f, "StandardInput"),
            Stream::StandardOutput(_) => write!(f, "StandardOutput"),
            Stream::StandardError(_) => write!(f, "StandardError"),
        }
    }
}

impl Stream {
    /// An input stream with no bytes.
    #[inline]
    pub fn null_input() -> Self {
        Stream::NullInput(StreamOptions::default())
    }

    /// An output stream that drops its bytes.
    #[inline]
    pub fn null_output() -> Self {
        Stream::NullOutput(StreamOptions::default())
    }

    /// An input stream over the given bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Stream::Byte(StreamLayout::new(Cursor::new(bytes.into())))
    }

    /// An output stream collecting its bytes in memory.
    pub fn memory() -> Self {
        Stream::Memory(StreamLayout::new(Vec::new()))
    }

    /// The process standard input.
    pub fn stdin() -> Self {
        let mut layout = StreamLayout::new(io::stdin());
        layout.options.stream_type = StreamType::Text;
        Stream::StandardInput(layout)
    }

    /// The process standard output.
    pub fn stdout() -> Self {
        let mut layout = StreamLayout::new(io::stdout());
        layout.options.stream_type = StreamType::Text;
        Stream::StandardOutput(layout)
    }

    /// The process standard error.
    pub fn stderr() -> Self {
        let mut layout = StreamLayout::new(io::stderr());
        layout.options.stream_type = StreamType::Text;
        Stream::StandardError(layout)
    }

    /// The stream options.
    pub fn options(&self) -> &StreamOptions {
        match self {
            Stream::NullInput(options) | Stream::NullOutput(options) | Stream::Closed(options) => {
                options
            }
            Stream::Byte(layout) => &layout.options,
            Stream::Memory(layout) => &layout.options,
            Stream::StandardInput(layout) => &layout.options,
            Stream::StandardOutput(layout) => &layout.options,
            Stream::StandardError(layout) => &layout.options,
        }
    }

    /// The stream options, mutably.
    pub fn options_mut(&mut self) -> &mut StreamOptions {
        match self {
            Stream::NullInput(options) | Stream::NullOutput(options) | Stream::Closed(options) => {
                options
            }
            Stream::Byte(layout) => &mut layout.options,
            Stream::Memory(layout) => &mut layout.options,
            Stream::StandardInput(layout) => &mut layout.options,
            Stream::StandardOutput(layout) => &mut layout.options,
            Stream::StandardError(layout) => &mut layout.options,
        }
    }

    /// True once the stream has been closed.
    #[inline]
    pub fn is_closed(&self) -> bool {
        matches!(self, Stream::Closed(_))
    }

    /// True for streams bytes can be read from. A null input stream is
    /// always at its end.
    #[inline]
    pub fn is_input_stream(&self) -> bool {
        matches!(
            self,
            Stream::NullInput(_) | Stream::Byte(_) | Stream::StandardInput(_)
        )
    }

    /// True for streams bytes can be written to.
    #[inline]
    pub fn is_output_stream(&self) -> bool {
        matches!(
            self,
            Stream::NullOutput(_)
                | Stream::Memory(_)
                | Stream::StandardOutput(_)
                | Stream::StandardError(_)
        )
    }

    /// True for the process standard streams, which are never closed.
    #[inline]
    pub fn is_standard_stream(&self) -> bool {
        matches!(
            self,
            Stream::StandardInput(_) | Stream::StandardOutput(_) | Stream::StandardError(_)
        )
    }

    pub(crate) fn past_end_of_stream(&self) -> bool {
        match self {
            Stream::Byte(layout) => layout.past_end_of_stream,
            Stream::StandardInput(layout) => layout.past_end_of_stream,
            _ => false,
        }
    }

    fn set_past_end_of_stream(&mut self, value: bool) {
        match self {
            Stream::Byte(layout) => layout.past_end_of_stream = value,
            Stream::StandardInput(layout) => layout.past_end_of_stream = value,
            _ => {}
        }
    }

    /// Reads one byte, returning `None` at the end of the stream.
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut b = [0u8; 1];

        loop {
            return match self.read(&mut b) {
                Ok(0) => {
                    self.set_past_end_of_stream(true);
                    Ok(None)
                }
                Ok(_) => Ok(Some(b[0])),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => Err(e),
            };
        }
    }

    /// The bytes written so far to an in-memory output stream.
    pub fn memory_contents(&self) -> Option<&[u8]> {
        match self {
            Stream::Memory(buf) => Some(buf.as_slice()),
            _ => None,
        }
    }

    /// Flushes the stream and marks it closed, keeping its options.
    pub(crate) fn close(&mut self) -> io::Result<()> {
        self.flush()?;

        let options = *self.options();
        *self = Stream::Closed(options);

        Ok(())
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Byte(cursor) => cursor.read(buf),
            Stream::StandardInput(stdin) => stdin.read(buf),
            Stream::NullInput(_) => Ok(0),
            _ => Err(io::Error::new(
                ErrorKind::PermissionDenied,
                "read from an output stream",
            )),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Memory(memory) => memory.write(buf),
            Stream::StandardOutput(stdout) => stdout.write(buf),
            Stream::StandardError(stderr) => stderr.write(buf),
            Stream::NullOutput(_) => Ok(buf.len()),
            _ => Err(io::Error::new(
                ErrorKind::PermissionDenied,
                "write to an input stream",
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Memory(memory) => memory.flush(),
            Stream::StandardOutput(stdout) => stdout.flush(),
            Stream::StandardError(stderr) => stderr.flush(),
            _ => Ok(()),
        }
    }
}
