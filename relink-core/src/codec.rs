//! Pipeline stages.
//!
//! A connection carries an ordered list of [`Handler`]s installed ahead of the
//! client's receive callback. Inbound bytes flow through the stages first to
//! last; outbound payloads flow last to first, so a stage's encode side sees
//! data before the stages in front of it.
//!
//! Stages may be stateful (for example a partial line), so every connection
//! gets a fresh [`Pipeline`] from the configured [`HandlerFactory`].

use crate::error::CodecError;
use bytes::{BufMut, Bytes, BytesMut};
use smallvec::{smallvec, SmallVec};
use std::fmt;
use std::sync::Arc;

/// Output of one pipeline step. Most stages emit zero or one frame.
pub type Frames = SmallVec<[Bytes; 4]>;

/// Builds the stage list for a new connection.
pub type HandlerFactory = Arc<dyn Fn() -> Vec<Box<dyn Handler>> + Send + Sync>;

/// Which way data is travelling through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Bytes read from the socket, on their way to the read queue
    Inbound,
    /// Payloads taken from the write queue, on their way to the socket
    Outbound,
}

/// A single encode/decode stage.
pub trait Handler: 'static {
    /// Transform `input`, pushing zero or more frames to `out`.
    fn process(
        &mut self,
        direction: Direction,
        input: Bytes,
        out: &mut Frames,
    ) -> Result<(), CodecError>;

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Ordered list of stages owned by one connection.
pub struct Pipeline {
    stages: Vec<Box<dyn Handler>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Handler>>) -> Self {
        Self { stages }
    }

    /// Build a pipeline from a factory.
    pub fn from_factory(factory: &HandlerFactory) -> Self {
        Self::new(factory())
    }

    /// Run received bytes through every stage, first to last.
    pub fn inbound(&mut self, input: Bytes) -> Result<Frames, CodecError> {
        let mut current: Frames = smallvec![input];
        for stage in self.stages.iter_mut() {
            current = Self::step(stage.as_mut(), Direction::Inbound, current)?;
        }
        Ok(current)
    }

    /// Run an outgoing payload through every stage, last to first.
    pub fn outbound(&mut self, input: Bytes) -> Result<Frames, CodecError> {
        let mut current: Frames = smallvec![input];
        for stage in self.stages.iter_mut().rev() {
            current = Self::step(stage.as_mut(), Direction::Outbound, current)?;
        }
        Ok(current)
    }

    fn step(
        stage: &mut dyn Handler,
        direction: Direction,
        input: Frames,
    ) -> Result<Frames, CodecError> {
        let mut out = Frames::new();
        for frame in input {
            stage.process(direction, frame, &mut out)?;
        }
        Ok(out)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.stages.iter().map(|s| s.name()))
            .finish()
    }
}

/// Default stage list: a single [`BytesCodec`].
pub fn default_handlers() -> HandlerFactory {
    Arc::new(|| vec![Box::new(BytesCodec) as Box<dyn Handler>])
}

/// Identity byte stage. Payloads are raw bytes in both directions.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesCodec;

impl Handler for BytesCodec {
    fn process(
        &mut self,
        _direction: Direction,
        input: Bytes,
        out: &mut Frames,
    ) -> Result<(), CodecError> {
        if !input.is_empty() {
            out.push(input);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "bytes"
    }
}

/// Default maximum line length accepted by [`LineCodec`] (64KB)
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

const NEWLINE: u8 = b'\n';

/// Newline-delimited frames.
///
/// Inbound: buffers bytes and emits one frame per complete line, without the
/// terminator (`\n` or `\r\n`). Outbound: appends `\n` to each payload.
#[derive(Debug)]
pub struct LineCodec {
    buffer: BytesMut,
    max_length: usize,
}

impl LineCodec {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_LINE_LENGTH)
    }

    #[must_use]
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            max_length,
        }
    }

    /// Bytes of an unterminated line held back for the next read.
    #[inline]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn decode(&mut self, input: Bytes, out: &mut Frames) -> Result<(), CodecError> {
        self.buffer.extend_from_slice(&input);

        while let Some(pos) = self.buffer.iter().position(|b| *b == NEWLINE) {
            if pos > self.max_length {
                return Err(self.too_long(pos));
            }
            let mut line = self.buffer.split_to(pos + 1);
            line.truncate(pos);
            if line.last() == Some(&b'\r') {
                line.truncate(pos - 1);
            }
            out.push(line.freeze());
        }

        if self.buffer.len() > self.max_length {
            return Err(self.too_long(self.buffer.len()));
        }
        Ok(())
    }

    fn too_long(&mut self, len: usize) -> CodecError {
        self.buffer.clear();
        CodecError::LineTooLong {
            len,
            max: self.max_length,
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Handler for LineCodec {
    fn process(
        &mut self,
        direction: Direction,
        input: Bytes,
        out: &mut Frames,
    ) -> Result<(), CodecError> {
        match direction {
            Direction::Inbound => self.decode(input, out),
            Direction::Outbound => {
                if input.len() > self.max_length {
                    return Err(CodecError::LineTooLong {
                        len: input.len(),
                        max: self.max_length,
                    });
                }
                let mut line = BytesMut::with_capacity(input.len() + 1);
                line.extend_from_slice(&input);
                line.put_u8(NEWLINE);
                out.push(line.freeze());
                Ok(())
            }
        }
    }

    fn name(&self) -> &'static str {
        "line"
    }
}
