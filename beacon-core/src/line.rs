//! Line assembly for the serial command channel.
//!
//! Bytes arrive one at a time from the polled UART. The assembler collects
//! them into a fixed-capacity buffer and marks a command ready when a line
//! feed or carriage return closes a non-empty line. Blank lines (including the
//! second half of a CR+LF pair) are ignored.
//!
//! A line that does not fit is thrown away rather than truncated: on overflow
//! the buffer resets, the offending byte is dropped, and everything up to the
//! next terminator is discarded as well. A truncated prefix of a long line can
//! therefore never be mistaken for a shorter, valid command.

use heapless::Vec;

/// Capacity of the command line buffer, terminator slot included.
pub const LINE_CAPACITY: usize = 32;

/// Private copy of a completed command line handed to the parser.
pub type CommandLine<const N: usize = LINE_CAPACITY> = Vec<u8, N>;

/// What happened to a single fed byte.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LineEvent {
    /// Byte appended to the buffer.
    Stored,
    /// Terminator closed a non-empty line; a command is ready.
    LineReady,
    /// Terminator arrived with an empty buffer and was ignored.
    BlankLine,
    /// Buffer was full; it was reset and the byte dropped.
    Overflow,
    /// Byte belonged to an over-length line and was dropped.
    Discarded,
}

/// Collects serial bytes into command lines.
///
/// The write cursor never exceeds `N - 1`; the last slot is reserved for the
/// terminator, matching a NUL-terminated buffer of `N` bytes.
#[derive(Clone, Debug)]
pub struct LineAssembler<const N: usize = LINE_CAPACITY> {
    buffer: Vec<u8, N>,
    completed: CommandLine<N>,
    command_ready: bool,
    discarding: bool,
}

impl<const N: usize> LineAssembler<N> {
    /// Creates an empty assembler.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            completed: Vec::new(),
            command_ready: false,
            discarding: false,
        }
    }

    /// Largest number of content bytes a line may carry.
    #[must_use]
    pub const fn max_line_len() -> usize {
        N.saturating_sub(1)
    }

    /// Feeds one newly received byte. Never blocks.
    pub fn feed(&mut self, byte: u8) -> LineEvent {
        if matches!(byte, b'\n' | b'\r') {
            return self.close_line();
        }

        if self.discarding {
            return LineEvent::Discarded;
        }

        if self.buffer.len() >= Self::max_line_len() {
            self.buffer.clear();
            self.discarding = true;
            return LineEvent::Overflow;
        }

        // Length was checked against `N - 1` above, so the push cannot fail.
        let _ = self.buffer.push(byte);
        LineEvent::Stored
    }

    fn close_line(&mut self) -> LineEvent {
        if self.discarding {
            self.discarding = false;
            return LineEvent::Discarded;
        }

        if self.buffer.is_empty() {
            return LineEvent::BlankLine;
        }

        self.completed = core::mem::take(&mut self.buffer);
        self.command_ready = true;
        LineEvent::LineReady
    }

    /// Returns `true` while a completed line is waiting to be dispatched.
    #[must_use]
    pub fn command_ready(&self) -> bool {
        self.command_ready
    }

    /// Clears the ready flag. Clearing an already clear flag does nothing.
    pub fn clear_command_ready(&mut self) {
        self.command_ready = false;
    }

    /// Clears the ready flag and hands out a copy of the completed line.
    ///
    /// Returns `None` when no command is ready. The flag is cleared before the
    /// copy is returned so a failed parse can never re-dispatch the same line.
    pub fn take_command(&mut self) -> Option<CommandLine<N>> {
        if !self.command_ready {
            return None;
        }

        self.clear_command_ready();
        Some(core::mem::take(&mut self.completed))
    }

    /// Current write cursor (bytes stored for the line in progress).
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes stored for the line in progress.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Returns `true` while the tail of an over-length line is being dropped.
    #[must_use]
    pub fn is_discarding(&self) -> bool {
        self.discarding
    }

    /// Drops the line in progress and any completed line.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.completed.clear();
        self.command_ready = false;
        self.discarding = false;
    }
}

impl<const N: usize> Default for LineAssembler<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all<const N: usize>(assembler: &mut LineAssembler<N>, bytes: &[u8]) {
        for &byte in bytes {
            assembler.feed(byte);
        }
    }

    #[test]
    fn terminator_closes_line_and_resets_cursor() {
        let mut assembler = LineAssembler::<LINE_CAPACITY>::new();
        feed_all(&mut assembler, b"LED:2:5");
        assert_eq!(assembler.cursor(), 7);

        assert_eq!(assembler.feed(b'\n'), LineEvent::LineReady);
        assert_eq!(assembler.cursor(), 0);
        assert!(assembler.command_ready());

        let line = assembler.take_command().expect("command should be ready");
        assert_eq!(line.as_slice(), b"LED:2:5");
        assert!(!assembler.command_ready());
        assert!(assembler.take_command().is_none());
    }

    #[test]
    fn crlf_yields_a_single_line() {
        let mut assembler = LineAssembler::<LINE_CAPACITY>::new();
        feed_all(&mut assembler, b"LED:1:1\r");
        assert_eq!(assembler.feed(b'\n'), LineEvent::BlankLine);

        assert_eq!(assembler.take_command().unwrap().as_slice(), b"LED:1:1");
        assert!(assembler.take_command().is_none());
    }

    #[test]
    fn line_filling_every_content_slot_is_accepted() {
        let mut assembler = LineAssembler::<8>::new();
        feed_all(&mut assembler, b"1234567");
        assert_eq!(assembler.cursor(), 7);
        assert_eq!(assembler.feed(b'\r'), LineEvent::LineReady);
        assert_eq!(assembler.take_command().unwrap().as_slice(), b"1234567");
    }

    #[test]
    fn overflow_discards_until_next_terminator() {
        let mut assembler = LineAssembler::<8>::new();
        feed_all(&mut assembler, b"1234567");
        assert_eq!(assembler.feed(b'8'), LineEvent::Overflow);
        assert_eq!(assembler.cursor(), 0);
        assert_eq!(assembler.feed(b'9'), LineEvent::Discarded);
        assert_eq!(assembler.cursor(), 0);

        assert_eq!(assembler.feed(b'\n'), LineEvent::Discarded);
        assert!(!assembler.command_ready());
        assert!(!assembler.is_discarding());

        feed_all(&mut assembler, b"ok\n");
        assert_eq!(assembler.take_command().unwrap().as_slice(), b"ok");
    }

    #[test]
    fn clearing_ready_twice_is_a_no_op() {
        let mut assembler = LineAssembler::<LINE_CAPACITY>::new();
        feed_all(&mut assembler, b"x\n");
        assembler.clear_command_ready();
        assembler.clear_command_ready();
        assert!(!assembler.command_ready());
        assert!(assembler.take_command().is_none());
    }
}
