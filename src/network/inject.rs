//! Operator-driven frame injection.
//!
//! Lines of hex text (two digits per byte, no separators) are assembled from
//! a raw input stream, handed to the worker through a channel and written to
//! the device as-is. A malformed line only loses that line.

use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::warn;

use crate::error::InjectError;

/// Longest accepted input line, in characters.
pub const MAX_LINE_LEN: usize = 3000;

/// Decode one line of hex into frame bytes.
///
/// Surrounding whitespace (including a trailing `\r`) is ignored; digits are
/// case insensitive.
pub fn decode_hex_line(line: &str) -> Result<Vec<u8>, InjectError> {
    let digits = line.trim().as_bytes();
    if digits.is_empty() {
        return Err(InjectError::Empty);
    }
    if digits.len() % 2 != 0 {
        return Err(InjectError::OddLength(digits.len()));
    }
    digits
        .chunks_exact(2)
        .enumerate()
        .map(|(pair, chunk)| {
            let high = nibble(chunk[0], 2 * pair)?;
            let low = nibble(chunk[1], 2 * pair + 1)?;
            Ok((high << 4) | low)
        })
        .collect()
}

fn nibble(digit: u8, position: usize) -> Result<u8, InjectError> {
    char::from(digit)
        .to_digit(16)
        .map(|value| value as u8)
        .ok_or(InjectError::InvalidDigit {
            position,
            found: char::from(digit),
        })
}

/// Splits a raw byte stream into complete lines.
///
/// Bytes are buffered until a newline arrives. A line that grows past
/// [`MAX_LINE_LEN`] is dropped up to its terminating newline.
#[derive(Debug, Default)]
pub struct LineAssembler {
    pending: Vec<u8>,
    overflowed: bool,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of input, returning every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' {
                if self.overflowed {
                    warn!("dropping injection line longer than {MAX_LINE_LEN} characters");
                } else {
                    lines.push(String::from_utf8_lossy(&self.pending).into_owned());
                }
                self.pending.clear();
                self.overflowed = false;
            } else if self.pending.len() >= MAX_LINE_LEN {
                self.pending.clear();
                self.overflowed = true;
            } else if !self.overflowed {
                self.pending.push(byte);
            }
        }
        lines
    }

    /// Number of buffered bytes of the current incomplete line.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Worker side of the injection channel.
#[derive(Debug)]
pub struct Injector {
    rx: mpsc::Receiver<String>,
}

impl Injector {
    /// Create a channel whose sender accepts raw hex lines.
    pub fn channel(capacity: usize) -> (mpsc::Sender<String>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }

    /// Decode every line queued so far without blocking.
    pub fn poll(&mut self) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(line) => match decode_hex_line(&line) {
                    Ok(frame) => frames.push(frame),
                    Err(InjectError::Empty) => {}
                    Err(err) => warn!(error = %err, "dropping malformed injection line"),
                },
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_decode_mixed_case_hex() {
        assert_eq!(
            decode_hex_line("ffFF0a1B\r\n").unwrap(),
            vec![0xff, 0xff, 0x0a, 0x1b]
        );
    }

    #[test]
    fn should_reject_odd_length() {
        assert_eq!(decode_hex_line("abc"), Err(InjectError::OddLength(3)));
    }

    #[test]
    fn should_reject_non_hex_digit_with_position() {
        assert_eq!(
            decode_hex_line("00zz"),
            Err(InjectError::InvalidDigit {
                position: 2,
                found: 'z'
            })
        );
        assert_eq!(decode_hex_line("   "), Err(InjectError::Empty));
    }

    #[test]
    fn should_assemble_lines_across_chunks() {
        let mut assembler = LineAssembler::new();
        assert!(assembler.push(b"0011").is_empty());
        assert_eq!(assembler.pending(), 4);
        assert_eq!(assembler.push(b"22\nAB"), vec!["001122".to_owned()]);
        assert_eq!(assembler.push(b"\n"), vec!["AB".to_owned()]);
        assert_eq!(assembler.pending(), 0);
    }

    #[test]
    fn should_drop_overlong_line_only() {
        let mut assembler = LineAssembler::new();
        let long = vec![b'0'; MAX_LINE_LEN + 10];
        assert!(assembler.push(&long).is_empty());
        assert_eq!(assembler.push(b"\nFF\n"), vec!["FF".to_owned()]);
    }

    #[test]
    fn should_poll_decoded_frames_and_skip_bad_lines() {
        let (tx, mut injector) = Injector::channel(8);
        tx.try_send("0102".to_owned()).unwrap();
        tx.try_send("nothex".to_owned()).unwrap();
        tx.try_send(String::new()).unwrap();
        tx.try_send("ff".to_owned()).unwrap();

        assert_eq!(injector.poll(), vec![vec![1, 2], vec![0xff]]);
        assert!(injector.poll().is_empty());

        drop(tx);
        assert!(injector.poll().is_empty());
    }
}
