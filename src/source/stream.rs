use std::io::Read;

use super::Source;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    Utf8,
    Utf16Le,
    Utf16Be,
}

/// A [`Source`] that wraps an arbitrary [`Read`], sniffing a UTF-16 BOM and
/// transcoding to UTF-8 on the fly — the "streaming source" of SPEC_FULL.md
/// §4.1.
///
/// Grounded on `encoding.rs::detect_encoding`'s BOM table; the transcoder
/// itself is original work, since the teacher's `encoding_rs` integration
/// explicitly excludes UTF-16 (see DESIGN.md).
pub struct ReaderSource<R> {
    inner: R,
    framing: Option<Framing>,
    inner_eof: bool,

    /// Raw bytes read from `inner` not yet consumed. Only meaningfully used
    /// in UTF-16 framing, where bytes are consumed two at a time.
    raw: Vec<u8>,
    raw_start: usize,

    /// The decoded UTF-8 window delivered to the caller. Never longer than
    /// the most recently requested `want_len`: bytes that would overshoot
    /// that bound are parked in `carry` instead.
    out: Vec<u8>,

    /// Tail of a codepoint's UTF-8 encoding that didn't fit in `out` on the
    /// previous `fill` call (SPEC_FULL §4.1's "3-byte carry buffer").
    carry: [u8; 3],
    carry_len: u8,
}

impl<R: Read> ReaderSource<R> {
    pub fn new(inner: R) -> Self {
        ReaderSource {
            inner,
            framing: None,
            inner_eof: false,
            raw: Vec::new(),
            raw_start: 0,
            out: Vec::new(),
            carry: [0; 3],
            carry_len: 0,
        }
    }

    fn detect_framing(&mut self) -> Result<()> {
        self.fill_raw_to(2)?;
        let (framing, bom_len) = match &self.raw[self.raw_start..] {
            [0xFE, 0xFF, ..] => (Framing::Utf16Be, 2),
            [0xFF, 0xFE, ..] => (Framing::Utf16Le, 2),
            _ => (Framing::Utf8, 0),
        };
        self.raw_start += bom_len;
        self.framing = Some(framing);
        Ok(())
    }

    /// Ensures at least `n` unread raw bytes are buffered, or that `inner`
    /// is exhausted.
    fn fill_raw_to(&mut self, n: usize) -> Result<()> {
        loop {
            let avail = self.raw.len() - self.raw_start;
            if avail >= n || self.inner_eof {
                return Ok(());
            }
            if self.raw_start > 0 {
                self.raw.copy_within(self.raw_start.., 0);
                self.raw.truncate(avail);
                self.raw_start = 0;
            }
            let mut chunk = [0u8; 4096];
            let read = self.inner.read(&mut chunk)?;
            if read == 0 {
                self.inner_eof = true;
                return Ok(());
            }
            self.raw.extend_from_slice(&chunk[..read]);
        }
    }

    /// Looks at, without consuming, the next UTF-16 code unit. Returns the
    /// unit plus how many raw bytes it occupies (1 for the "odd trailing
    /// byte" case, 2 otherwise).
    fn peek_code_unit(&mut self, framing: Framing) -> Result<Option<(u16, usize)>> {
        self.fill_raw_to(2)?;
        let avail = self.raw.len() - self.raw_start;
        if avail == 0 {
            return Ok(None);
        }
        if avail == 1 {
            // An odd trailing byte synthesizes an unpaired high surrogate
            // so downstream UTF-8 validation rejects the document here,
            // instead of this source truncating it silently.
            let b = self.raw[self.raw_start];
            return Ok(Some((0xD800 | u16::from(b), 1)));
        }
        let b0 = self.raw[self.raw_start];
        let b1 = self.raw[self.raw_start + 1];
        let cu = match framing {
            Framing::Utf16Be => u16::from_be_bytes([b0, b1]),
            Framing::Utf16Le => u16::from_le_bytes([b0, b1]),
            Framing::Utf8 => unreachable!("peek_code_unit only used in UTF-16 framing"),
        };
        Ok(Some((cu, 2)))
    }

    /// Encodes `cp` as UTF-8 and pushes as much as fits before `limit`
    /// into `out`, parking any remainder in `carry`.
    fn push_codepoint(&mut self, cp: u32, limit: usize) {
        let c = char::from_u32(cp).unwrap_or('\u{FFFD}');
        let mut buf = [0u8; 4];
        let encoded = c.encode_utf8(&mut buf);
        self.push_encoded(encoded.as_bytes(), limit);
    }

    /// Pushes a raw (possibly invalid-UTF-8) byte sequence — e.g. the
    /// pseudo-encoding of a surrogate — using the same overshoot/carry
    /// handling as `push_codepoint`.
    fn push_encoded(&mut self, bytes: &[u8], limit: usize) {
        let room = limit.saturating_sub(self.out.len());
        let take = room.min(bytes.len());
        self.out.extend_from_slice(&bytes[..take]);
        let remainder = &bytes[take..];
        debug_assert!(remainder.len() <= self.carry.len());
        self.carry[..remainder.len()].copy_from_slice(remainder);
        self.carry_len = remainder.len() as u8;
    }

    /// The 3-byte pseudo-UTF-8 encoding of a surrogate code point
    /// (U+D800..=U+DFFF). This is not valid UTF-8 by construction — that is
    /// the point: it lets the reader's own UTF-8 validator reject the
    /// document at the right byte position instead of this source silently
    /// discarding bad input.
    fn encode_surrogate(cu: u16) -> [u8; 3] {
        let cp = u32::from(cu);
        [
            0xE0 | ((cp >> 12) as u8 & 0x0F),
            0x80 | ((cp >> 6) as u8 & 0x3F),
            0x80 | (cp as u8 & 0x3F),
        ]
    }

    fn fill_from_utf8(&mut self, want_len: usize) -> Result<()> {
        while self.out.len() < want_len {
            self.fill_raw_to(want_len - self.out.len())?;
            let avail = self.raw.len() - self.raw_start;
            if avail == 0 {
                break;
            }
            let take = avail.min(want_len - self.out.len());
            self.out
                .extend_from_slice(&self.raw[self.raw_start..self.raw_start + take]);
            self.raw_start += take;
        }
        Ok(())
    }

    fn fill_from_utf16(&mut self, framing: Framing, want_len: usize) -> Result<()> {
        while self.out.len() < want_len && self.carry_len == 0 {
            let (cu, len) = match self.peek_code_unit(framing)? {
                None => break,
                Some(x) => x,
            };
            self.raw_start += len;
            if (0xD800..=0xDBFF).contains(&cu) && len == 2 {
                match self.peek_code_unit(framing)? {
                    Some((low, low_len)) if low_len == 2 && (0xDC00..=0xDFFF).contains(&low) => {
                        self.raw_start += low_len;
                        let cp = 0x10000
                            + ((u32::from(cu) - 0xD800) << 10)
                            + (u32::from(low) - 0xDC00);
                        self.push_codepoint(cp, want_len);
                    }
                    _ => {
                        // Whatever follows isn't a valid low surrogate;
                        // emit this one as a stray high surrogate and let
                        // the next loop iteration reprocess what follows.
                        let bytes = Self::encode_surrogate(cu);
                        self.push_encoded(&bytes, want_len);
                    }
                }
            } else if (0xDC00..=0xDFFF).contains(&cu) {
                let bytes = Self::encode_surrogate(cu);
                self.push_encoded(&bytes, want_len);
            } else {
                self.push_codepoint(u32::from(cu), want_len);
            }
        }
        Ok(())
    }
}

impl<R: Read> Source for ReaderSource<R> {
    fn fill(&mut self, advance: usize, want_len: usize) -> Result<&[u8]> {
        debug_assert!(advance <= self.out.len());
        self.out.copy_within(advance.., 0);
        self.out.truncate(self.out.len() - advance);

        if self.framing.is_none() {
            self.detect_framing()?;
        }
        let framing = self.framing.unwrap();

        if self.carry_len > 0 {
            let n = self.carry_len as usize;
            let bytes = self.carry;
            self.carry_len = 0;
            self.push_encoded(&bytes[..n], want_len);
        }

        match framing {
            Framing::Utf8 => self.fill_from_utf8(want_len)?,
            Framing::Utf16Le | Framing::Utf16Be => self.fill_from_utf16(framing, want_len)?,
        }

        let take = want_len.min(self.out.len());
        Ok(&self.out[..take])
    }

    fn check_encoding(&self, name: &[u8]) -> bool {
        match self.framing {
            Some(Framing::Utf8) | None => name.eq_ignore_ascii_case(b"UTF-8"),
            Some(Framing::Utf16Le) | Some(Framing::Utf16Be) => name.eq_ignore_ascii_case(b"UTF-16"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn drain<R: Read>(mut src: ReaderSource<R>, step: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let mut advance = 0;
        loop {
            let window = src.fill(advance, step).unwrap().to_vec();
            if window.is_empty() {
                break;
            }
            out.extend_from_slice(&window);
            advance = window.len();
        }
        out
    }

    #[test]
    fn utf8_passthrough() {
        let src = ReaderSource::new(Cursor::new(b"<a>hello</a>".to_vec()));
        assert_eq!(drain(src, 3), b"<a>hello</a>");
    }

    #[test]
    fn utf16_le_bom_is_consumed_and_transcoded() {
        let mut raw = vec![0xFF, 0xFE];
        for u in "<a/>".encode_utf16() {
            raw.extend_from_slice(&u.to_le_bytes());
        }
        let src = ReaderSource::new(Cursor::new(raw));
        assert_eq!(drain(src, 3), b"<a/>");
    }

    #[test]
    fn utf16_be_surrogate_pair_round_trips() {
        let text = "\u{1F600}"; // outside the BMP, needs a surrogate pair
        let mut raw = vec![0xFE, 0xFF];
        for u in text.encode_utf16() {
            raw.extend_from_slice(&u.to_be_bytes());
        }
        let src = ReaderSource::new(Cursor::new(raw));
        let decoded = drain(src, 4);
        assert_eq!(String::from_utf8(decoded).unwrap(), text);
    }

    #[test]
    fn odd_trailing_byte_becomes_invalid_utf8() {
        let raw = vec![0xFF, 0xFE, b'A', 0x00, 0x41]; // BOM, 'A', then one stray byte
        let src = ReaderSource::new(Cursor::new(raw));
        let decoded = drain(src, 8);
        assert!(std::str::from_utf8(&decoded).is_err());
    }

    #[test]
    fn window_splits_never_cut_a_codepoint_in_half() {
        let text = "\u{1F600}\u{1F600}";
        let mut raw = vec![0xFE, 0xFF];
        for u in text.encode_utf16() {
            raw.extend_from_slice(&u.to_be_bytes());
        }
        // Window size of 3 forces a split inside the first 4-byte codepoint.
        let src = ReaderSource::new(Cursor::new(raw));
        let decoded = drain(src, 3);
        assert_eq!(String::from_utf8(decoded).unwrap(), text);
    }
}
