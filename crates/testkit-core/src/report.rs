//! Fixed-capacity line formatting for crash reports.
//!
//! Everything here runs inside a signal handler, so no allocation, no locks and
//! no locale: numbers are rendered by hand into a stack buffer which the shim
//! then hands to a single `write(2)`.

use core::fmt;

use crate::config::LINE_PREFIX;
use crate::error::InstallError;
use crate::signal::{FatalSignal, signal_name};

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Stack buffer holding one diagnostic line.
///
/// Pushing past capacity silently truncates and sets [`LineBuf::is_truncated`];
/// [`LineBuf::end_line`] always leaves a trailing newline.
pub struct LineBuf<const N: usize> {
    bytes: [u8; N],
    len: usize,
    truncated: bool,
}

impl<const N: usize> Default for LineBuf<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> LineBuf<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bytes: [0; N],
            len: 0,
            truncated: false,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub const fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn clear(&mut self) {
        self.len = 0;
        self.truncated = false;
    }

    pub fn push_bytes(&mut self, src: &[u8]) -> &mut Self {
        let room = N - self.len;
        let take = src.len().min(room);
        self.bytes[self.len..self.len + take].copy_from_slice(&src[..take]);
        self.len += take;
        if take < src.len() {
            self.truncated = true;
        }
        self
    }

    pub fn push_str(&mut self, s: &str) -> &mut Self {
        self.push_bytes(s.as_bytes())
    }

    pub fn push_u64(&mut self, mut value: u64) -> &mut Self {
        let mut digits = [0u8; 20];
        let mut at = digits.len();
        loop {
            at -= 1;
            digits[at] = b'0' + (value % 10) as u8;
            value /= 10;
            if value == 0 {
                break;
            }
        }
        self.push_bytes(&digits[at..])
    }

    pub fn push_i64(&mut self, value: i64) -> &mut Self {
        if value < 0 {
            self.push_bytes(b"-");
        }
        self.push_u64(value.unsigned_abs())
    }

    /// `0x` followed by a zero-padded, pointer-width lowercase hex value.
    pub fn push_hex(&mut self, value: usize) -> &mut Self {
        const WIDTH: usize = (usize::BITS / 4) as usize;
        let mut digits = [b'0'; WIDTH];
        let mut v = value;
        for slot in digits.iter_mut().rev() {
            *slot = HEX_DIGITS[v & 0xf];
            v >>= 4;
        }
        self.push_bytes(b"0x").push_bytes(&digits)
    }

    /// Terminate the line, overwriting the last byte if the buffer is full.
    pub fn end_line(&mut self) -> &mut Self {
        if N == 0 {
            return self;
        }
        if self.len == N {
            self.bytes[N - 1] = b'\n';
            self.truncated = true;
        } else {
            self.bytes[self.len] = b'\n';
            self.len += 1;
        }
        self
    }
}

impl<const N: usize> fmt::Write for LineBuf<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_str(s);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Report lines
// ---------------------------------------------------------------------------

/// `seghandler: installed handlers for SIGSEGV, SIGABRT, SIGBUS (alternate stack 64 KiB)`
pub fn install_banner<const N: usize>(
    buf: &mut LineBuf<N>,
    signals: &[FatalSignal],
    stack_size: usize,
) {
    buf.clear();
    buf.push_str(LINE_PREFIX).push_str("installed handlers for ");
    for (i, sig) in signals.iter().enumerate() {
        if i > 0 {
            buf.push_str(", ");
        }
        buf.push_str(sig.name());
    }
    buf.push_str(" (alternate stack ")
        .push_u64((stack_size / 1024) as u64)
        .push_str(" KiB)")
        .end_line();
}

/// `seghandler: <error>; continuing without crash handler`
pub fn install_failure<const N: usize>(buf: &mut LineBuf<N>, err: &InstallError) {
    use fmt::Write as _;

    buf.clear();
    buf.push_str(LINE_PREFIX);
    // LineBuf::write_str never fails; overflow truncates.
    let _ = write!(buf, "{err}");
    buf.push_str("; continuing without crash handler").end_line();
}

/// `seghandler: caught SIGNAL 11 (SIGSEGV)`
pub fn header<const N: usize>(buf: &mut LineBuf<N>, signum: i32) {
    buf.clear();
    buf.push_str(LINE_PREFIX)
        .push_str("caught SIGNAL ")
        .push_i64(i64::from(signum))
        .push_str(" (")
        .push_str(signal_name(signum))
        .push_str(")")
        .end_line();
}

/// `seghandler: fault address 0x0000000000000000, si_code 1`
pub fn fault<const N: usize>(buf: &mut LineBuf<N>, addr: usize, si_code: i32) {
    buf.clear();
    buf.push_str(LINE_PREFIX)
        .push_str("fault address ")
        .push_hex(addr)
        .push_str(", si_code ")
        .push_i64(i64::from(si_code))
        .end_line();
}

/// `seghandler: backtrace (12 frames):`, or the unavailable notice for zero.
pub fn frames<const N: usize>(buf: &mut LineBuf<N>, count: usize) {
    buf.clear();
    buf.push_str(LINE_PREFIX);
    if count == 0 {
        buf.push_str("backtrace unavailable");
    } else {
        buf.push_str("backtrace (")
            .push_u64(count as u64)
            .push_str(if count == 1 { " frame):" } else { " frames):" });
    }
    buf.end_line();
}

/// `seghandler: exiting with status 139`
pub fn exiting<const N: usize>(buf: &mut LineBuf<N>, status: i32) {
    buf.clear();
    buf.push_str(LINE_PREFIX)
        .push_str("exiting with status ")
        .push_i64(i64::from(status))
        .end_line();
}

/// Emitted when a fault happens while a report is already being written.
pub fn nested_fault<const N: usize>(buf: &mut LineBuf<N>, signum: i32) {
    buf.clear();
    buf.push_str(LINE_PREFIX)
        .push_str("SIGNAL ")
        .push_i64(i64::from(signum))
        .push_str(" while reporting, giving up")
        .end_line();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LINE_CAPACITY;
    use crate::signal::FATAL_SIGNALS;

    fn text<const N: usize>(buf: &LineBuf<N>) -> &str {
        std::str::from_utf8(buf.as_bytes()).unwrap()
    }

    #[test]
    fn decimal_rendering() {
        let mut b = LineBuf::<64>::new();
        b.push_u64(0).push_str(" ").push_u64(u64::MAX);
        assert_eq!(text(&b), "0 18446744073709551615");

        b.clear();
        b.push_i64(-42).push_str(" ").push_i64(i64::MIN);
        assert_eq!(text(&b), "-42 -9223372036854775808");
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn hex_is_zero_padded() {
        let mut b = LineBuf::<64>::new();
        b.push_hex(0);
        assert_eq!(text(&b), "0x0000000000000000");
        b.clear();
        b.push_hex(0xdead_beef);
        assert_eq!(text(&b), "0x00000000deadbeef");
        b.clear();
        b.push_hex(usize::MAX);
        assert_eq!(text(&b), "0xffffffffffffffff");
    }

    #[test]
    fn overflow_truncates_and_keeps_newline() {
        let mut b = LineBuf::<8>::new();
        b.push_str("abcdefghijkl");
        assert!(b.is_truncated());
        assert_eq!(b.len(), 8);
        b.end_line();
        assert_eq!(text(&b), "abcdefg\n");

        let mut b = LineBuf::<8>::new();
        b.push_str("ab").end_line();
        assert!(!b.is_truncated());
        assert_eq!(text(&b), "ab\n");
    }

    #[test]
    fn header_names_signal_number() {
        let mut b = LineBuf::<LINE_CAPACITY>::new();
        header(&mut b, libc::SIGSEGV);
        let line = text(&b);
        assert!(line.contains(&format!("SIGNAL {}", libc::SIGSEGV)));
        assert!(line.contains("(SIGSEGV)"));
        assert!(line.starts_with(LINE_PREFIX));
        assert!(line.ends_with('\n'));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn fault_line_layout() {
        let mut b = LineBuf::<LINE_CAPACITY>::new();
        fault(&mut b, 0, 1);
        assert_eq!(
            text(&b),
            "seghandler: fault address 0x0000000000000000, si_code 1\n"
        );
        fault(&mut b, 0x1000, -6);
        assert_eq!(
            text(&b),
            "seghandler: fault address 0x0000000000001000, si_code -6\n"
        );
    }

    #[test]
    fn frame_count_lines() {
        let mut b = LineBuf::<LINE_CAPACITY>::new();
        frames(&mut b, 12);
        assert_eq!(text(&b), "seghandler: backtrace (12 frames):\n");
        frames(&mut b, 1);
        assert_eq!(text(&b), "seghandler: backtrace (1 frame):\n");
        frames(&mut b, 0);
        assert_eq!(text(&b), "seghandler: backtrace unavailable\n");
    }

    #[test]
    fn banner_lists_every_signal() {
        let mut b = LineBuf::<LINE_CAPACITY>::new();
        install_banner(&mut b, &FATAL_SIGNALS, 64 * 1024);
        assert_eq!(
            text(&b),
            "seghandler: installed handlers for SIGSEGV, SIGABRT, SIGBUS (alternate stack 64 KiB)\n"
        );
    }

    #[test]
    fn failure_line_renders_error() {
        let mut b = LineBuf::<LINE_CAPACITY>::new();
        install_failure(&mut b, &InstallError::AltStackRegister { errno: 12 });
        assert_eq!(
            text(&b),
            "seghandler: sigaltstack registration failed (errno 12); continuing without crash handler\n"
        );
    }

    #[test]
    fn exit_and_nested_lines() {
        let mut b = LineBuf::<LINE_CAPACITY>::new();
        exiting(&mut b, 139);
        assert_eq!(text(&b), "seghandler: exiting with status 139\n");
        nested_fault(&mut b, 11);
        assert_eq!(text(&b), "seghandler: SIGNAL 11 while reporting, giving up\n");
    }
}
