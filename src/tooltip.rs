//! Wide-string helpers and tooltip fitting.

/// `NOTIFYICONDATAW::szTip` holds 128 UTF-16 units, terminator included.
pub const TOOLTIP_CAPACITY: usize = 128;

pub fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// NUL-terminated UTF-16 form of an OS string. Unpaired surrogates, which
/// Windows file names may contain, pass through unchanged.
#[cfg(windows)]
pub fn to_wide_os(s: &std::ffi::OsStr) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;
    s.encode_wide().chain(std::iter::once(0)).collect()
}

/// Copies `s` into a fixed buffer, truncating so that a NUL always fits.
pub fn copy_wide(dst: &mut [u16], s: &str) {
    if dst.is_empty() {
        return;
    }
    let limit = dst.len() - 1;
    let mut n = 0;
    for (slot, unit) in dst.iter_mut().zip(s.encode_utf16().take(limit)) {
        *slot = unit;
        n += 1;
    }
    dst[n..].fill(0);
}

fn wide_len(s: &str) -> usize {
    s.encode_utf16().count()
}

/// Shortens `text` so that it fits `capacity` UTF-16 units plus a NUL.
///
/// Whole trailing lines go first; a single line that is still too long is
/// cut at a char boundary.
pub fn fit_tooltip(text: &str, capacity: usize) -> String {
    let room = capacity.saturating_sub(1);
    let mut current = text.to_string();
    while wide_len(&current) > room {
        match current.rfind('\r') {
            Some(idx) => current.truncate(idx),
            None => break,
        }
    }
    if wide_len(&current) > room {
        let mut used = 0;
        let mut end = 0;
        for (idx, ch) in current.char_indices() {
            if used + ch.len_utf16() > room {
                break;
            }
            used += ch.len_utf16();
            end = idx + ch.len_utf8();
        }
        current.truncate(end);
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_untouched() {
        assert_eq!(fit_tooltip("Ready", TOOLTIP_CAPACITY), "Ready");
        assert_eq!(fit_tooltip("", TOOLTIP_CAPACITY), "");
    }

    #[test]
    fn drops_trailing_lines_first() {
        let text = "Status: OK\r\nLast sync: 12:00\r\nQueued: 42";
        assert_eq!(fit_tooltip(text, 20), "Status: OK");
        assert_eq!(fit_tooltip(text, 29), "Status: OK\r\nLast sync: 12:00");
    }

    #[test]
    fn long_single_line_is_cut() {
        let text = "x".repeat(300);
        let fitted = fit_tooltip(&text, TOOLTIP_CAPACITY);
        assert_eq!(fitted.len(), TOOLTIP_CAPACITY - 1);
    }

    #[test]
    fn cut_respects_surrogate_pairs() {
        // Each emoji takes two UTF-16 units.
        let text = "\u{1F600}".repeat(10);
        let fitted = fit_tooltip(&text, 6);
        assert_eq!(fitted.chars().count(), 2);
    }

    #[test]
    fn copy_wide_terminates() {
        let mut buf = [0xFFFFu16; 4];
        copy_wide(&mut buf, "abcdef");
        assert_eq!(buf, [b'a' as u16, b'b' as u16, b'c' as u16, 0]);
        copy_wide(&mut buf, "z");
        assert_eq!(buf, [b'z' as u16, 0, 0, 0]);
    }

    #[test]
    fn to_wide_appends_nul() {
        assert_eq!(to_wide("ab"), vec![b'a' as u16, b'b' as u16, 0]);
    }

    #[cfg(windows)]
    #[test]
    fn os_paths_keep_unpaired_surrogates() {
        use std::ffi::OsString;
        use std::os::windows::ffi::OsStringExt;
        use std::path::PathBuf;

        let raw = [0xD800, b'a' as u16, b'.' as u16, b'l' as u16, b'n' as u16, b'k' as u16];
        let path = PathBuf::from(OsString::from_wide(&raw));
        let wide = to_wide_os(path.as_os_str());
        assert_eq!(&wide[..raw.len()], &raw);
        assert_eq!(wide.last(), Some(&0));
        // The lossy display form would have named a different file.
        assert_ne!(to_wide(&path.display().to_string()), wide);
    }
}
