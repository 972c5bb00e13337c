//! Client-facing text conventions: line wrapping, warnings and the connect counter.

pub const CRLF: &str = "\r\n";

const WARNING_COLOR: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Moves the cursor back over the previous counter value ("9.9" is three cells wide).
const COUNTER_ERASE: &str = "\x08\x08\x08";

pub fn wrap_with_line_feed(text: &str, before: usize, after: usize) -> String {
    let mut out = String::with_capacity(text.len() + (before + after) * CRLF.len());
    for _ in 0..before {
        out.push_str(CRLF);
    }
    out.push_str(text);
    for _ in 0..after {
        out.push_str(CRLF);
    }
    out
}

pub fn wrap_with_warning(text: &str) -> String {
    format!("{WARNING_COLOR}{text}{RESET}")
}

/// A warning on its own line, the shape of every failure notice sent before a session exists.
pub fn warning_line(text: &str) -> String {
    wrap_with_line_feed(&wrap_with_warning(text), 1, 0)
}

pub fn connecting_banner(account: &str, target: &str) -> String {
    format!("Connecting to {account}@{target} {:.1}", 0.0)
}

pub fn counter_update(elapsed_secs: f64) -> String {
    format!("{COUNTER_ERASE}{elapsed_secs:.1}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_feeds_wrap_both_sides() {
        assert_eq!(wrap_with_line_feed("x", 1, 2), "\r\nx\r\n\r\n");
        assert_eq!(wrap_with_line_feed("x", 0, 0), "x");
    }

    #[test]
    fn warning_line_starts_on_fresh_line() {
        let line = warning_line("No permission");
        assert!(line.starts_with(CRLF));
        assert!(line.contains("No permission"));
        assert!(line.ends_with(RESET));
    }

    #[test]
    fn counter_formats_one_decimal() {
        assert_eq!(connecting_banner("root", "web01"), "Connecting to root@web01 0.0");
        assert_eq!(counter_update(0.30000000000000004), "\x08\x08\x080.3");
        assert_eq!(counter_update(9.9), "\x08\x08\x089.9");
    }
}
