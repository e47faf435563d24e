//! Reply normalization.
//!
//! Backends stop on the marker, on a new user line, or when the token budget
//! runs out, and stop sequences are cut from their output. Whatever the
//! cause, a stored reply always ends with exactly one [`STOP_MARKER`].

use recurchat_core::turn::STOP_MARKER;

/// Trim the raw completion and make sure it ends with the stop marker.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.ends_with(STOP_MARKER) {
        trimmed.to_string()
    } else {
        format!("{trimmed} {STOP_MARKER}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_marker_to_bare_reply() {
        assert_eq!(normalize("I am fine"), "I am fine [StopSignal]");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(normalize("  \n I am fine \t\n"), "I am fine [StopSignal]");
    }

    #[test]
    fn keeps_existing_marker() {
        assert_eq!(normalize("Done. [StopSignal]\n"), "Done. [StopSignal]");
    }

    #[test]
    fn empty_completion_becomes_marker() {
        assert_eq!(normalize(""), " [StopSignal]");
        assert_eq!(normalize("   "), " [StopSignal]");
    }

    #[test]
    fn always_ends_with_marker() {
        for raw in ["", "x", "[Stop", "ends with [StopSignal] and more", "\u{3000}wide\u{3000}"] {
            assert!(normalize(raw).ends_with(STOP_MARKER), "input: {raw:?}");
        }
    }

    #[test]
    fn reapplying_does_not_duplicate_marker() {
        for raw in ["", "I am fine", "ok [StopSignal]"] {
            let once = normalize(raw);
            let twice = normalize(&once);
            assert_eq!(twice.matches(STOP_MARKER).count(), 1, "input: {raw:?}");
            assert_eq!(twice.trim(), once.trim());
        }
    }
}
