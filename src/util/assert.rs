const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Panics with a Firebase-styled internal assertion message when the condition is false.
///
/// Used for invariant violations inside the synchronization core; these point at a bug
/// in the calling layer and are never recoverable.
#[track_caller]
pub fn hard_assert(condition: bool, message: impl AsRef<str>) {
    if !condition {
        hard_fail(message);
    }
}

/// Unconditionally aborts the current operation with an internal assertion message.
#[track_caller]
pub fn hard_fail(message: impl AsRef<str>) -> ! {
    panic!("{}", assertion_error(message));
}

/// Builds the message used when an internal assertion fails.
pub fn assertion_error(message: impl AsRef<str>) -> String {
    format!(
        "Firebase Database ({}) INTERNAL ASSERT FAILED: {}",
        SDK_VERSION,
        message.as_ref()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "INTERNAL ASSERT FAILED")]
    fn hard_assert_panics_on_false() {
        hard_assert(false, "should panic");
    }

    #[test]
    fn hard_assert_passes_on_true() {
        hard_assert(true, "never shown");
    }

    #[test]
    fn assertion_error_formats_message() {
        let err = assertion_error("boom");
        assert!(err.contains("Firebase Database"));
        assert!(err.contains(SDK_VERSION));
        assert!(err.ends_with("boom"));
    }
}
