/// Internal debug logging, routed through the `log` facade under the
/// `beacon` target so consumers can filter SDK diagnostics in one place.
macro_rules! sdk_debug {
    ($($arg:tt)*) => {
        log::debug!(target: "beacon", $($arg)*)
    };
}

/// Internal warning logging for recoverable collaborator failures.
macro_rules! sdk_warn {
    ($($arg:tt)*) => {
        log::warn!(target: "beacon", $($arg)*)
    };
}

/// Internal error logging for configuration errors and callback failures.
macro_rules! sdk_error {
    ($($arg:tt)*) => {
        log::error!(target: "beacon", $($arg)*)
    };
}
