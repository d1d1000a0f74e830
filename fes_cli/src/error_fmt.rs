//! Human-readable error descriptions and structured JSON error formatting.

use fes_core::FesError;
use fes_protocol::ProtocolError;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(fe) = err.downcast_ref::<FesError>() {
        return match fe {
            FesError::UnknownState(name) => format!(
                "What happened: A node tried to switch to state '{name}', which is not registered.\nLikely causes: A build defect in the state table.\nHow to fix: Report the log above; the node was stopped on purpose."
            ),
            FesError::NotStarted => {
                "What happened: A node was stepped before its state machine was started.\nLikely causes: A build defect in node construction.\nHow to fix: Report the log above.".to_string()
            }
            FesError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun `fes self-check`."
            ),
            FesError::Timeout => {
                "What happened: A device did not answer in time.\nLikely causes: Load cells unpowered or wired wrong, or gateway.scale_timeout_ms too low.\nHow to fix: Check the wiring and consider raising gateway.scale_timeout_ms.".to_string()
            }
            FesError::Store(msg) => format!(
                "What happened: The parameter store failed ({msg}).\nLikely causes: The store file is not writable or its directory is missing.\nHow to fix: Check [store].path and its permissions."
            ),
            FesError::Hardware(msg) => format!(
                "What happened: Hardware error ({msg}).\nLikely causes: Wrong [pins] values or insufficient GPIO permissions.\nHow to fix: Fix the [pins] section; ensure the process may access GPIO."
            ),
        };
    }

    if let Some(pe) = err.downcast_ref::<ProtocolError>() {
        return format!(
            "What happened: Malformed data ({pe}).\nLikely causes: Peer firmware speaks a different protocol revision.\nHow to fix: Update both nodes to the same release."
        );
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("budget") && lower.contains("exhausted") {
        return format!(
            "What happened: The simulated session did not finish ({msg}).\nLikely causes: --max-ms too small for the configured ramp, transition and hold durations.\nHow to fix: Raise --max-ms or shorten the [session] durations."
        );
    }

    if lower.contains("parameter store") && lower.contains("not valid") {
        return format!(
            "What happened: The parameter store file could not be parsed ({msg}).\nLikely causes: The file was edited by hand or truncated.\nHow to fix: Fix the file, or run `fes params reset` to start over."
        );
    }

    if lower.contains("gpio") || lower.contains("open pin") {
        return "What happened: Failed to initialize the stimulation pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO.".to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 2 configuration, 3 fatal node error, 4 device or store, 1 otherwise.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<FesError>() {
        Some(FesError::Config(_)) => 2,
        Some(fe) if fe.is_fatal() => 3,
        Some(FesError::Hardware(_) | FesError::Timeout | FesError::Store(_)) => 4,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<FesError>() {
        Some(FesError::UnknownState(_)) => "UnknownState",
        Some(FesError::NotStarted) => "NotStarted",
        Some(FesError::Config(_)) => "Config",
        Some(FesError::Timeout) => "Timeout",
        Some(FesError::Store(_)) => "Store",
        Some(FesError::Hardware(_)) => "Hardware",
        None if err.downcast_ref::<ProtocolError>().is_some() => "Protocol",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({ "reason": reason_name(err), "message": humanize(err) }).to_string()
}
