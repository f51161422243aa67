//! Bounded diagnostics for the `debug` block of a problem document.

use std::backtrace::BacktraceStatus;

use crate::error::ApiError;

/// Symbols of frames recorded while converting a failure into [`ApiError`].
const CONVERSION_FRAMES: [&str; 5] = [
    "std::backtrace",
    "vault_http::error::",
    "anyhow::",
    "core::convert::",
    "core::ops::try_trait::",
];

/// Keep the first `max_lines` lines of `stack` (0 keeps everything).
#[must_use]
pub fn trim_stack(stack: &str, max_lines: usize) -> String {
    if max_lines == 0 {
        return stack.to_owned();
    }
    stack.lines().take(max_lines).collect::<Vec<_>>().join("\n")
}

/// Messages of up to `max_causes` links of the causal chain, the failure
/// itself excluded.
#[must_use]
pub fn collect_causes(failure: &ApiError, max_causes: usize) -> Vec<String> {
    failure
        .chain()
        .skip(1)
        .take(max_causes)
        .map(ToString::to_string)
        .collect()
}

/// Drop the leading frames of a rendered backtrace that belong to the
/// conversion into [`ApiError`], so the trace starts at the failing code.
/// A trace made only of such frames is returned unchanged.
#[must_use]
pub fn skip_conversion_frames(backtrace: &str) -> &str {
    let mut offset = 0;
    for line in backtrace.split_inclusive('\n') {
        if is_frame_header(line) && !CONVERSION_FRAMES.iter().any(|sym| line.contains(sym)) {
            return &backtrace[offset..];
        }
        offset += line.len();
    }
    backtrace
}

/// `"  12: symbol"`, as opposed to the `at file:line` lines under it.
fn is_frame_header(line: &str) -> bool {
    line.trim_start()
        .split_once(':')
        .is_some_and(|(index, _)| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
}

/// `"<name>: <first line of message>"` followed by the captured backtrace, if any.
#[must_use]
pub fn render_stack(error_name: &str, failure: &ApiError) -> String {
    let message = failure.to_string();
    let headline = message.lines().next().unwrap_or_default();
    let mut stack = format!("{error_name}: {headline}");
    let backtrace = failure.backtrace();
    if backtrace.status() == BacktraceStatus::Captured {
        stack.push('\n');
        let rendered = backtrace.to_string();
        stack.push_str(skip_conversion_frames(&rendered).trim_end());
    }
    stack
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    pub error_name: String,
    pub stack: String,
    pub causes: Vec<String>,
}

impl Diagnostics {
    #[must_use]
    pub fn extract(
        failure: &ApiError,
        error_name: &str,
        max_stack_lines: usize,
        max_causes: usize,
    ) -> Self {
        Self {
            error_name: error_name.to_owned(),
            stack: trim_stack(&render_stack(error_name, failure), max_stack_lines),
            causes: collect_causes(failure, max_causes),
        }
    }
}
