//! Merging and capping of captured process output.

pub const TRUNCATION_MARKER: &str = "\n... [output truncated]";

/// Stdout, then stderr on a new line when there is any, trimmed.
pub fn merge_streams(stdout: &str, stderr: &str) -> String {
    let merged = if stderr.is_empty() {
        stdout.to_string()
    } else {
        format!("{}\n{}", stdout, stderr)
    };
    merged.trim().to_string()
}

/// Keeps at most `max_chars` characters and appends [`TRUNCATION_MARKER`]
/// when anything was cut. Returns the text and whether it was cut.
pub fn cap_output(output: String, max_chars: usize) -> (String, bool) {
    match output.char_indices().nth(max_chars) {
        Some((byte_offset, _)) => {
            let mut capped = output[..byte_offset].to_string();
            capped.push_str(TRUNCATION_MARKER);
            (capped, true)
        }
        None => (output, false),
    }
}
