/// Decodes the entities the rich text editor leaves in submitted source.
///
/// Only `&lt;`, `&gt;` and `&nbsp;` are decoded, in that order. Anything
/// else, `&amp;` included, is left as typed.
pub fn unescape(source: &str) -> String {
    source
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
}

/// Output equality with line endings normalized and trailing whitespace
/// at the end of the output ignored.
pub fn outputs_match(actual: &str, expected: &str) -> bool {
    normalize_output(actual) == normalize_output(expected)
}

fn normalize_output(output: &str) -> String {
    output.replace("\r\n", "\n").trim_end().to_string()
}
