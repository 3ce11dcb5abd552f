//! Tiny text-layout helpers shared by every [`crate::emitter::Emitter`]
//! impl: indenting a body and joining lines is identical work regardless of
//! target, only the indent unit and brace/colon choice differ.

pub fn indent(lines: &[String], unit: &str) -> Vec<String> {
    lines
        .iter()
        .flat_map(|line| line.split('\n'))
        .map(|line| if line.is_empty() { String::new() } else { format!("{unit}{line}") })
        .collect()
}

pub fn braced_block(lines: &[String], unit: &str) -> String {
    let mut out = String::from(" {\n");
    out.push_str(&indent(lines, unit).join("\n"));
    out.push_str("\n}");
    out
}

pub fn colon_block(lines: &[String], unit: &str) -> String {
    let mut out = String::from(":\n");
    out.push_str(&indent(lines, unit).join("\n"));
    out
}
