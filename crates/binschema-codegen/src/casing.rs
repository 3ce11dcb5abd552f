//! Identifier case conversion shared by every [`crate::emitter::Emitter`]
//! impl. Schema field/type names are free-form strings (`"packet_len"`,
//! `"PacketHeader"`, `"packet-len"`); each target renders them in its own
//! idiomatic casing regardless of how the schema author wrote them.

fn words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch == '_' || ch == '-' || ch == ' ' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(ch);
        prev_lower = ch.is_lowercase() || ch.is_numeric();
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

pub fn pascal_case(name: &str) -> String {
    words(name)
        .into_iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
                None => String::new(),
            }
        })
        .collect()
}

pub fn camel_case(name: &str) -> String {
    let pascal = pascal_case(name);
    let mut chars = pascal.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

pub fn snake_case(name: &str) -> String {
    words(name)
        .into_iter()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}
