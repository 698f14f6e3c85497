//! Name helpers.

/// Bump the trailing number of a name: `x` becomes `x2`, `x2` becomes `x3`
pub fn increment_variable_name(name: &str) -> String {
    let stem = name.trim_end_matches(|c: char| c.is_ascii_digit());
    let number = name[stem.len()..].parse::<u64>().unwrap_or(1);
    format!("{}{}", stem, number + 1)
}

/// `name`, or its next increment that no entry of `taken` uses
pub fn unique_name(name: &str, taken: &[String]) -> String {
    let mut candidate = name.to_string();
    while taken.iter().any(|t| t == &candidate) {
        candidate = increment_variable_name(&candidate);
    }
    candidate
}
