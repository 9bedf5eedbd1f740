/// Replace `${VAR}` placeholders with values from the process environment.
///
/// Unknown variables and unterminated placeholders are kept verbatim.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

/// Same as [`substitute_env`] with an explicit lookup, for tests.
pub fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };
        let name = &after[..end];
        match lookup(name).filter(|_| !name.is_empty()) {
            Some(value) => output.push_str(&value),
            None => output.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }

    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    fn lookup(name: &str) -> Option<String> {
        match name {
            "DB_PATH" => Some("/srv/beholder.db".into()),
            "NICK" => Some("watcher".into()),
            _ => None,
        }
    }

    #[rstest]
    #[case("url = \"sqlite:${DB_PATH}\"", "url = \"sqlite:/srv/beholder.db\"")]
    #[case("${NICK}-${NICK}", "watcher-watcher")]
    #[case("${MISSING}", "${MISSING}")]
    #[case("${}", "${}")]
    #[case("tail ${NICK", "tail ${NICK")]
    #[case("cost $5 {ok}", "cost $5 {ok}")]
    #[case("", "")]
    fn substitutes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(substitute_env_with(input, lookup), expected);
    }
}
