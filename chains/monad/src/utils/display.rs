use colored::*;
use once_cell::sync::Lazy;
use regex::Regex;

static TOKEN_REGEX: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(0x[a-fA-F0-9]+)|(\d+(\.\d+)?)").ok());

const MSG_LIMIT: usize = 125;

/// Addresses in orange, numbers in yellow.
pub fn colorize_message(msg: &str) -> String {
    let Some(token_regex) = TOKEN_REGEX.as_ref() else {
        return msg.to_string();
    };
    token_regex
        .replace_all(msg, |caps: &regex::Captures| {
            if let Some(addr) = caps.get(1) {
                addr.as_str().truecolor(255, 165, 0).to_string()
            } else {
                caps[0].yellow().to_string()
            }
        })
        .to_string()
}

/// Single line, at most 125 chars.
pub fn clip_message(raw: &str) -> String {
    let flat = raw.replace('\n', " | ");
    if flat.chars().count() > MSG_LIMIT {
        let truncated: String = flat.chars().take(MSG_LIMIT - 3).collect();
        format!("{}...", truncated)
    } else {
        flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_message() {
        assert_eq!(clip_message("a\nb"), "a | b");
        let long = "x".repeat(300);
        let clipped = clip_message(&long);
        assert_eq!(clipped.chars().count(), MSG_LIMIT);
        assert!(clipped.ends_with("..."));
    }

    #[test]
    fn test_colorize_keeps_text() {
        colored::control::set_override(false);
        assert_eq!(colorize_message("sent 0.5 to 0xabc"), "sent 0.5 to 0xabc");
        colored::control::unset_override();
    }
}
