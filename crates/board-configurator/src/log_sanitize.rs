const MAX_LOG_CHARS: usize = 2048;

// Collaborator scripts print colored progress; only the text is worth logging.
pub fn sanitize_log_line(input: &str) -> String {
    let mut out = String::with_capacity(input.len().min(MAX_LOG_CHARS));
    let mut chars = input.chars().peekable();
    let mut kept = 0usize;

    while let Some(c) = chars.next() {
        if c == '\x1b' {
            match chars.next() {
                // CSI: parameters until a final byte in '@'..='~'.
                Some('[') => {
                    for n in chars.by_ref() {
                        if ('@'..='~').contains(&n) {
                            break;
                        }
                    }
                }
                // OSC: until BEL or ESC '\'.
                Some(']') => {
                    while let Some(n) = chars.next() {
                        if n == '\x07' {
                            break;
                        }
                        if n == '\x1b' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                _ => {}
            }
            continue;
        }

        let c = if c == '\t' { ' ' } else { c };
        if c.is_control() {
            continue;
        }
        out.push(c);
        kept += 1;
        if kept >= MAX_LOG_CHARS {
            out.push_str(" ...[truncated]");
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::sanitize_log_line;

    #[test]
    fn strips_color_and_title_sequences() {
        let input = "\u{1b}[32mCreated thing\u{1b}[0m \u{1b}]0;SetupAWS\u{7}demo";
        assert_eq!(sanitize_log_line(input), "Created thing demo");
    }

    #[test]
    fn drops_carriage_returns_and_expands_tabs() {
        assert_eq!(sanitize_log_line("a\tb\r\n"), "a b");
    }

    #[test]
    fn truncates_runaway_lines() {
        let long = "x".repeat(5000);
        let got = sanitize_log_line(&long);
        assert!(got.ends_with("...[truncated]"));
        assert!(got.len() < 2100);
    }
}
