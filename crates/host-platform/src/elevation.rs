use std::path::Path;

use crate::error::FacilityError;

pub trait ElevationLauncher: Send + Sync {
    /// Whether this OS offers an elevation prompt at all.
    fn supports_elevation(&self) -> bool;

    /// Whether the current process already holds administrator rights.
    fn is_elevated(&self) -> bool;

    /// Start `program` elevated and block until it exits. Returns its exit code when known.
    fn launch_elevated(&self, program: &Path, args: &[String]) -> Result<Option<i32>, FacilityError>;
}

/// Join arguments into a single command line, quoting where needed.
pub fn join_args(args: &[String]) -> String {
    args.iter()
        .map(|arg| quote_arg(arg))
        .collect::<Vec<_>>()
        .join(" ")
}

fn quote_arg(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains(|c: char| c.is_whitespace() || c == '"') {
        return arg.to_string();
    }

    // Backslashes only need doubling when they precede a quote.
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    let mut backslashes = 0;
    for c in arg.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                quoted.extend(std::iter::repeat('\\').take(backslashes * 2 + 1));
                quoted.push('"');
                backslashes = 0;
                continue;
            }
            _ => {}
        }
        if c != '\\' {
            quoted.extend(std::iter::repeat('\\').take(backslashes));
            backslashes = 0;
            quoted.push(c);
        }
    }
    quoted.extend(std::iter::repeat('\\').take(backslashes * 2));
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_join_plain_args() {
        assert_eq!(join_args(&args(&["install", "--start"])), "install --start");
    }

    #[test]
    fn test_join_quotes_whitespace_and_empty() {
        assert_eq!(
            join_args(&args(&["--config-path", r"C:\Program Files\host\config.json", ""])),
            r#"--config-path "C:\Program Files\host\config.json" """#
        );
    }

    #[test]
    fn test_join_escapes_embedded_quotes() {
        assert_eq!(join_args(&args(&[r#"say "hi""#])), r#""say \"hi\"""#);
        assert_eq!(join_args(&args(&[r"dir\ name\"])), r#""dir\ name\\""#);
    }
}
