// Output formatting for CLI

use std::io::Write;

use anyhow::Result;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Self {
        match s {
            "json" => OutputFormat::Json,
            "yaml" => OutputFormat::Yaml,
            _ => OutputFormat::Text,
        }
    }

    pub fn print_value<T: Serialize>(&self, value: &T) -> Result<()> {
        match self {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(value)?);
            }
            OutputFormat::Yaml => {
                println!("{}", serde_yaml::to_string(value)?);
            }
            OutputFormat::Text => {
                // Text format is handled by each command
            }
        }
        Ok(())
    }

    pub fn is_text(&self) -> bool {
        matches!(self, OutputFormat::Text)
    }
}

/// Print a simple key-value pair for text output
pub fn print_field(label: &str, value: &str) {
    println!("{:<14} {}", format!("{}:", label), value);
}

/// Print a fragment without a newline and flush so it shows immediately
pub fn print_fragment(fragment: &str) -> Result<()> {
    write_fragment(&mut std::io::stdout(), fragment)
}

fn write_fragment<W: Write>(out: &mut W, fragment: &str) -> Result<()> {
    write!(out, "{}", fragment)?;
    out.flush()?;
    Ok(())
}

/// Echoes streamed fragments from inside an infallible callback.
/// The first write error is kept and later fragments are dropped.
pub struct FragmentEcho<W> {
    out: W,
    error: Option<anyhow::Error>,
}

impl FragmentEcho<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> FragmentEcho<W> {
    pub fn new(out: W) -> Self {
        Self { out, error: None }
    }

    pub fn write(&mut self, fragment: &str) {
        if self.error.is_none() {
            self.error = write_fragment(&mut self.out, fragment).err();
        }
    }

    /// The first write error, if any
    pub fn finish(self) -> Result<()> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Print a table header
pub fn print_table_header(columns: &[(&str, usize)]) {
    let header: String = columns
        .iter()
        .map(|(name, width)| format!("{:<width$}", name, width = width))
        .collect::<Vec<_>>()
        .join("  ");
    println!("{}", header);
}

/// Print a table row
pub fn print_table_row(values: &[(&str, usize)]) {
    let row: String = values
        .iter()
        .map(|(val, width)| format!("{:<width$}", fit(val, *width), width = width))
        .collect::<Vec<_>>()
        .join("  ");
    println!("{}", row);
}

/// Cut a cell to `width` characters, marking the cut with "..."
fn fit(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let keep: String = value.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", keep)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_defaults_to_text() {
        assert_eq!(OutputFormat::from_str("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("yaml"), OutputFormat::Yaml);
        assert!(OutputFormat::from_str("table").is_text());
    }

    struct BrokenPipe {
        attempts: usize,
    }

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            self.attempts += 1;
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_fragment_echo_writes_in_order() {
        let mut echo = FragmentEcho::new(Vec::new());
        echo.write("Hello ");
        echo.write("world");
        assert_eq!(echo.out, b"Hello world");
        assert!(echo.finish().is_ok());
    }

    #[test]
    fn test_fragment_echo_keeps_first_error() {
        let mut echo = FragmentEcho::new(BrokenPipe { attempts: 0 });
        echo.write("one");
        echo.write("two");
        assert_eq!(echo.out.attempts, 1);

        let err = echo.finish().unwrap_err();
        assert!(err.to_string().contains("closed"));
    }

    #[test]
    fn test_fit_is_char_safe() {
        assert_eq!(fit("short", 10), "short");
        assert_eq!(fit("새 대화 제목입니다", 6), "새 대...");
    }
}
