use supports_color::Stream;

/// Prefixed, optionally colored terminal output.
#[derive(Debug, Clone, Copy)]
pub struct Printer {
    pub use_color: bool,
}

impl Printer {
    pub fn new() -> Self {
        Self {
            use_color: supports_color::on(Stream::Stdout).is_some(),
        }
    }

    /// Colorless printer for tests and non-terminal output.
    pub fn plain() -> Self {
        Self { use_color: false }
    }

    pub fn success(&self, message: &str) {
        self.print_prefix("[+]", "green", message);
    }

    pub fn error(&self, message: &str) {
        self.print_prefix("[-]", "red", message);
    }

    pub fn warning(&self, message: &str) {
        self.print_prefix("[!]", "yellow", message);
    }

    pub fn info(&self, message: &str) {
        self.print_prefix("[?]", "cyan", message);
    }

    pub fn header(&self, title: &str) {
        if self.use_color {
            println!("\n\x1b[1;36m{}\x1b[0m", title);
            println!("\x1b[90m{}\x1b[0m", "─".repeat(title.len()));
        } else {
            println!("\n{}", title);
            println!("{}", "─".repeat(title.len()));
        }
    }

    pub fn print_key_value(&self, key: &str, value: &str, indent: usize) {
        let indent_str = " ".repeat(indent);
        if self.use_color {
            println!("{}\x1b[1m{}:\x1b[0m {}", indent_str, key, value);
        } else {
            println!("{}{}: {}", indent_str, key, value);
        }
    }

    fn print_prefix(&self, prefix: &str, color: &str, message: &str) {
        if self.use_color {
            let color_code = match color {
                "green" => "\x1b[32m",
                "red" => "\x1b[31m",
                "yellow" => "\x1b[33m",
                "cyan" => "\x1b[36m",
                _ => "\x1b[0m",
            };
            println!("{}{}\x1b[0m {}", color_code, prefix, message);
        } else {
            println!("{} {}", prefix, message);
        }
    }
}

impl Default for Printer {
    fn default() -> Self {
        Self::new()
    }
}
