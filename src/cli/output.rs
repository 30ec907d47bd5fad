//! Output formatting for the plugin-base CLI
//!
//! Human mode prints colored, line-oriented text; JSON mode prints one
//! JSON document per call for scripting.

use colored::Colorize;
use serde_json::{json, Value};
use std::io::{self, Write};

/// Outcome of a check as shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Valid,
    Invalid,
}

impl CheckStatus {
    /// Get the colored string representation
    pub fn colored_string(&self) -> String {
        match self {
            CheckStatus::Valid => "ok".green().to_string(),
            CheckStatus::Invalid => "failed".red().bold().to_string(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Valid => "ok",
            CheckStatus::Invalid => "failed",
        }
    }
}

/// Output formatter for different output modes
pub struct OutputFormatter {
    use_color: bool,
    json_mode: bool,
    verbosity: u8,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(use_color: bool, json_mode: bool, verbosity: u8) -> Self {
        // Respect NO_COLOR environment variable
        let use_color = use_color && std::env::var("NO_COLOR").is_err();
        if !use_color {
            colored::control::set_override(false);
        }

        Self {
            use_color,
            json_mode,
            verbosity,
        }
    }

    pub fn is_json(&self) -> bool {
        self.json_mode
    }

    /// Print the status line of a check
    pub fn status(&self, name: &str, status: CheckStatus) {
        if self.use_color {
            println!("{}: [{}]", status.colored_string(), name.bright_white().bold());
        } else {
            println!("{}: [{}]", status.as_str(), name);
        }
    }

    /// Print a JSON document, pretty in human mode
    pub fn document(&self, value: &Value) {
        let rendered = if self.json_mode {
            serde_json::to_string(value)
        } else {
            serde_json::to_string_pretty(value)
        };
        match rendered {
            Ok(text) => println!("{}", text),
            Err(e) => self.error(&format!("Unable to render output: {}", e)),
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.json_mode {
            eprintln!("{}", json!({ "type": "error", "message": message }));
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "ERROR:".red().bold(), message);
        } else {
            eprintln!("ERROR: {}", message);
        }
    }

    /// Print an info message (respects verbosity)
    pub fn info(&self, message: &str) {
        if self.verbosity < 1 || self.json_mode {
            return;
        }

        if self.use_color {
            println!("{} {}", "INFO:".blue(), message);
        } else {
            println!("INFO: {}", message);
        }
    }

    /// Print a list of items
    pub fn list(&self, title: &str, items: &[String]) {
        if self.json_mode {
            println!("{}", json!({ "title": title, "items": items }));
            return;
        }

        if self.use_color {
            println!("{}:", title.bright_white().bold());
        } else {
            println!("{}:", title);
        }

        for item in items {
            if self.use_color {
                println!("  {} {}", "-".bright_black(), item);
            } else {
                println!("  - {}", item);
            }
        }
    }

    /// Flush stdout
    pub fn flush(&self) {
        let _ = io::stdout().flush();
    }
}
