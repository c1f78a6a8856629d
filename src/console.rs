//! Terminal output for the CLI.
//!
//! Colors are used only when stdout is a terminal and `NO_COLOR` is unset.

use std::io::{self, IsTerminal, Write};

#[derive(Debug, Clone, Copy)]
enum Color {
    Red,
    Green,
    Cyan,
    Magenta,
    Gray,
}

impl Color {
    fn code(self) -> &'static str {
        match self {
            Color::Red => "31",
            Color::Green => "32",
            Color::Cyan => "36",
            Color::Magenta => "35",
            Color::Gray => "90",
        }
    }
}

/// CLI output handler.
#[derive(Debug)]
pub struct Console {
    colors_enabled: bool,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    pub fn new() -> Self {
        let colors_enabled = std::env::var("NO_COLOR").is_err() && io::stdout().is_terminal();
        Self { colors_enabled }
    }

    pub fn with_colors(enabled: bool) -> Self {
        Self {
            colors_enabled: enabled,
        }
    }

    fn paint(&self, text: &str, color: Color, bold: bool) -> String {
        if !self.colors_enabled {
            return text.to_string();
        }
        let weight = if bold { "1;" } else { "" };
        format!("\x1b[{}{}m{}\x1b[0m", weight, color.code(), text)
    }

    fn tag(&self, label: &str, color: Color) -> String {
        format!("[{}]", self.paint(label, color, true))
    }

    /// Blank line followed by a bold header.
    pub fn section(&self, title: &str) {
        println!();
        println!("{}", self.paint(title, Color::Magenta, true));
    }

    pub fn step(&self, message: &str) {
        println!("{} {}", self.tag("STEP", Color::Cyan), message);
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", self.tag("OK", Color::Green), message);
    }

    /// Printed to stderr.
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", self.tag("ERROR", Color::Red), message);
    }

    /// One row of the `sources` listing.
    pub fn source_line(&self, name: &str, root_url: &str, online: bool) -> String {
        let status = if online {
            self.paint("online", Color::Green, true)
        } else {
            self.paint("offline", Color::Red, true)
        };
        format!("  {:<16} {} {}", name, self.paint(root_url, Color::Gray, false), status)
    }

    /// One row of the `chapters` listing.
    pub fn chapter_line(&self, chapter: &str, url: &str) -> String {
        format!("{:>8}  {}", chapter, self.paint(url, Color::Gray, false))
    }

    /// Highlighted count for summaries.
    pub fn count(&self, n: usize) -> String {
        self.paint(&n.to_string(), Color::Green, true)
    }

    /// Rewrites the current line with the number of pages saved so far.
    ///
    /// Silent when stdout is not a terminal.
    pub fn page_progress(&self, chapter: &str, pages: usize) {
        if !self.colors_enabled {
            return;
        }
        print!("\r\x1b[2K{} chapter {}: page {}", self.tag("..", Color::Cyan), chapter, pages);
        let _ = io::stdout().flush();
    }

    /// Clears the progress line.
    pub fn finish_progress(&self) {
        if self.colors_enabled {
            print!("\r\x1b[2K");
            let _ = io::stdout().flush();
        }
    }
}
