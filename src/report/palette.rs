//! ANSI styling for the overview
//!
//! Status colors come from the `status` color map of the resource registry.
//! A disabled palette returns every string unchanged.

use crate::resource::get_color_for_value;
use crossterm::style::{Color, Stylize};
use std::io::IsTerminal;

#[derive(Debug, Clone, Copy)]
pub struct Palette {
    enabled: bool,
}

impl Palette {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Colors only when requested, stdout is a terminal and `NO_COLOR` is unset
    pub fn detect(requested: bool) -> Self {
        let no_color = std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty());
        Self::new(requested && !no_color && std::io::stdout().is_terminal())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn bold(&self, text: &str) -> String {
        if self.enabled {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    pub fn accent(&self, text: &str) -> String {
        if self.enabled {
            text.cyan().to_string()
        } else {
            text.to_string()
        }
    }

    pub fn dim(&self, text: &str) -> String {
        if self.enabled {
            text.dark_grey().to_string()
        } else {
            text.to_string()
        }
    }

    /// Color a status word by its meaning (active, transitional, failed)
    pub fn status(&self, text: &str) -> String {
        if !self.enabled {
            return text.to_string();
        }
        match get_color_for_value("status", text.trim().to_ascii_uppercase().as_str()) {
            Some([r, g, b]) => text.with(Color::Rgb { r, g, b }).to_string(),
            None => text.to_string(),
        }
    }
}

/// Remove ANSI SGR sequences (`ESC [ ... m`)
pub fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' && chars.peek() == Some(&'[') {
            chars.next();
            for c in chars.by_ref() {
                if c.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

/// Width of a string as displayed, ignoring escape sequences
pub fn visible_width(text: &str) -> usize {
    strip_ansi(text).chars().count()
}

/// Left-align `text` in `width` visible columns
pub fn pad(text: &str, width: usize) -> String {
    let visible = visible_width(text);
    if visible >= width {
        text.to_string()
    } else {
        format!("{}{}", text, " ".repeat(width - visible))
    }
}
