//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use remdit_core::Session;

/// Warning printed under every edit URL
pub const SHARE_WARNING: &str = "DO NOT SHARE TO STRANGERS!";

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print the edit URL of a freshly opened session
    pub fn print_session(&self, session: &Session) {
        println!("{}", self.render_session(session));
    }

    fn render_session(&self, session: &Session) -> String {
        match self.format {
            OutputFormat::Human => format!(
                "Edit URL for file {}: {}\n{}",
                session.file_name(),
                session.edit_url,
                SHARE_WARNING
            ),
            OutputFormat::Json => serde_json::json!({
                "file": session.file_path,
                "session_id": session.id,
                "edit_url": session.edit_url,
            })
            .to_string(),
            OutputFormat::Quiet => session.edit_url.clone(),
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remdit_core::ServerDescriptor;
    use std::path::PathBuf;

    fn session() -> Session {
        Session {
            id: "abc123".to_string(),
            edit_url: "http://host/e/abc123".to_string(),
            file_path: PathBuf::from("/home/me/notes.txt"),
            server: ServerDescriptor::new("host"),
        }
    }

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_human_session_output() {
        let out = Output::new(OutputFormat::Human).render_session(&session());
        assert_eq!(
            out,
            "Edit URL for file notes.txt: http://host/e/abc123\nDO NOT SHARE TO STRANGERS!"
        );
    }

    #[test]
    fn test_json_session_output() {
        let out = Output::new(OutputFormat::Json).render_session(&session());
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();

        assert_eq!(value["session_id"], "abc123");
        assert_eq!(value["edit_url"], "http://host/e/abc123");
        assert_eq!(value["file"], "/home/me/notes.txt");
    }

    #[test]
    fn test_quiet_session_output_is_just_the_url() {
        let out = Output::new(OutputFormat::Quiet).render_session(&session());
        assert_eq!(out, "http://host/e/abc123");
    }
}
