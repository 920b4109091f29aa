//! Config command handlers

use anyhow::Result;

use remdit_core::{Config, ServerDescriptor};

use crate::output::{Output, OutputFormat};

const REDACTED: &str = "********";

/// Show current configuration with secrets redacted
pub fn show(config: &Config, output: &Output) -> Result<()> {
    let servers: Vec<ServerDescriptor> = config.servers.iter().map(redact).collect();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "config_file": config.source,
                    "servers": servers,
                    "log_file": config.log_file
                })
            );
        }
        OutputFormat::Quiet => {
            for server in &servers {
                println!("{}", server.addr);
            }
        }
        OutputFormat::Human => {
            println!("Configuration:");
            if servers.is_empty() {
                println!("  servers:  (none)");
            }
            for server in &servers {
                println!("  - addr:      {}", server.addr);
                println!("    transport: {}", server.transport);
                println!(
                    "    key:       {}",
                    server.key.as_deref().unwrap_or("(not set)")
                );
                if server.password.is_some() {
                    println!("    password:  {}", REDACTED);
                }
            }
            println!(
                "  log_file: {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            match config.source {
                Some(ref path) => println!("Config file: {}", path.display()),
                None => println!("Config file: (none, using defaults)"),
            }
        }
    }

    Ok(())
}

/// Copy of `server` with key and password masked
fn redact(server: &ServerDescriptor) -> ServerDescriptor {
    let mut server = server.clone();
    if server.key.is_some() {
        server.key = Some(REDACTED.to_string());
    }
    if server.password.is_some() {
        server.password = Some(REDACTED.to_string());
    }
    server
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_hides_secrets() {
        let server = ServerDescriptor::new("remdit.example.com")
            .with_key("secret")
            .with_password("hunter2");

        let shown = redact(&server);
        assert_eq!(shown.addr, "remdit.example.com");
        assert_eq!(shown.key.as_deref(), Some(REDACTED));
        assert_eq!(shown.password.as_deref(), Some(REDACTED));
    }

    #[test]
    fn test_redact_keeps_unset_secrets_unset() {
        let shown = redact(&ServerDescriptor::new("remdit.example.com"));
        assert!(shown.key.is_none());
        assert!(shown.password.is_none());
    }
}
