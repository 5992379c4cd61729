use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{DEFAULT_BACKEND_URL, DEFAULT_HOST, DEFAULT_PORT};
use crate::control::GitEventKind;

/// CLI arguments for tunnelforge
#[derive(Parser, Debug)]
#[command(name = "tunnelforge")]
#[command(about = "TunnelForge - browser terminals backed by a session server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub serve: ServeArgs,

    /// Directory holding the control socket (default: ~/.tunnelforge)
    #[arg(long, env = "TUNNELFORGE_CONTROL_DIR", global = true, value_name = "DIR")]
    pub control_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Gateway options. Accepted with or without the `serve` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = DEFAULT_HOST, global = true)]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT, global = true)]
    pub port: u16,

    /// Base URL of the session backend
    #[arg(long, env = "GO_SERVER_URL", default_value = DEFAULT_BACKEND_URL, global = true, value_name = "URL")]
    pub backend_url: String,

    /// Port clients dial for websockets (default: the backend URL's port)
    #[arg(long, global = true, value_name = "PORT")]
    pub backend_ws_port: Option<u16>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the gateway and control socket (default)
    Serve,

    /// Type a command into a running session
    #[command(visible_alias = "fwd")]
    Forward {
        /// Target session id
        session_id: String,

        /// Command line to send; a newline is appended
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Show whether the server is running
    Status,

    /// Enable follow mode for a branch
    Follow {
        /// Branch to follow (default: the branch checked out in the repository)
        branch: Option<String>,

        /// Repository path (default: current directory)
        #[arg(long, value_name = "PATH")]
        repo: Option<PathBuf>,
    },

    /// Disable follow mode
    Unfollow {
        /// Repository path (default: current directory)
        #[arg(long, value_name = "PATH")]
        repo: Option<PathBuf>,
    },

    /// Notify the server of a repository event (used from git hooks)
    GitEvent {
        /// Kind of event
        #[arg(long = "type", value_enum, default_value = "other")]
        kind: GitEventKind,

        /// Repository path (default: current directory)
        #[arg(long, value_name = "PATH")]
        repo: Option<PathBuf>,
    },

    /// Print version information
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_invocation_serves_with_defaults() {
        let cli = Cli::try_parse_from(["tunnelforge"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn forward_keeps_command_words() {
        let cli = Cli::try_parse_from(["tunnelforge", "fwd", "s1", "ls", "-la", "/tmp"]).unwrap();
        match cli.command {
            Some(Commands::Forward {
                session_id,
                command,
            }) => {
                assert_eq!(session_id, "s1");
                assert_eq!(command, vec!["ls", "-la", "/tmp"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn git_event_kind_parses() {
        let cli =
            Cli::try_parse_from(["tunnelforge", "git-event", "--type", "checkout", "--repo", "/r"])
                .unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::GitEvent {
                kind: GitEventKind::Checkout,
                ..
            })
        ));
    }

    #[test]
    fn serve_accepts_port_after_subcommand() {
        let cli = Cli::try_parse_from(["tunnelforge", "serve", "--port", "4100"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Serve)));
        assert_eq!(cli.serve.port, 4100);
    }
}
