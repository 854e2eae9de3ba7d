use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        let key = k.trim();
        if key.is_empty() {
            return Err(anyhow!("override key cannot be empty: {s}"));
        }
        Ok(Self {
            key: key.to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "sift",
    version,
    about = "Sift: capture tasks now, classify them later"
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "siftrc", global = true)]
    pub siftrc: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Capture a new unclassified task
    Add {
        #[arg(required = true, num_args = 1..)]
        content: Vec<String>,
    },
    /// List tasks, optionally restricted to one category
    List {
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Unclassified tasks waiting longer than the review age
    Review,
    /// Number of tasks
    Count,
    /// Show every field of one task
    Info { id: String },
    /// Move a task into a category
    Move { id: String, category: String },
    /// Replace the content of a task
    Edit {
        id: String,
        #[arg(required = true, num_args = 1..)]
        content: Vec<String>,
    },
    /// Toggle the completed flag
    Done { id: String },
    /// Remove a task
    Delete { id: String },
    /// Set or clear a notification
    Notify {
        id: String,
        #[arg(required_unless_present = "clear", conflicts_with = "clear")]
        when: Option<String>,
        #[arg(long)]
        clear: bool,
    },
    /// Show or change the color theme
    Theme { mode: Option<ThemeArg> },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeArg {
    Dark,
    Light,
    Toggle,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Command, GlobalCli, KeyVal, ThemeArg};

    #[test]
    fn parses_add_with_multiple_words() {
        let cli = GlobalCli::try_parse_from(["sift", "add", "Buy", "milk"]).expect("parse");
        assert_eq!(
            cli.command,
            Some(Command::Add {
                content: vec!["Buy".to_string(), "milk".to_string()]
            })
        );
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = GlobalCli::try_parse_from(["sift", "list", "-vv", "--rc", "review.days=3"])
            .expect("parse");
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.rc_overrides.len(), 1);
        assert_eq!(cli.rc_overrides[0].key, "review.days");
    }

    #[test]
    fn notify_requires_time_or_clear() {
        assert!(GlobalCli::try_parse_from(["sift", "notify", "abc"]).is_err());
        assert!(GlobalCli::try_parse_from(["sift", "notify", "abc", "+1h", "--clear"]).is_err());
        let cli = GlobalCli::try_parse_from(["sift", "notify", "abc", "--clear"]).expect("parse");
        assert_eq!(
            cli.command,
            Some(Command::Notify {
                id: "abc".to_string(),
                when: None,
                clear: true
            })
        );
    }

    #[test]
    fn theme_values() {
        let cli = GlobalCli::try_parse_from(["sift", "theme", "toggle"]).expect("parse");
        assert_eq!(
            cli.command,
            Some(Command::Theme {
                mode: Some(ThemeArg::Toggle)
            })
        );
    }

    #[test]
    fn keyval_requires_equals() {
        assert!("color".parse::<KeyVal>().is_err());
        assert!("=on".parse::<KeyVal>().is_err());
        let kv: KeyVal = "rc.color = off".parse().expect("parse");
        assert_eq!(kv.key, "rc.color");
        assert_eq!(kv.value, "off");
    }
}
