//! CLI command definitions

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for a finished task
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// The whole discussion, synthesis and statistics
    Full,
    /// Only the final synthesis
    Synthesis,
    /// The task record as JSON
    Json,
}

/// CLI arguments for council
#[derive(Parser, Debug)]
#[command(name = "council")]
#[command(author, version, about = "Specialist council - several LLM specialists discuss one question")]
#[command(long_about = r#"
Council runs a group of specialists against one question. Each specialist
decides on its own when it has something worth adding; a moderator turns the
discussion into a final answer.

Configuration files are loaded from (in priority order):
1. COUNCIL_* environment variables (COUNCIL_DISCUSSION__MAX_ROUNDS=5)
2. --config <path>     Explicit config file
3. ./council.toml      Project-level config
4. ~/.config/council/config.toml   Global config

Example:
  council ask "Should we shard the orders table?"
  council ask -s Critical -s Quantifier "Is a 99.99% SLO realistic here?"
  council submit --session team "Which queue should we adopt?"
  council worker --session team
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress live progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// SQLite database for tasks and rate-limit buckets
    #[arg(long, value_name = "PATH", global = true)]
    pub database: Option<PathBuf>,
}

/// What to ask the council
#[derive(clap::Args, Debug, Clone)]
pub struct QuestionArgs {
    /// The question for the specialists
    pub question: String,

    /// Specialists to assign (repeatable; default: the whole roster)
    #[arg(short, long = "specialist", value_name = "ID")]
    pub specialists: Vec<String>,

    /// Background context passed to every specialist
    #[arg(long)]
    pub context: Option<String>,

    /// Session the task belongs to
    #[arg(long, default_value = "default")]
    pub session: String,

    /// Recorded as the task creator
    #[arg(long, default_value = "cli")]
    pub creator: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit a question and run the discussion in this process
    Ask {
        #[command(flatten)]
        question: QuestionArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "synthesis")]
        output: OutputFormat,
    },

    /// Queue a question for a worker and print its task id
    Submit {
        #[command(flatten)]
        question: QuestionArgs,
    },

    /// Process pending tasks of a session
    Worker {
        /// Session to serve (default: [worker] session)
        #[arg(long)]
        session: Option<String>,

        /// Exit once the queue is empty instead of polling forever
        #[arg(long)]
        drain: bool,
    },

    /// Show the state of a task
    Status {
        /// Task id printed by `submit`
        task_id: String,

        /// Only show contributions after this log version
        #[arg(long, value_name = "VERSION")]
        since: Option<u64>,

        /// Keep polling until the task finishes
        #[arg(short, long)]
        follow: bool,

        /// Output format once the task is finished
        #[arg(short, long, value_enum, default_value = "full")]
        output: OutputFormat,
    },

    /// List tasks of a session
    List {
        #[arg(long, default_value = "default")]
        session: String,
    },

    /// Show persisted rate-limit buckets
    Limits,

    /// Check that the configured providers answer
    Health,

    /// Show configuration sources and validation results
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn ask_with_specialists() {
        let cli = Cli::parse_from([
            "council",
            "-vv",
            "ask",
            "-s",
            "Critical",
            "--specialist",
            "Quantifier",
            "Is this realistic?",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Ask { question, output } => {
                assert_eq!(question.question, "Is this realistic?");
                assert_eq!(question.specialists, vec!["Critical", "Quantifier"]);
                assert_eq!(question.session, "default");
                assert_eq!(output, OutputFormat::Synthesis);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn status_since_version() {
        let cli = Cli::parse_from([
            "council",
            "status",
            "6f1c1b8e-2f59-4d43-9d2a-3f1f0f9c1a77",
            "--since",
            "4",
            "--follow",
        ]);
        match cli.command {
            Command::Status { since, follow, .. } => {
                assert_eq!(since, Some(4));
                assert!(follow);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
