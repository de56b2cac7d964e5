use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stackcraft")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Synthesize dependency-ordered infrastructure plans", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Project config file (defaults to ./stackcraft.toml)
    #[arg(short, long, global = true, env = "STACKCRAFT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Synthesize stacks and write their documents
    Synth(SynthArgs),

    /// Build and validate every stack without writing anything
    Validate,

    /// Show emission order and dependency edges
    Graph(GraphArgs),

    /// Diff the documents on disk against a fresh synthesis
    Diff(DiffArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Synth
// ============================================================================

#[derive(Parser)]
pub struct SynthArgs {
    /// Only write this stack
    #[arg(short, long)]
    pub stack: Option<String>,

    /// Output directory (overrides the config)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

// ============================================================================
// Graph
// ============================================================================

#[derive(Parser)]
pub struct GraphArgs {
    /// Only show this stack
    #[arg(short, long)]
    pub stack: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: GraphFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    /// Numbered emission order with dependencies
    Text,
    /// Graphviz dot
    Dot,
}

// ============================================================================
// Diff
// ============================================================================

#[derive(Parser)]
pub struct DiffArgs {
    /// Only diff this stack
    #[arg(short, long)]
    pub stack: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_graph_format() {
        let cli = Cli::parse_from(["stackcraft", "-vv", "graph", "--format", "dot"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Graph(args) => {
                assert_eq!(args.format, GraphFormat::Dot);
                assert!(args.stack.is_none());
            }
            _ => panic!("expected graph command"),
        }
    }

    #[test]
    fn test_parse_synth_with_output() {
        let cli = Cli::parse_from(["stackcraft", "synth", "--stack", "api", "-o", "out"]);
        match cli.command {
            Command::Synth(args) => {
                assert_eq!(args.stack.as_deref(), Some("api"));
                assert_eq!(args.output, Some(PathBuf::from("out")));
            }
            _ => panic!("expected synth command"),
        }
    }
}
