use clap::{Args, Parser, Subcommand};

use cairn_datas::DEFAULT_PARALLELISM;
use cairn_remote::DEFAULT_PORT;

#[derive(Parser, Debug)]
#[command(
    name = "cairn",
    about = "cairn - a content-addressed, versioned object database",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve a database over HTTP
    Serve(ServeArgs),
    /// Print the value at a path
    Show(ShowArgs),
    /// Copy an object into a dataset and move its head
    Sync(SyncArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Database to serve; defaults to default_db from .cairnconfig
    #[arg(default_value = "")]
    pub db: String,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Write straight to stdout even on a terminal
    #[arg(long)]
    pub no_pager: bool,
    /// Object to show, e.g. `mem::main` or `./db::#<hash>`
    pub object: String,
}

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Maximum concurrent chunk fetches
    #[arg(short = 'p', long, default_value_t = DEFAULT_PARALLELISM)]
    pub parallelism: usize,
    /// Source object, e.g. `http://host:8000::main`
    pub source: String,
    /// Destination dataset, e.g. `./db::main`
    pub destination: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_defaults() {
        let cli = Cli::try_parse_from(["cairn", "serve"]).unwrap();
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.port, 8000);
        assert_eq!(args.db, "");
    }

    #[test]
    fn serve_with_port_and_db() {
        let cli = Cli::try_parse_from(["cairn", "serve", "--port", "9000", "./db"]).unwrap();
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.port, 9000);
        assert_eq!(args.db, "./db");
    }

    #[test]
    fn sync_parallelism() {
        let cli = Cli::try_parse_from(["cairn", "sync", "a::x", "b::y"]).unwrap();
        let Command::Sync(args) = cli.command else {
            panic!("expected sync");
        };
        assert_eq!(args.parallelism, 512);
        assert_eq!(args.source, "a::x");
        assert_eq!(args.destination, "b::y");

        let cli = Cli::try_parse_from(["cairn", "-v", "sync", "-p", "4", "a::x", "b::y"]).unwrap();
        assert!(cli.verbose);
        let Command::Sync(args) = cli.command else {
            panic!("expected sync");
        };
        assert_eq!(args.parallelism, 4);
    }

    #[test]
    fn show_needs_an_object() {
        assert!(Cli::try_parse_from(["cairn", "show"]).is_err());
        let cli = Cli::try_parse_from(["cairn", "show", "--no-pager", "mem::main"]).unwrap();
        let Command::Show(args) = cli.command else {
            panic!("expected show");
        };
        assert!(args.no_pager);
        assert_eq!(args.object, "mem::main");
    }

    #[test]
    fn sync_needs_two_paths() {
        assert!(Cli::try_parse_from(["cairn", "sync", "a::x"]).is_err());
    }
}
