use crate::run::{list_cities, run_pipeline, RunArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use permit_hub::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "permit-hub",
    about = "Collect high-value building permits from municipal open-data portals",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Run the pipeline once and print a summary
    Run(RunArgs),
    /// List the configured cities
    Cities,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Serve runs from a recorded JSON snapshot instead of the live portals
    #[arg(long, value_name = "JSON")]
    pub(crate) fixture: Option<std::path::PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Run(args) => run_pipeline(args).await,
        Command::Cities => {
            list_cities();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_accepts_repeated_cities() {
        let cli = Cli::try_parse_from([
            "permit-hub",
            "run",
            "--city",
            "nyc",
            "--city",
            "sf",
            "--force",
        ])
        .expect("arguments parse");

        match cli.command {
            Some(Command::Run(args)) => {
                assert_eq!(args.cities, ["nyc", "sf"]);
                assert!(args.force);
                assert!(args.fixture.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn serve_is_the_default() {
        let cli = Cli::try_parse_from(["permit-hub"]).expect("arguments parse");
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["permit-hub", "serve", "--port", "9090"])
            .expect("arguments parse");
        assert!(matches!(
            cli.command,
            Some(Command::Serve(ServeArgs { port: Some(9090), .. }))
        ));
    }
}
