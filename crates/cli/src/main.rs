use bridge_cli::cli::{Cli, Commands};
use bridge_cli::{launch, logging, server};
use clap::Parser;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let result = match &cli.command {
		Commands::Serve(args) => server::run(args).await,
		Commands::Launch(args) => launch::run(args).await,
	};

	if let Err(err) = result {
		eprintln!("error: {err:#}");
		std::process::exit(1);
	}
}
