use clap::Parser;
use webserv_tester::app::cli::{self, SuiteKind};
use webserv_tester::CliConfig;

#[derive(Parser)]
#[command(name = "webserv-tester")]
#[command(about = "Functional test suite for a webserv HTTP server")]
struct Args {
    #[command(flatten)]
    cli: CliConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let exit_code = cli::run(SuiteKind::General, args.cli, "webserv-tester").await;
    if exit_code != 0 {
        std::process::exit(exit_code);
    }

    Ok(())
}
