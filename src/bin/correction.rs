use clap::Parser;
use webserv_tester::app::cli::{self, SuiteKind};
use webserv_tester::CliConfig;

#[derive(Parser)]
#[command(name = "webserv-correction")]
#[command(about = "Evaluation sheet checks for a webserv HTTP server")]
struct Args {
    #[command(flatten)]
    cli: CliConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let exit_code = cli::run(SuiteKind::Correction, args.cli, "webserv-correction").await;
    if exit_code != 0 {
        std::process::exit(exit_code);
    }

    Ok(())
}
