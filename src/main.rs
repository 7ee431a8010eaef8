use clap::Parser;

use fire_toolkit::cli::{Cli, CliError, Command, execute};
use fire_toolkit::{api, logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level);

    let result = match &cli.command {
        Command::Serve { port } => api::run_http_server(*port)
            .await
            .map(|()| String::new())
            .map_err(CliError::Server),
        command => execute(command),
    };

    match result {
        Ok(out) => {
            if !out.is_empty() {
                print!("{out}");
                if !out.ends_with('\n') {
                    println!();
                }
            }
        }
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
