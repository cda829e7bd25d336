mod cli;

use clap::Parser;
use cli::Cli;
use snippet_store::logger;

fn main() {
    let cli = Cli::parse();
    let config = cli::config_for(&cli);
    logger::init(config.get_log_level());

    match cli::run(cli, &config) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
