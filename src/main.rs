use clap::Parser;
use moltguard::{error_message, init_logging, run, Cli};

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(out) => println!("{}", out),
        Err(e) => {
            log::debug!("command failed: {:#}", e);
            println!("ERROR: {}", error_message(&e));
            std::process::exit(1);
        }
    }
}
