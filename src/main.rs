use clap::Parser;
use roomcall_lib::cli::{run, Cli};
use roomcall_lib::logger::log_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run(Cli::parse()).await {
        log_error(&format!("roomcall: {e}"));
        std::process::exit(1);
    }
}
