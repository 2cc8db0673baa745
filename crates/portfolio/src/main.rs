/// CLI module - command-line interface for portfolio
mod cli;

fn main() {
    cli::run_cli();
}
