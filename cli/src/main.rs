mod cmd;
mod config;
mod util;

use std::process;

const USAGE: &str = "
waka-csv: a streaming CSV toolkit.

Usage:
    waka-csv <command> [<args>...]
    waka-csv --help
    waka-csv --version

Commands:
    cat       Concatenate CSV inputs.
    count     Count records.
    headers   Print column names.
    stats     Print per-column statistics.

Options:
    -h, --help     Display this message.
    --version      Print version information.
";

fn main() {
    tracing_subscriber::fmt::init();

    let argv: Vec<String> = std::env::args().collect();
    if argv.len() < 2 {
        eprintln!("{}", USAGE.trim());
        process::exit(1);
    }

    let command = argv[1].as_str();
    if command == "--version" {
        println!("waka-csv {}", env!("CARGO_PKG_VERSION"));
        return;
    }
    if command == "--help" || command == "-h" {
        println!("{}", USAGE.trim());
        return;
    }

    let rest: Vec<&str> = argv[1..].iter().map(String::as_str).collect();
    let result = match command {
        "cat" => cmd::cat::run(&rest),
        "count" => cmd::count::run(&rest),
        "headers" => cmd::headers::run(&rest),
        "stats" => cmd::stats::run(&rest),
        other => {
            eprintln!("unknown command '{other}'");
            eprintln!("{}", USAGE.trim());
            process::exit(1);
        }
    };

    if let Err(err) = result {
        tracing::error!(error = %err, "command failed");
        eprintln!("error: {err}");
        process::exit(1);
    }
}
