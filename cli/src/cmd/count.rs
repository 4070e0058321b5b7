//! `count`: print the number of records in a CSV input.

use serde::Deserialize;
use waka_csv_core::Reader;

use crate::config::{self, Delimiter, Input};
use crate::util::{self, CliResult};

const USAGE: &str = "
Counts the records in a CSV input (excluding the header).

Usage:
    waka-csv count [options] [<input>]
    waka-csv count --help

Options:
    --no-headers           The input has no header row.
    -d, --delimiter <arg>  Field delimiter for reading. [default: ,]
    -h, --help             Display this message.
";

#[derive(Deserialize)]
struct Args {
    arg_input: Option<String>,
    flag_no_headers: bool,
    flag_delimiter: Option<Delimiter>,
}

pub fn run(argv: &[&str]) -> CliResult<()> {
    let args: Args = util::get_args(USAGE, argv)?;
    let input = Input::resolve(args.arg_input.as_deref());
    let opts = config::reader_options(args.flag_delimiter, &input, args.flag_no_headers, false);
    let mut rdr = Reader::open(input.open_source(), opts)?;

    let mut n: u64 = 0;
    while rdr.read()? {
        n += 1;
    }
    println!("{n}");
    Ok(())
}
