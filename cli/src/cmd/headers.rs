//! `headers`: print the resolved column names, one per line.

use serde::Deserialize;
use waka_csv_core::Reader;

use crate::config::{self, Delimiter, Input};
use crate::util::{self, CliResult};

const USAGE: &str = "
Prints the header row of a CSV input.

Usage:
    waka-csv headers [options] [<input>]
    waka-csv headers --help

Options:
    --just-count           Print only the number of columns.
    --no-headers           Treat the input as headerless; print synthesized names.
    -d, --delimiter <arg>  Field delimiter for reading. [default: ,]
    -h, --help             Display this message.
";

#[derive(Deserialize)]
struct Args {
    arg_input: Option<String>,
    flag_just_count: bool,
    flag_no_headers: bool,
    flag_delimiter: Option<Delimiter>,
}

pub fn run(argv: &[&str]) -> CliResult<()> {
    let args: Args = util::get_args(USAGE, argv)?;
    let input = Input::resolve(args.arg_input.as_deref());
    let opts = config::reader_options(args.flag_delimiter, &input, args.flag_no_headers, false);
    let rdr = Reader::open(input.open_source(), opts)?;

    if args.flag_just_count {
        println!("{}", rdr.field_count());
        return Ok(());
    }
    for i in 0..rdr.field_count() {
        println!("{}\t{}", i + 1, rdr.name(i).unwrap_or_default());
    }
    Ok(())
}
