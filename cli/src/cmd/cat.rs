//! `cat`: concatenate one or more CSV inputs onto stdout, re-serialized
//! through the writer (so delimiter/quoting normalize even if the inputs
//! differ).

use std::io;

use serde::Deserialize;
use waka_csv_core::{Reader, Writer, WriterOptions};

use crate::config::{self, Delimiter, Input};
use crate::util::{self, CliResult};

const USAGE: &str = "
Concatenates CSV files by row, writing the result to stdout. All inputs
must share a header row.

Usage:
    waka-csv cat [options] [<input>...]
    waka-csv cat --help

Options:
    --no-headers           The inputs have no header row.
    --flexible             Pad or truncate records that disagree with arity.
    -d, --delimiter <arg>  Field delimiter for reading. [default: ,]
    -h, --help             Display this message.
";

#[derive(Deserialize)]
struct Args {
    arg_input: Vec<String>,
    flag_no_headers: bool,
    flag_flexible: bool,
    flag_delimiter: Option<Delimiter>,
}

pub fn run(argv: &[&str]) -> CliResult<()> {
    let args: Args = util::get_args(USAGE, argv)?;
    let inputs: Vec<Input> = if args.arg_input.is_empty() {
        vec![Input::Stdin]
    } else {
        args.arg_input.iter().map(|s| Input::resolve(Some(s))).collect()
    };

    let mut wtr = Writer::new(io::stdout(), WriterOptions::builder().build())?;
    let mut header_written = false;

    for input in inputs {
        let opts = config::reader_options(args.flag_delimiter, &input, args.flag_no_headers, args.flag_flexible);
        let mut rdr = Reader::open(input.open_source(), opts)?;
        if !header_written {
            let names: Vec<String> = (0..rdr.field_count())
                .map(|i| rdr.name(i).unwrap_or_default().to_string())
                .collect();
            wtr.write_header(&names)?;
            header_written = true;
        }
        while rdr.read()? {
            let row: Vec<Option<String>> = (0..rdr.field_count())
                .map(|i| rdr.get_string(i).map(str::to_string))
                .collect();
            wtr.write_record(&row)?;
        }
    }
    wtr.flush()?;
    Ok(())
}
