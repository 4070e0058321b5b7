//! `stats`: per-column summary statistics (inferred type, null count, min
//! and max text length, distinct numeric range when the column looks
//! numeric).

use serde::Deserialize;
use waka_csv_core::{Reader, TargetType};

use crate::config::{self, Delimiter, Input};
use crate::util::{self, CliResult};

const USAGE: &str = "
Computes basic per-column statistics for a CSV input.

Usage:
    waka-csv stats [options] [<input>]
    waka-csv stats --help

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

struct ColumnStats {
    name: String,
    count: u64,
    nulls: u64,
    min_len: usize,
    max_len: usize,
    looks_integer: bool,
    looks_float: bool,
    min_f64: f64,
    max_f64: f64,
}

impl ColumnStats {
    fn new(name: String) -> Self {
        ColumnStats {
            name,
            count: 0,
            nulls: 0,
            min_len: usize::MAX,
            max_len: 0,
            looks_integer: true,
            looks_float: true,
            min_f64: f64::INFINITY,
            max_f64: f64::NEG_INFINITY,
        }
    }

    fn observe(&mut self, text: Option<&str>) {
        self.count += 1;
        let Some(text) = text else {
            self.nulls += 1;
            self.looks_integer = false;
            self.looks_float = false;
            return;
        };
        self.min_len = self.min_len.min(text.len());
        self.max_len = self.max_len.max(text.len());
        if self.looks_integer && text.trim().parse::<i64>().is_err() {
            self.looks_integer = false;
        }
        match text.trim().parse::<f64>() {
            Ok(v) if self.looks_float => {
                self.min_f64 = self.min_f64.min(v);
                self.max_f64 = self.max_f64.max(v);
            }
            Ok(_) => {}
            Err(_) => self.looks_float = false,
        }
    }

    fn inferred_type(&self) -> TargetType {
        if self.nulls == self.count {
            TargetType::String
        } else if self.looks_integer {
            TargetType::I64
        } else if self.looks_float {
            TargetType::F64
        } else {
            TargetType::String
        }
    }
}

pub fn run(argv: &[&str]) -> CliResult<()> {
    let args: Args = util::get_args(USAGE, argv)?;
    let input = Input::resolve(args.arg_input.as_deref());
    let opts = config::reader_options(args.flag_delimiter, &input, args.flag_no_headers, false);
    let mut rdr = Reader::open(input.open_source(), opts)?;

    let mut columns: Vec<ColumnStats> = (0..rdr.field_count())
        .map(|i| ColumnStats::new(rdr.name(i).unwrap_or_default().to_string()))
        .collect();

    while rdr.read()? {
        for (i, col) in columns.iter_mut().enumerate() {
            col.observe(rdr.get_string(i));
        }
    }

    println!("field\ttype\tcount\tnulls\tmin_len\tmax_len\tmin\tmax");
    for col in &columns {
        let ty = col.inferred_type();
        let (min, max) = match ty {
            TargetType::I64 | TargetType::F64 if col.count > col.nulls => {
                (format!("{}", col.min_f64), format!("{}", col.max_f64))
            }
            _ => (String::new(), String::new()),
        };
        println!(
            "{}\t{:?}\t{}\t{}\t{}\t{}\t{}\t{}",
            col.name,
            ty,
            col.count,
            col.nulls,
            if col.min_len == usize::MAX { 0 } else { col.min_len },
            col.max_len,
            min,
            max
        );
    }
    Ok(())
}
