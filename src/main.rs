use std::cmp::Ordering;
use std::fs;
use std::io::{self, prelude::*};
use std::path;
use std::process;

use bytesize::ByteSize;
use clap::ArgEnum;
use env_logger;
use log;

use ext_line_sort::{ExternalSorter, ExternalSorterBuilder, MergeStrategy, TopSelector};

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    let order: Order = arg_parser.value_of_t_or_exit("sort");
    let numeric = arg_parser.is_present("numeric");
    let compare = move |a: &str, b: &str| {
        let ordering = if numeric { compare_numeric(a, b) } else { a.cmp(b) };
        match order {
            Order::Asc => ordering,
            Order::Desc => ordering.reverse(),
        }
    };

    let input = arg_parser.value_of("input").expect("value is required");
    let output = path::Path::new(arg_parser.value_of("output").expect("value is required"));

    if arg_parser.is_present("top") {
        let count: usize = arg_parser.value_of_t_or_exit("top");
        select_top(input, output, count, compare);
        return;
    }

    let buffer_size: usize = arg_parser.value_of_t_or_exit("buffer");
    let strategy: Strategy = arg_parser.value_of_t_or_exit("merge_strategy");

    let mut sorter_builder = ExternalSorterBuilder::new()
        .with_buffer_size(buffer_size)
        .with_merge_strategy(match strategy {
            Strategy::Pairwise => MergeStrategy::Pairwise,
            Strategy::Tournament => MergeStrategy::Tournament,
        });

    if let Some(tmp_dir) = arg_parser.value_of("tmp_dir") {
        sorter_builder = sorter_builder.with_tmp_dir(path::Path::new(tmp_dir));
    }

    if let Some(rw_buf) = arg_parser.value_of("rw_buf") {
        let rw_buf = rw_buf.parse::<ByteSize>().expect("value is pre-validated").as_u64();
        sorter_builder = sorter_builder.with_rw_buf_size(rw_buf as usize);
    }

    let sorter: ExternalSorter = match sorter_builder.build() {
        Ok(sorter) => sorter,
        Err(err) => {
            log::error!("sorter initialization error: {}", err);
            process::exit(1);
        }
    };

    let input_stream = open_input(input);
    let result = match arg_parser.value_of("merge") {
        Some(other) => sorter.merge_by(input_stream, open_input(other), output, compare),
        None => sorter.sort_by(input_stream, output, compare),
    };

    match result {
        Ok(summary) => log::info!(
            "{} lines written to {} (chunks: {}, merges: {})",
            summary.records,
            output.display(),
            summary.chunks,
            summary.merges
        ),
        Err(err) => {
            log::error!("data sorting error: {}", err);
            process::exit(1);
        }
    }
}

fn open_input(input: &str) -> io::BufReader<fs::File> {
    match fs::File::open(input) {
        Ok(file) => io::BufReader::new(file),
        Err(err) => {
            log::error!("input file {} opening error: {}", input, err);
            process::exit(1);
        }
    }
}

fn select_top(input: &str, output: &path::Path, count: usize, compare: impl Fn(&str, &str) -> Ordering) {
    let mut top = match TopSelector::new_by(count, |a: &String, b: &String| compare(a.as_str(), b.as_str())) {
        Ok(top) => top,
        Err(err) => {
            log::error!("selector initialization error: {}", err);
            process::exit(1);
        }
    };

    for line in open_input(input).lines() {
        match line {
            Ok(line) => {
                top.add(line);
            }
            Err(err) => {
                log::error!("input data stream error: {}", err);
                process::exit(1);
            }
        }
    }

    let mut output_stream = match fs::File::create(output) {
        Ok(file) => io::BufWriter::new(file),
        Err(err) => {
            log::error!("output file creation error: {}", err);
            process::exit(1);
        }
    };

    for line in top.pop_all() {
        if let Err(err) = output_stream.write_all(format!("{}\n", line).as_bytes()) {
            log::error!("data saving error: {}", err);
            process::exit(1);
        };
    }

    if let Err(err) = output_stream.flush() {
        log::error!("data flushing error: {}", err);
        process::exit(1);
    }
}

/// Compares lines as numbers, lines that are not numbers go after numbers in byte-wise order.
fn compare_numeric(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(a), Ok(b)) => a.total_cmp(&b),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ArgEnum>::from_str(s, false)
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum Order {
    Asc,
    Desc,
}

impl Order {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Order::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for Order {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Order as clap::ArgEnum>::from_str(s, false)
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum Strategy {
    Pairwise,
    Tournament,
}

impl Strategy {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Strategy::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Strategy as clap::ArgEnum>::from_str(s, false)
    }
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("ext-line-sort")
        .about("external line sorter")
        .arg(
            clap::Arg::new("input")
                .short('i')
                .long("input")
                .help("file to be sorted")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("output")
                .short('o')
                .long("output")
                .help("result file")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("merge")
                .long("merge")
                .help("sorted file to be merged with the sorted input instead of sorting")
                .takes_value(true)
                .conflicts_with("top"),
        )
        .arg(
            clap::Arg::new("top")
                .long("top")
                .help("write only the given number of highest lines, highest first")
                .takes_value(true)
                .validator(|v| match v.parse::<usize>() {
                    Ok(count) if count > 0 => Ok(()),
                    _ => Err(format!("positive number expected: {}", v)),
                }),
        )
        .arg(
            clap::Arg::new("sort")
                .short('s')
                .long("sort")
                .help("sorting order")
                .takes_value(true)
                .default_value("asc")
                .possible_values(Order::possible_values()),
        )
        .arg(
            clap::Arg::new("numeric")
                .short('n')
                .long("numeric")
                .help("compare lines as numbers"),
        )
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .arg(
            clap::Arg::new("buffer")
                .short('b')
                .long("buffer")
                .help("maximum number of lines held in memory")
                .takes_value(true)
                .default_value("100000")
                .validator(|v| match v.parse::<usize>() {
                    Ok(size) if size > 0 => Ok(()),
                    _ => Err(format!("positive number expected: {}", v)),
                }),
        )
        .arg(
            clap::Arg::new("merge_strategy")
                .short('m')
                .long("merge-strategy")
                .help("chunks merge strategy")
                .takes_value(true)
                .default_value("pairwise")
                .possible_values(Strategy::possible_values()),
        )
        .arg(
            clap::Arg::new("tmp_dir")
                .short('d')
                .long("tmp-dir")
                .help("directory to be used to store temporary data")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("rw_buf")
                .short('r')
                .long("rw-buf")
                .help("chunk file read/write buffer size")
                .takes_value(true)
                .validator(|v| match v.parse::<ByteSize>() {
                    Ok(_) => Ok(()),
                    Err(err) => Err(format!("Buffer size format incorrect: {}", err)),
                }),
        )
        .get_matches()
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}
