use std::fs;
use std::io;
use std::path;

use env_logger;
use log;

use ext_line_sort::{ExternalSorter, ExternalSorterBuilder, TopSelector, TournamentMerger};

fn main() {
    env_logger::Builder::new().filter_level(log::LevelFilter::Debug).init();

    let sorter: ExternalSorter = ExternalSorterBuilder::new()
        .with_tmp_dir(path::Path::new("./"))
        .with_buffer_size(100_000)
        .build()
        .unwrap();

    let input_reader = io::BufReader::new(fs::File::open("input.txt").unwrap());
    let summary = sorter.sort(input_reader, path::Path::new("output.txt")).unwrap();
    log::info!("sorted {} lines using {} chunks", summary.records, summary.chunks);

    let mut top = TopSelector::new(3).unwrap();
    top.extend(vec![5, 1, 9, 3, 7]);
    log::info!("top three: {:?}", top.pop_all());

    let sources = vec![vec![1, 4, 7], vec![2, 5], vec![3, 6, 8, 9]];
    let merged: Result<Vec<i32>, io::Error> =
        TournamentMerger::new(sources.into_iter().map(|s| s.into_iter().map(Ok::<_, io::Error>))).collect();
    log::info!("merged: {:?}", merged.unwrap());
}
