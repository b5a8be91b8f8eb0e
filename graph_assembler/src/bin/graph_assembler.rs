extern crate clap;
extern crate env_logger;
extern crate graph_assembler;
#[macro_use]
extern crate log;
use clap::{App, Arg};
use graph_assembler::Args;
use std::path::PathBuf;
fn main() {
    let matches = App::new("graph_assembler")
        .version("0.1")
        .author("Bansho Masutani")
        .about("Repeat graph construction and repeat resolution of a draft assembly.")
        .arg(
            Arg::with_name("in_assembly")
                .required(true)
                .index(1)
                .value_name("ASSEMBLY")
                .help("Draft assembly<FASTA>"),
        )
        .arg(
            Arg::with_name("reads_files")
                .required(true)
                .index(2)
                .value_name("READS")
                .help("Comma-separated list of long read files<FASTA>"),
        )
        .arg(
            Arg::with_name("out_folder")
                .required(true)
                .index(3)
                .value_name("OUTPUT_DIRECTORY")
                .help("Output directory"),
        )
        .arg(
            Arg::with_name("config_path")
                .required(true)
                .index(4)
                .value_name("CONFIG")
                .help("Parameters<JSON>"),
        )
        .arg(
            Arg::with_name("kmer")
                .short("k")
                .long("kmer")
                .value_name("KMER")
                .help("k-mer size")
                .default_value(&"15")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("min_overlap")
                .short("v")
                .long("min_overlap")
                .value_name("MIN_OVERLAP")
                .help("Minimum overlap between a read and the graph")
                .default_value(&"5000")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("threads")
                .short("t")
                .long("threads")
                .value_name("THREADS")
                .help("Number of Threads")
                .default_value(&"1")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("log")
                .short("l")
                .long("log")
                .value_name("LOG_FILE")
                .help("Write the log into this file instead of the standard error")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("debug")
                .short("d")
                .long("debug")
                .help("Output debug messages."),
        )
        .arg(
            Arg::with_name("graph_continue")
                .short("g")
                .long("graph_continue")
                .help("Continue contigs through the graph."),
        )
        .arg(
            Arg::with_name("verbose")
                .long("verbose")
                .multiple(true)
                .help("Output debug to the standard error."),
        )
        .get_matches();
    let verbose = match matches.is_present("debug") {
        true => matches.occurrences_of("verbose").max(2),
        false => matches.occurrences_of("verbose"),
    };
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));
    if let Some(file) = matches.value_of("log") {
        match std::fs::File::create(file) {
            Ok(wtr) => {
                builder.target(env_logger::Target::Pipe(Box::new(wtr)));
            }
            Err(why) => {
                eprintln!("{}:{}", why, file);
                std::process::exit(1);
            }
        }
    }
    builder.init();
    let parse = |name: &str| -> usize {
        match matches.value_of(name).and_then(|num| num.parse().ok()) {
            Some(num) => num,
            None => {
                error!("{} should be a non-negative integer", name);
                std::process::exit(1);
            }
        }
    };
    let parameters = (parse("kmer"), parse("min_overlap"), parse("threads"));
    let reads_files: Vec<PathBuf> = matches
        .value_of("reads_files")
        .map(|files| files.split(',').map(PathBuf::from).collect())
        .unwrap_or_default();
    let path_of = |name: &str| matches.value_of(name).map(PathBuf::from).unwrap_or_default();
    let args = Args::new(
        path_of("in_assembly"),
        reads_files,
        path_of("out_folder"),
        Some(path_of("config_path")),
        parameters,
    );
    let mut args = match args {
        Ok(args) => args,
        Err(why) => {
            error!("{}", why);
            std::process::exit(1);
        }
    };
    args.graph_continue = matches.is_present("graph_continue");
    debug!("{:?}", args);
    if let Err(why) = graph_assembler::run(&args) {
        error!("{}", why);
        if why.is_contract_violation() {
            error!("The graph is corrupted. This is a bug.");
        }
        std::process::exit(1);
    }
}
