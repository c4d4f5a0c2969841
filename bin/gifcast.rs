#![forbid(unsafe_code)]
use std::io::{Read, Write};
use std::path::PathBuf;
use std::{env, ffi, fs, io};

use gifcast::encode::compress;
use gifcast::frame::{Broadcast, Delay, Encoder};
use log::info;

fn main() -> CodingResult {
    env_logger::init();
    CodingResult::catch_panic(|| {
        let flags = Flags::from_args(env::args_os())?;
        run_coding(flags)
    })
}

fn run_coding(flags: Flags) -> Result<(), io::Error> {
    let file = match &flags.output {
        Output::File(path) => Some(fs::File::create(path)?),
        Output::Stdout => None,
    };
    let mut broadcast = Broadcast::new();
    match &file {
        Some(file) => broadcast.subscribe(io::BufWriter::new(file)),
        None => broadcast.subscribe(io::BufWriter::new(io::stdout())),
    };

    match flags.operation {
        Operation::Gif {
            width,
            height,
            delay,
        } => {
            let mut encoder = Encoder::new(width, height)?;
            let mut stream = encoder.into_stream(&mut broadcast);
            stream.begin()?;
            for input in &flags.files {
                let rgba = read_input(input)?;
                info!("encoding {:?}, {} bytes", input, rgba.len());
                stream.add_frame(&rgba, delay)?;
            }
            stream.end()?;
        }
        Operation::Lzw { min_code } => {
            for input in &flags.files {
                let indices = read_input(input)?;
                let blocks = compress(min_code, &indices)?;
                broadcast.write_all(&[min_code])?;
                broadcast.write_all(&blocks)?;
            }
            broadcast.flush()?;
        }
    }

    Ok(())
}

fn read_input(input: &Input) -> Result<Vec<u8>, io::Error> {
    let mut data = vec![];
    match input {
        Input::File(path) => {
            fs::File::open(path)?.read_to_end(&mut data)?;
        }
        Input::Stdin => {
            io::stdin().lock().read_to_end(&mut data)?;
        }
    }
    Ok(data)
}

struct Flags {
    files: Vec<Input>,
    operation: Operation,
    output: Output,
}

#[derive(Debug)]
enum Input {
    File(PathBuf),
    Stdin,
}

enum Output {
    File(PathBuf),
    Stdout,
}

enum Operation {
    Gif { width: u32, height: u32, delay: Delay },
    Lzw { min_code: u8 },
}

fn command() -> clap::Command {
    clap::Command::new("gifcast")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Encode raw RGBA frames into an animated GIF")
        .arg(
            clap::Arg::new("width")
                .short('W')
                .long("width")
                .value_parser(clap::value_parser!(u32))
                .required_unless_present("lzw"),
        )
        .arg(
            clap::Arg::new("height")
                .short('H')
                .long("height")
                .value_parser(clap::value_parser!(u32))
                .required_unless_present("lzw"),
        )
        .arg(
            clap::Arg::new("delay")
                .short('d')
                .long("delay")
                .help("Frame delay in milliseconds")
                .default_value("100")
                .value_parser(clap::value_parser!(f64)),
        )
        .arg(
            clap::Arg::new("lzw")
                .long("lzw")
                .help("Only compress index bytes with this minimum code size")
                .value_parser(clap::value_parser!(u8).range(2..=8))
                .conflicts_with_all(["width", "height"]),
        )
        .arg(
            clap::Arg::new("output")
                .short('o')
                .long("output")
                .default_value("-")
                .value_parser(clap::builder::ValueParser::path_buf()),
        )
        .arg(
            clap::Arg::new("file")
                .help("Raw frame files, one per frame, or '-' for stdin")
                .action(clap::ArgAction::Append)
                .default_value("-")
                .value_parser(clap::builder::ValueParser::path_buf()),
        )
}

impl Flags {
    fn from_args(args: impl Iterator<Item = ffi::OsString>) -> Result<Self, io::Error> {
        let matches = command().get_matches_from(args);

        let operation = match matches.get_one::<u8>("lzw") {
            Some(&min_code) => Operation::Lzw { min_code },
            None => {
                let millis = matches.get_one::<f64>("delay").copied().unwrap_or(100.0);
                Operation::Gif {
                    width: matches.get_one::<u32>("width").copied().unwrap_or(0),
                    height: matches.get_one::<u32>("height").copied().unwrap_or(0),
                    delay: Delay::from_millis(millis)?,
                }
            }
        };

        let stdin = PathBuf::from("-");
        let files = matches
            .get_many::<PathBuf>("file")
            .into_iter()
            .flatten()
            .map(|p| if *p == stdin { Input::Stdin } else { Input::File(p.clone()) })
            .collect();

        let output = match matches.get_one::<PathBuf>("output") {
            Some(p) if *p != stdin => Output::File(p.clone()),
            _ => Output::Stdout,
        };

        Ok(Flags {
            files,
            operation,
            output,
        })
    }
}

enum CodingResult {
    Ok,
    Err(io::Error),
    Panic,
}

impl CodingResult {
    fn catch_panic(op: fn() -> Result<(), io::Error>) -> Self {
        std::panic::catch_unwind(|| match op() {
            Ok(()) => CodingResult::Ok,
            Err(err) => CodingResult::Err(err),
        })
        .unwrap_or(CodingResult::Panic)
    }
}

impl std::process::Termination for CodingResult {
    fn report(self) -> std::process::ExitCode {
        match self {
            CodingResult::Ok => std::process::ExitCode::SUCCESS,
            CodingResult::Err(err) => {
                eprintln!("{}", err);
                std::process::ExitCode::FAILURE
            }
            CodingResult::Panic => {
                eprintln!(
                    "The process failed irrecoverably! This should never happen and is a bug."
                );
                std::process::ExitCode::from(128)
            }
        }
    }
}
