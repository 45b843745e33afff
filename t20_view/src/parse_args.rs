use std::path::PathBuf;

const HELP: &str = "\
t20_view - Aiptek T20 demo and benchmark

Uploads one raw 640x480 BGR image to every connected projector, then
streams it repeatedly and reports the throughput.

USAGE:
  t20_view [OPTIONS] [IMAGE...]

  Images are assigned to projectors in bus order. Projectors without an
  image get a black frame.

OPTIONS:
  -h, --help            Prints help information
  -n, --frames <N>      Frames per projector in the benchmark (default: 250)
  --read-test           Read and dump two sectors during setup
  -v, --verbose         Show debug output
  -vv, --trace          Show every USB command
";

pub const DEFAULT_FRAMES: u32 = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Normal,
    Verbose,
    Trace,
}

impl Verbosity {
    pub fn filter(&self) -> &'static str {
        match self {
            Verbosity::Normal => "info",
            Verbosity::Verbose => "debug",
            Verbosity::Trace => "trace",
        }
    }
}

#[derive(Debug)]
pub struct AppArgs {
    pub images: Vec<PathBuf>,
    pub frames: u32,
    pub read_test: bool,
    pub verbosity: Verbosity,
}

pub fn parse_args() -> Result<AppArgs, pico_args::Error> {
    let mut pargs = pico_args::Arguments::from_env();

    if pargs.contains(["-h", "--help"]) {
        print!("{}", HELP);
        std::process::exit(0);
    }

    let verbosity = if pargs.contains("--trace") || pargs.contains("-vv") {
        Verbosity::Trace
    } else if pargs.contains(["-v", "--verbose"]) {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    };

    let frames = pargs
        .opt_value_from_str(["-n", "--frames"])?
        .unwrap_or(DEFAULT_FRAMES);
    let read_test = pargs.contains("--read-test");

    let images = pargs
        .finish()
        .into_iter()
        .map(PathBuf::from)
        .collect();

    Ok(AppArgs {
        images,
        frames,
        read_test,
        verbosity,
    })
}
