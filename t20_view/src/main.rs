mod parse_args;

use std::process::ExitCode;
use std::time::Instant;

use env_logger::Env;
use log::{error, info, warn};
use t20::{InitOptions, Projectors, RawFile, FRAME_SIZE};

use parse_args::{parse_args, AppArgs};

fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(args.verbosity.filter())).init();

    println!("-- Aiptek T20 demo application --");

    let options = InitOptions {
        read_test: args.read_test,
    };
    let mut projectors = match Projectors::connect(&options) {
        Ok(p) => p,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let ok = run(&mut projectors, &args);

    let labels = projectors.labels();
    let mut clean = true;
    for (label, result) in labels.iter().zip(projectors.shutdown()) {
        if let Err(e) = result {
            error!("{}: shutdown: {}", label, e);
            clean = false;
        }
    }

    if ok && clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn load_sources(args: &AppArgs, devices: usize) -> Vec<RawFile> {
    if args.images.len() != devices {
        warn!(
            "{} image(s) given for {} device(s)",
            args.images.len(),
            devices
        );
    }

    args.images
        .iter()
        .map(|path| match RawFile::load(path) {
            Ok(file) => file,
            Err(e) => {
                warn!("{}: {}, using a black frame", path.display(), e);
                RawFile::blank()
            }
        })
        .collect()
}

/// Returns false if any upload failed along the way.
fn run(projectors: &mut Projectors, args: &AppArgs) -> bool {
    let devices = projectors.len();
    info!("{} device(s) ready", devices);

    let mut sources = load_sources(args, devices);
    let mut ok = all_ok(projectors.upload_round(&mut sources));

    info!("Running performance test with {} frames...", args.frames);
    let start = Instant::now();
    for _ in 0..args.frames {
        ok &= all_ok(projectors.upload_round(&mut sources));
    }
    ok &= all_ok(projectors.wait_all());
    let secs = start.elapsed().as_secs_f64();

    if secs > 0.0 {
        let bytes = args.frames as f64 * FRAME_SIZE as f64 * devices as f64;
        let rate = (bytes / secs) as u64;
        info!(
            "{:.3} seconds, {} bytes/s, {} Mbit/s, {:.2} frames/s per device",
            secs,
            rate,
            (rate * 8) >> 20,
            args.frames as f64 / secs
        );
    }

    ok
}

fn all_ok(results: Vec<t20::Result<()>>) -> bool {
    results.iter().all(|r| r.is_ok())
}
