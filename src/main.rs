use std::process;

use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::{filter_fn, Targets};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

use natskv::cli::args::Cli;
use natskv::cli::commands::run;
use natskv::cli::output;
use natskv::cli::CliError;

fn main() {
    let cli = Cli::parse();
    let verbosity = cli.debug;

    if let Err(e) = run(&cli, |trace| setup_logging(verbosity, trace)) {
        fail(e);
    }
}

fn fail(e: CliError) -> ! {
    output::error(&e);
    let mut source = std::error::Error::source(&e);
    while let Some(cause) = source {
        tracing::debug!("caused by: {}", cause);
        source = cause.source();
    }
    process::exit(e.exit_code());
}

fn setup_logging(verbosity: u8, trace: bool) {
    let filter = match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        3 => LevelFilter::TRACE,
        _ => {
            eprintln!("Don't be crazy, max is -d -d -d");
            LevelFilter::TRACE
        }
    };

    // --trace shows every server round trip regardless of -d
    let store_level = if trace { LevelFilter::TRACE } else { filter };
    let targets = Targets::new()
        .with_default(filter)
        .with_target("natskv::infrastructure::nats", store_level);

    let noisy_modules = ["async_nats", "rustls"];
    let module_filter = filter_fn(move |metadata| {
        !noisy_modules
            .iter()
            .any(|name| metadata.target().starts_with(name))
    });

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .with_span_events(FmtSpan::CLOSE);

    let filtered_layer = fmt_layer.with_filter(targets).with_filter(module_filter);

    tracing_subscriber::registry().with(filtered_layer).init();

    match filter {
        LevelFilter::INFO => tracing::info!("Debug mode: info"),
        LevelFilter::DEBUG => tracing::debug!("Debug mode: debug"),
        LevelFilter::TRACE => tracing::debug!("Debug mode: trace"),
        _ => {}
    }
}
