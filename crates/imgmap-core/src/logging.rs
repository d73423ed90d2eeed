/// Initialize `env_logger`. `RUST_LOG` wins when set; otherwise `info`, or `debug` when
/// `verbose` is requested.
pub fn init(verbose: bool) {
    let default_level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(default_level);
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }
    // A second init (tests, embedding callers) keeps the first logger.
    let _ = builder.try_init();
}
