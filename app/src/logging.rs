use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` wins over the verbosity flag.
pub fn init(verbose: bool) {
    let default_level = if verbose { "kudzu=debug,info" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let res = if cfg!(test) {
        builder.compact().with_test_writer().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = res {
        eprintln!("Logging already initialised: {}", e);
    }
}
