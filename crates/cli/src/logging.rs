use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Compact stderr logging. `RUST_LOG` wins over the verbosity flag.
pub fn init_logging(verbosity: u8) {
	// 0 = lifecycle events only; socket and HTTP internals stay quiet
	let filter = match verbosity {
		0 => "info,hyper=warn,tungstenite=warn,tokio_tungstenite=warn",
		1 => "debug,hyper=info,tungstenite=info,tokio_tungstenite=info",
		_ => "trace",
	};

	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}
