use anyhow::Result;
use vcam_bridge::config::ReceiverConfig;
use vcam_bridge::servers::Receiver;
use vcam_bridge::session::TracingReporter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stderr()))
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut conf_file: Option<String> = None;
    let mut socket: Option<String> = None;

    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "--h" | "--?" | "/?" => {
                println!("Usage: vcam_receiver [--conf FILE] [--socket PATH]");
                println!("  VLC_VCAM_SOCKET overrides the socket path from the config file.");
                return Ok(());
            }
            "--conf" => {
                if i + 1 < args.len() {
                    i += 1;
                    conf_file = Some(args[i].clone());
                } else {
                    eprintln!("Error: --conf requires a FILE argument");
                    return Ok(());
                }
            }
            "--socket" => {
                if i + 1 < args.len() {
                    i += 1;
                    socket = Some(args[i].clone());
                } else {
                    eprintln!("Error: --socket requires a PATH argument");
                    return Ok(());
                }
            }
            other => tracing::warn!("[receiver] [unknown_arg] {}", other),
        }
        i += 1;
    }

    let mut config = match &conf_file {
        Some(path) => ReceiverConfig::from_file(path)?,
        None => ReceiverConfig::default(),
    };
    config.apply_env();
    if let Some(path) = socket {
        config.socket_path = path.into();
    }

    let receiver = Receiver::bind(&config)?;
    let mut reporter = TracingReporter;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("[receiver] [signal_failed] {}", e);
            std::future::pending::<()>().await;
        }
    };
    receiver.serve(&mut reporter, shutdown).await;
    Ok(())
}
