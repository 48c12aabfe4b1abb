use honeytrace::configuration::Cli;
use honeytrace::controller::Controller;
use log::{error, info};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_target(false)
        .init();

    let (cli, matches) = Cli::try_parse_with_sources(std::env::args_os()).unwrap_or_else(|e| e.exit());
    let once = cli.once;

    info!("Importing configuration");
    let config = match cli.into_config(&matches) {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to import configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        "Configuration imported: honeypot '{}' ({}), captures in {}",
        config.honeypot_name,
        config.protocol,
        config.capture_dir.display()
    );

    let controller = match Controller::new(config) {
        Ok(controller) => controller,
        Err(e) => {
            error!("Unable to create a controller instance: {}, exiting...", e);
            std::process::exit(1);
        }
    };

    let result = if once {
        controller.run_once().await.map(|count| {
            info!("Ingested {} session(s)", count);
        })
    } else {
        controller.run(shutdown_signal()).await
    };

    if let Err(e) = result {
        error!("Error occured in the controller process: {}, exiting...", e);
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Unable to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
