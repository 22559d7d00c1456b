use clap::Parser;
use sip_softphone::sdp::validate_secure_media;
use sip_softphone::{create_registerer, utils, RegistererState, TracingErrorReporter};
use std::sync::Arc;

use tracing::{error, info};

/// SIP Softphone CLI Application
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// SIP server address (e.g., 127.0.0.1:5060)
    #[arg(short, long, env = "SIP_SERVER")]
    server: Option<String>,

    /// SIP username (e.g., 1001 or 1001@example.com)
    #[arg(short, long, env = "SIP_USER")]
    user: Option<String>,

    /// SIP password
    #[arg(short, long, env = "SIP_PASSWORD", default_value = "password")]
    password: String,

    /// Operation mode (register/check-sdp)
    #[arg(short, long, default_value = "register")]
    mode: String,

    /// SDP file to validate in check-sdp mode
    #[arg(long)]
    sdp_file: Option<String>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    utils::initialize_logging(args.log_level.as_str());
    match args.mode.as_str() {
        "register" => run_register_mode(&args).await,
        "check-sdp" => run_check_sdp_mode(&args),
        _ => {
            eprintln!("Invalid mode. Use 'register' or 'check-sdp'");
            Ok(())
        }
    }
}

async fn run_register_mode(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let server = args.server.clone().ok_or("SIP server address is required")?;
    let user = args.user.clone().ok_or("SIP user is required")?;

    info!("Creating registerer for {}: {}", server, user);
    let (endpoint, registerer) =
        create_registerer(&server, &user, &args.password, Arc::new(TracingErrorReporter)).await?;

    registerer.register().await;
    if registerer.state() != RegistererState::Registered {
        error!("Registration did not complete: {:?}", registerer.state());
        endpoint.shutdown();
        return Err("SIP registration failed".into());
    }
    info!("SIP registration completed successfully, press Ctrl+C to exit");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    registerer.unregister().await;
    endpoint.shutdown();
    Ok(())
}

fn run_check_sdp_mode(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let path = args.sdp_file.as_deref().ok_or("--sdp-file is required in check-sdp mode")?;
    let sdp = std::fs::read_to_string(path)?;

    match validate_secure_media(&sdp) {
        Ok(()) => {
            println!("{}: DTLS-SRTP media OK", path);
            Ok(())
        }
        Err(cause) => {
            println!("{}: {}", path, cause);
            Err(format!("insecure SDP: {:?}", cause).into())
        }
    }
}
