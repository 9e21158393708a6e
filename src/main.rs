use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use codescan_lib::{
    audio,
    camera::{FrameSource, ImageSequenceSource},
    clock::SystemClock,
    decoder::{Decoder, QrDecoder, SimulatedDecoder},
    init_logging,
    product::{OfflineLookup, OpenFoodFactsClient, ProductLookup},
    storage::SqliteStorage,
    BarcodeFormat, Collaborators, ScanController, ScannerConfig, ScannerEvent,
};
use image::GrayImage;
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser)]
#[command(author, version, about = "Scan barcodes and QR codes, look up products, keep a history")]
struct Args {
    /// Where settings and history are stored
    #[arg(long, default_value = ".codescan")]
    data_dir: PathBuf,
    /// Directory of images replayed as camera frames (QR codes only)
    #[arg(long, conflicts_with = "demo")]
    frames: Option<PathBuf>,
    /// Blank frames with a simulated decoder that reports sample codes
    #[arg(long, default_value_t = false)]
    demo: bool,
    #[arg(long, default_value_t = 7)]
    seed: u64,
    /// Skip scanning and enter this code directly
    #[arg(long)]
    manual: Option<String>,
    /// Format of the manually entered code, e.g. EAN-13 or upc_a
    #[arg(long, default_value = "EAN-13", requires = "manual")]
    format: String,
    /// Never contact the product database
    #[arg(long, default_value_t = false)]
    no_lookup: bool,
    /// Print the stored scan history and exit
    #[arg(long, default_value_t = false)]
    history: bool,
    #[arg(long, default_value_t = false)]
    clear_history: bool,
    #[arg(long, default_value_t = false)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = ScannerConfig::from_env();
    init_logging(config.debug || args.debug);

    log::info!("codescan starting up...");

    std::fs::create_dir_all(&args.data_dir)
        .with_context(|| format!("failed to create {}", args.data_dir.display()))?;
    let storage = SqliteStorage::open(args.data_dir.join("codescan.sqlite3"))?;

    let lookup: Arc<dyn ProductLookup> = if args.no_lookup {
        Arc::new(OfflineLookup)
    } else {
        Arc::new(OpenFoodFactsClient::new(
            config.lookup_base_url.clone(),
            config.lookup_timeout,
        )?)
    };

    let (camera, decoder): (Arc<dyn FrameSource>, Arc<dyn Decoder>) = if args.demo {
        (
            Arc::new(ImageSequenceSource::from_images(vec![GrayImage::new(320, 240)])),
            Arc::new(SimulatedDecoder::demo(args.seed, 10, 30, 3)),
        )
    } else if let Some(dir) = &args.frames {
        (
            Arc::new(ImageSequenceSource::from_dir(dir)?),
            Arc::new(QrDecoder::new()),
        )
    } else {
        (
            Arc::new(ImageSequenceSource::from_paths(Vec::new())),
            Arc::new(QrDecoder::new()),
        )
    };

    let controller = ScanController::open(
        Collaborators {
            camera,
            decoder,
            lookup,
            storage: Arc::new(storage),
            feedback: audio::default_feedback(),
            clock: Arc::new(SystemClock),
        },
        config,
    )
    .await;

    if args.clear_history {
        controller.clear_history().await;
        println!("History cleared");
        return Ok(());
    }

    if args.history {
        let records = controller.history().await;
        if records.is_empty() {
            println!("No scans yet");
        }
        for record in records {
            println!(
                "{}  {:<8} {:<20} {}",
                record.timestamp,
                record.format,
                record.code,
                record.product.as_deref().unwrap_or("-")
            );
        }
        return Ok(());
    }

    if let Some(code) = &args.manual {
        let format: BarcodeFormat = args.format.parse()?;
        controller.submit_manual_code(code, format).await?;
    } else {
        scan_once(&controller).await?;
    }

    controller.await_pending_lookup().await;
    if let Some(current) = controller.current_scan().await {
        println!("{}", serde_json::to_string_pretty(&current)?);
    }
    controller.release_camera().await;

    Ok(())
}

/// Streams until one code is confirmed or the user hits Ctrl-C.
async fn scan_once(controller: &ScanController) -> anyhow::Result<()> {
    if controller.initialize().await.is_empty() {
        anyhow::bail!("no camera: pass --frames <dir>, --demo or --manual <code>");
    }

    let mut events = controller.subscribe();
    controller.request_permission().await?;
    controller.start_scanning().await?;
    println!("Scanning... (Ctrl-C to stop)");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ScannerEvent::ScanConfirmed { record }) => {
                    println!("Confirmed {} ({})", record.code, record.format);
                    print_stats(controller).await;
                    return Ok(());
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => log::warn!("Missed {skipped} scanner event(s)"),
                Err(RecvError::Closed) => anyhow::bail!("scanner shut down"),
            },
            _ = tokio::signal::ctrl_c() => {
                controller.stop_scanning().await;
                print_stats(controller).await;
                anyhow::bail!("scan cancelled");
            }
        }
    }
}

async fn print_stats(controller: &ScanController) {
    let stats = controller.stats().await;
    println!(
        "{} frame(s), {} detection(s) ({} filtered), {:.1} fps",
        stats.frames_processed,
        stats.raw_detections,
        stats.filtered_detections,
        stats.frame_rate(chrono::Utc::now())
    );
}
