use card_assets::{AssetError, AssetManager, AssetsConfig, Category, RefreshOutcome, ThumbnailShape};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Fetch and inspect card asset bundles
#[derive(Debug, Parser)]
#[command(name = "card-assets", version)]
struct Cli {
    /// Remote origin serving AssetsInfo.json and the bundles
    #[arg(long, env = "CARD_ASSETS_ORIGIN")]
    origin: Option<String>,

    /// Local data directory
    #[arg(long, env = "CARD_ASSETS_DIR")]
    data_dir: Option<PathBuf>,

    /// Refresh the manifest even if the daily gate says it is current
    #[arg(long)]
    force_refresh: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Refresh and print the manifest
    Manifest {
        /// Print the raw JSON document
        #[arg(long)]
        json: bool,
    },
    /// Load bundles for the given categories and report what they contain
    Select {
        #[arg(long)]
        faces: Option<String>,
        #[arg(long)]
        back: Option<String>,
        #[arg(long)]
        background: Option<String>,
    },
    /// Download the preview image of a bundle
    Thumbnail {
        bundle: String,
        /// Use the separate `<bundle>thumb` preview bundle
        #[arg(long)]
        separate: bool,
        /// Preview asset to decode instead of the first image
        #[arg(long)]
        asset: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = AssetsConfig::from_env();
    if let Some(origin) = cli.origin {
        config.origin = origin;
    }
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    let manager = match AssetManager::open(config) {
        Ok(manager) => manager,
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = if cli.force_refresh {
        manager.refresh_manifest_now().await
    } else {
        manager.refresh_manifest().await
    };
    if let RefreshOutcome::Failed(e) = &outcome {
        eprintln!("⚠️  Using cached manifest: {e}");
    }

    let result = match cli.command {
        Command::Manifest { json } => {
            let manifest = manager.manifest().manifest();
            if json {
                manifest
                    .to_json()
                    .map(|json| println!("{json}"))
                    .map_err(AssetError::from)
            } else {
                for category in Category::ALL {
                    println!("{category}: {}", manifest.bundles(category).join(", "));
                }
                Ok(())
            }
        }
        Command::Select { faces, back, background } => {
            let requested = [
                (Category::CardFaces, faces),
                (Category::CardBack, back),
                (Category::Background, background),
            ];
            let mut result = Ok(());
            for (category, bundle) in requested {
                let Some(bundle) = bundle else { continue };
                match manager.select(category, &bundle).await {
                    Ok(set) => println!("✅ {category} '{bundle}': {} sprites", set.len()),
                    Err(e) => {
                        eprintln!("❌ {category} '{bundle}': {e}");
                        result = Err(e);
                    }
                }
            }
            if let Ok(missing) = manager.missing_card_sprites() {
                if !missing.is_empty() {
                    println!("⚠️  Face pack is missing {} cards", missing.len());
                }
            }
            result
        }
        Command::Thumbnail { bundle, separate, asset } => {
            let shape = asset.map_or(ThumbnailShape::FirstImage, ThumbnailShape::Named);
            manager.thumbnail_with(&bundle, separate, shape).await.map(|sprite| {
                let (width, height) = sprite.dimensions();
                println!("📸 {} ({width}x{height})", sprite.name());
            })
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {e}");
            ExitCode::FAILURE
        }
    }
}
