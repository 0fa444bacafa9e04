//! Ames price predictor - main entry point

use clap::Parser;
use ames_predictor::cli::{cmd_predict, cmd_serve, cmd_train, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ames_predictor=info,tower_http=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port, model, schema } => {
            cmd_serve(host, port, model, schema).await?;
        }
        Commands::Predict { input, model, schema, save } => {
            if let Err(e) = cmd_predict(&input, model.as_deref(), schema.as_deref(), save.as_deref()) {
                eprintln!("[ERROR] {}", e);
                std::process::exit(1);
            }
        }
        Commands::Train {
            data,
            target,
            out_dir,
            features,
            scaler,
            cv_folds,
            test_size,
            seed,
        } => {
            cmd_train(&data, &target, &out_dir, &features, scaler, cv_folds, test_size, seed)?;
        }
    }

    Ok(())
}
