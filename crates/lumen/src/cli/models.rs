//! The `lumen models` command for managing CLIP models.

use clap::{Args, Subcommand};
use lumen_core::encoder::{find_variant, ModelVariant, CLIP_VARIANTS};
use lumen_core::Config;
use std::path::{Path, PathBuf};

/// Arguments for the `models` command.
#[derive(Args, Debug)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub command: ModelsCommand,
}

/// Subcommands for model management.
#[derive(Subcommand, Debug)]
pub enum ModelsCommand {
    /// Download a CLIP variant (vision encoder + text encoder + tokenizer)
    Download {
        /// Variant to download (defaults to `inference.model`)
        #[arg(long)]
        model: Option<String>,
    },

    /// List available variants and their install status
    List,

    /// Show model directory path
    Path,
}

/// Execute the models command.
pub async fn execute(args: ModelsArgs, config: &Config) -> anyhow::Result<()> {
    match args.command {
        ModelsCommand::Download { model } => {
            let name = model.unwrap_or_else(|| config.inference.model.clone());
            let variant = resolve_variant(&name)?;
            let client = reqwest::Client::new();
            download_variant(variant, &config.model_dir(), &client).await?;
            tracing::info!("All downloads complete.");
        }

        ModelsCommand::List => {
            let model_dir = config.model_dir();
            println!("CLIP models:");
            println!("  Directory: {}\n", model_dir.display());

            for variant in CLIP_VARIANTS {
                let status = if variant.is_installed(&model_dir) {
                    "ready"
                } else {
                    "not installed"
                };
                let default_marker = if variant.name == config.inference.model {
                    "  (default)"
                } else {
                    ""
                };
                println!(
                    "    - {:26} {:22} {:14}{}",
                    variant.name, variant.label, status, default_marker
                );
            }

            if !CLIP_VARIANTS.iter().any(|v| v.is_installed(&model_dir)) {
                println!("\nRun `lumen models download` to download the default model.");
            }
        }

        ModelsCommand::Path => {
            println!("{}", config.model_dir().display());
        }
    }

    Ok(())
}

/// Look up a built-in variant, listing the valid names on failure.
pub fn resolve_variant(name: &str) -> anyhow::Result<&'static ModelVariant> {
    find_variant(name).ok_or_else(|| {
        let names: Vec<&str> = CLIP_VARIANTS.iter().map(|v| v.name).collect();
        anyhow::anyhow!(
            "Unknown model '{name}'. Available models: {}",
            names.join(", ")
        )
    })
}

/// Remote URL and local destination for every file of `variant`.
fn download_plan(variant: &ModelVariant, model_dir: &Path) -> Vec<(String, PathBuf)> {
    let variant_dir = model_dir.join(variant.name);
    variant
        .files()
        .iter()
        .map(|(remote, local)| {
            (
                format!("https://huggingface.co/{}/resolve/main/{}", variant.repo, remote),
                variant_dir.join(local),
            )
        })
        .collect()
}

/// Download every missing file of `variant` into `{model_dir}/{name}/`.
///
/// Skips files that already exist.
pub async fn download_variant(
    variant: &ModelVariant,
    model_dir: &Path,
    client: &reqwest::Client,
) -> anyhow::Result<()> {
    std::fs::create_dir_all(model_dir.join(variant.name))?;

    for (url, dest) in download_plan(variant, model_dir) {
        if dest.exists() {
            tracing::info!("{:?} already exists", dest);
            continue;
        }

        tracing::info!("Downloading {} ({})...", variant.label, variant.name);
        tracing::info!("  Source: {}", url);
        tracing::info!("  Destination: {:?}", dest);

        download_file(client, &url, &dest).await?;

        let file_size = std::fs::metadata(&dest)?.len();
        tracing::info!(
            "  Complete ({:.1} MB)",
            file_size as f64 / (1024.0 * 1024.0)
        );
    }

    Ok(())
}

/// Download a file from a URL to a local path, streaming to disk.
///
/// Writes to a `.part` file first so an interrupted download never leaves a
/// truncated model behind.
async fn download_file(client: &reqwest::Client, url: &str, dest: &Path) -> anyhow::Result<()> {
    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;

    let response = client
        .get(url)
        .send()
        .await?
        .error_for_status()
        .map_err(|e| anyhow::anyhow!("Download failed: {e}"))?;

    let total_size = response.content_length();
    if let Some(size) = total_size {
        tracing::info!("  Size: {:.1} MB", size as f64 / (1024.0 * 1024.0));
    }

    let partial = partial_path(dest);
    let mut file = tokio::fs::File::create(&partial).await?;
    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;

        if let Some(total) = total_size {
            if downloaded % (50 * 1024 * 1024) < chunk.len() as u64 {
                tracing::info!(
                    "  Progress: {:.0}%",
                    downloaded as f64 / total as f64 * 100.0
                );
            }
        }
    }

    file.flush().await?;
    drop(file);

    if let Some(expected) = total_size.filter(|&total| total != downloaded) {
        let _ = tokio::fs::remove_file(&partial).await;
        anyhow::bail!(
            "Download of {url} ended early: expected {expected} bytes, got {downloaded}"
        );
    }

    tokio::fs::rename(&partial, dest).await?;
    Ok(())
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_known_variant() {
        let variant = resolve_variant("clip-vit-base-patch16").unwrap();
        assert_eq!(variant.repo, "Xenova/clip-vit-base-patch16");
    }

    #[test]
    fn resolve_unknown_variant_lists_names() {
        let err = resolve_variant("resnet").unwrap_err().to_string();
        assert!(err.contains("Unknown model 'resnet'"));
        assert!(err.contains("clip-vit-base-patch32"));
    }

    #[test]
    fn download_plan_targets_variant_dir() {
        let variant = resolve_variant("clip-vit-base-patch32").unwrap();
        let plan = download_plan(variant, Path::new("/models"));

        assert_eq!(plan.len(), 3);
        assert_eq!(
            plan[0].0,
            "https://huggingface.co/Xenova/clip-vit-base-patch32/resolve/main/onnx/vision_model.onnx"
        );
        assert_eq!(
            plan[0].1,
            PathBuf::from("/models/clip-vit-base-patch32/visual.onnx")
        );
        assert!(plan
            .iter()
            .all(|(_, dest)| dest.starts_with("/models/clip-vit-base-patch32")));
    }

    #[test]
    fn partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/models/a/text.onnx")),
            PathBuf::from("/models/a/text.onnx.part")
        );
    }
}
