//! A small `clap`-driven CLI exercising the mount registry: mount a local
//! directory or archive file under a scheme, list mounts, read a file
//! through its alias, and unmount.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use storable_vfs_core::{CoreError, FileStorable, Registry, StorableId};

#[derive(Parser)]
#[command(name = "mount_cli", about = "Inspect and drive a storable-vfs mount registry")]
struct Cli {
    #[arg(long, help = "Settings file path; defaults to the platform data directory")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Mount a local path (folder or archive file) under a new scheme.
    Mount { path: PathBuf, scheme: String, #[arg(long, default_value = "")] name: String },
    /// Remove a mount.
    Unmount { scheme: String },
    /// List all live mounts.
    List,
    /// Read a file addressed by alias or native id and print it as text.
    Cat { id: String },
}

#[tokio::main]
async fn main() -> Result<(), CoreError> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let settings_path = cli.settings.unwrap_or_else(storable_vfs_core::Settings::default_path);
    let registry = Registry::new(settings_path);

    let failures = registry.restore().await;
    for (scheme, err) in &failures {
        tracing::warn!(scheme, error = %err, "skipped a mount that failed to restore");
    }

    match cli.command {
        Command::Mount { path, scheme, name } => {
            let storable = registry.ensure_registered(&StorableId::new(path.to_string_lossy().into_owned())).await?;
            let display_name = if name.is_empty() { scheme.clone() } else { name };
            let root = registry.mount(storable, &scheme, &display_name, None).await?;
            println!("mounted at {root}");
        }
        Command::Unmount { scheme } => {
            let existed = registry.unmount(&scheme).await?;
            println!("{}", if existed { "unmounted" } else { "no such mount" });
        }
        Command::List => {
            for mount in registry.list_mounts() {
                println!(
                    "{:<16} {:<10} {:<10?} {}",
                    mount.root_uri, mount.backing_type_tag, mount.mount_type, mount.original_id
                );
            }
        }
        Command::Cat { id } => {
            let storable = registry.ensure_registered(&StorableId::new(id)).await?;
            let Some(file) = storable.as_file() else {
                return Err(CoreError::invalid_argument("id does not address a file"));
            };
            print!("{}", file.read_text().await?);
        }
    }

    Ok(())
}
