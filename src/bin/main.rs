//! Apple EFI Verifier CLI
//!
//! Command-line interface for verifying Apple-signed EFI binaries, computing
//! their signed digests, and managing the trusted key configuration.

use apple_efi_verifier::{
    compute_image_digest,
    config::{ConfigManager, KeyByteOrder, TrustedKeyConfig, VerifierConfiguration},
    domain::constants::{RSA_DEFAULT_EXPONENT, RSA_KEY_SIZE},
    image_digests, inspect_image, public_key_digest, verify_file, ContainerKind, SlotOutcome,
    TrustTable,
};
use clap::{Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "apple-efi-verifier")]
#[command(about = "Verify Apple-signed EFI binaries (single PE images and fat containers)")]
#[command(long_about = "
Apple EFI Verifier - structural validation and RSA-2048 signature checking
for Apple-signed EFI images

EXAMPLES:
    # Verify using keys from the configuration file
    apple-efi-verifier verify boot.efi

    # Verify with an extra raw 256-byte little-endian public key
    apple-efi-verifier --trusted-key apple.key verify boot.efi

    # Print the digest covered by the signature of each image
    apple-efi-verifier digest boot.efi

    # Register a key in the configuration
    apple-efi-verifier config add-key apple apple.key

ENVIRONMENT VARIABLES:
    RUST_LOG        Logging level (debug, info, warn, error)
")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the per-user config directory)
    #[arg(long, global = true, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Additional trusted key: raw 256-byte little-endian RSA modulus
    #[arg(long = "trusted-key", global = true, value_name = "KEY_FILE")]
    trusted_keys: Vec<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify the signatures of one or more EFI binaries
    Verify {
        /// EFI binaries to verify; stops at the first failure
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// Print the digest of every verified image
        #[arg(short, long)]
        digests: bool,
    },

    /// Print the signed digest of each image without checking signatures
    Digest {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Show the parsed PE header summary of a single image
    Inspect {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Print the trust-table digest of a raw 256-byte little-endian public key
    KeyDigest {
        #[arg(value_name = "KEY_FILE")]
        key_file: PathBuf,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Create default configuration file
    Init,

    /// Add a trusted key to the configuration
    AddKey {
        /// Name reported when this key validates an image
        name: String,

        /// Raw 256-byte modulus file
        #[arg(value_name = "KEY_FILE", conflicts_with = "modulus")]
        key_file: Option<PathBuf>,

        /// Hex-encoded modulus instead of a key file
        #[arg(long, value_name = "HEX")]
        modulus: Option<String>,

        /// Byte order of the modulus
        #[arg(long, value_enum, default_value = "le")]
        byte_order: ByteOrderArg,

        /// RSA public exponent
        #[arg(long, default_value_t = RSA_DEFAULT_EXPONENT)]
        exponent: u32,
    },

    /// Set a configuration value (verbose, show_digests)
    Set {
        /// Configuration key
        key: String,
        /// Configuration value
        value: String,
    },
}

#[derive(ValueEnum, Clone, Copy)]
enum ByteOrderArg {
    Le,
    Be,
}

impl From<ByteOrderArg> for KeyByteOrder {
    fn from(arg: ByteOrderArg) -> Self {
        match arg {
            ByteOrderArg::Le => KeyByteOrder::Le,
            ByteOrderArg::Be => KeyByteOrder::Be,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };

    // Load errors surface in the command that needs the file.
    let file_config = config_manager.load_or_default();
    let default_filter = match &file_config {
        Ok(config) => config.log_filter(cli.verbose),
        Err(_) => VerifierConfiguration::default().log_filter(cli.verbose),
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Commands::Verify { files, digests } => {
            let config = file_config?;
            let table = build_trust_table(&config, &cli.trusted_keys)?;
            handle_verify_command(&files, &table, digests || config.show_digests)?;
        }

        Commands::Digest { file } => handle_digest_command(&file)?,

        Commands::Inspect { file } => handle_inspect_command(&file)?,

        Commands::KeyDigest { key_file } => handle_key_digest_command(&key_file)?,

        Commands::Config(config_cmd) => handle_config_command(&config_manager, config_cmd)?,
    }

    Ok(())
}

/// Trust table from the configured keys followed by `--trusted-key` files.
fn build_trust_table(config: &VerifierConfiguration, key_files: &[PathBuf]) -> Result<TrustTable> {
    let mut config = config.clone();
    for path in key_files {
        let name = path
            .file_stem()
            .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned());
        config
            .trusted_keys
            .push(TrustedKeyConfig::from_key_file(name, path)?);
    }

    let table = config.to_trust_table()?;
    if table.is_empty() {
        log::warn!("No trusted keys configured; every signed image will be rejected");
    }
    Ok(table)
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path)
        .into_diagnostic()
        .with_context(|| format!("Failed to read {}", path.display()))
}

fn handle_verify_command(files: &[PathBuf], table: &TrustTable, show_digests: bool) -> Result<()> {
    for file in files {
        let report = match verify_file(file, table) {
            Ok(report) => report,
            Err(e) => {
                eprintln!("❌ {}: {} ({})", file.display(), e, e.kind());
                std::process::exit(1);
            }
        };

        match report.container {
            ContainerKind::Single => println!("✅ {}: signature valid", file.display()),
            ContainerKind::Fat { arch_count } => println!(
                "✅ {}: fat binary, {} of {arch_count} images verified",
                file.display(),
                report.verified_count()
            ),
        }

        for slot in &report.slots {
            let cpu = slot
                .cpu_type
                .map_or_else(String::new, |cpu| format!(" cpu {cpu:#010x}"));
            match &slot.outcome {
                SlotOutcome::Verified(image) => {
                    println!(
                        "  [{}]{cpu} {} at {:#x} (+{:#x}), key '{}'",
                        slot.index, image.format, slot.offset, slot.size, image.key_name
                    );
                    if show_digests {
                        println!("      sha256 {}", image.digest);
                    }
                }
                SlotOutcome::Skipped => println!(
                    "  [{}]{cpu} skipped (unsupported architecture)",
                    slot.index
                ),
            }
        }
    }
    Ok(())
}

fn handle_digest_command(file: &Path) -> Result<()> {
    let data = read_file(file)?;
    for entry in image_digests(&data)? {
        match entry.cpu_type {
            Some(cpu) => println!(
                "{}  [{}] cpu {cpu:#010x} at {:#x}",
                entry.digest, entry.index, entry.offset
            ),
            None => println!("{}  {}", entry.digest, file.display()),
        }
    }
    Ok(())
}

fn handle_inspect_command(file: &Path) -> Result<()> {
    let data = read_file(file)?;
    let ctx = inspect_image(&data)?;
    let digest = compute_image_digest(&data)?;

    println!("📋 {}", file.display());
    println!("  Format: {}", ctx.format());
    println!("  Machine: {:#06x}", ctx.machine);
    println!("  Image base: {:#x}", ctx.image_base());
    println!("  Entry point: {:#x}", ctx.entry_point);
    println!("  SizeOfImage: {:#x}", ctx.image_size);
    println!("  SizeOfHeaders: {:#x}", ctx.size_of_headers);
    println!("  PE header offset: {:#x}", ctx.pe_header_offset);
    println!("  Sections: {}", ctx.number_of_sections);
    println!("  Section raw bytes: {:#x}", ctx.sum_of_section_bytes);
    println!("  Data directories: {}", ctx.number_of_rva_and_sizes);
    println!(
        "  Security directory: {:#x} (+{:#x})",
        ctx.security_dir.virtual_address, ctx.security_dir.size
    );
    println!("  Digest: {digest}");
    Ok(())
}

fn handle_key_digest_command(key_file: &Path) -> Result<()> {
    let data = read_file(key_file)?;
    let key: [u8; RSA_KEY_SIZE] = data.as_slice().try_into().map_err(|_| {
        miette::miette!(
            "{} holds {} bytes, expected a raw {RSA_KEY_SIZE}-byte modulus",
            key_file.display(),
            data.len()
        )
    })?;
    println!("{}", hex::encode(public_key_digest(&key)));
    Ok(())
}

fn handle_config_command(config_manager: &ConfigManager, config_cmd: ConfigCommands) -> Result<()> {
    match config_cmd {
        ConfigCommands::Show => {
            if !config_manager.exists() {
                println!("📋 No configuration file found. Use 'config init' to create one.");
                return Ok(());
            }
            let config = config_manager.load()?;

            println!("📋 Current Configuration:");
            println!("  Trusted keys: {}", config.trusted_keys.len());
            for key in &config.trusted_keys {
                let trusted = key.to_trusted_key()?;
                println!(
                    "    {} (sha256 {}, e={})",
                    key.name,
                    hex::encode(trusted.key_digest()),
                    key.exponent
                );
            }
            println!("  Verbose: {}", config.verbose);
            println!("  Show digests: {}", config.show_digests);
            println!(
                "  Configuration file: {}",
                config_manager.config_path().display()
            );
        }

        ConfigCommands::Init => {
            let _config = config_manager.load_or_create_default()?;
            println!(
                "✅ Configuration initialized: {}",
                config_manager.config_path().display()
            );
            println!("   Add trusted keys with 'config add-key'.");
        }

        ConfigCommands::AddKey {
            name,
            key_file,
            modulus,
            byte_order,
            exponent,
        } => {
            let mut entry = match (key_file, modulus) {
                (Some(path), None) => TrustedKeyConfig::from_key_file(&name, path)?,
                (None, Some(modulus)) => TrustedKeyConfig {
                    name: name.clone(),
                    modulus,
                    byte_order: KeyByteOrder::Le,
                    exponent: RSA_DEFAULT_EXPONENT,
                },
                _ => miette::bail!("Provide either KEY_FILE or --modulus"),
            };
            entry.byte_order = byte_order.into();
            entry.exponent = exponent;
            config_manager.add_key(entry)?;
            println!("✅ Trusted key '{name}' added");
        }

        ConfigCommands::Set { key, value } => {
            config_manager.update_value(&key, &value)?;
            println!("✅ Configuration updated: {key} = {value}");
        }
    }

    Ok(())
}
