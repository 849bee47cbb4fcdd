use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::config::Config;
use crate::formats::{Cipher, FormatRegistry, OpenSshKeyFile, PrivateKeyFile};
use crate::keys::{
    CryptoBackend, EcdsaCurve, KeyAlgorithm, KeyGenSpec, KeyPair, RsaHash, SshPublicKey,
};

pub mod commands;

use commands::{KeyFile, NEW_PASSPHRASE_ENV, PASSPHRASE_ENV};

#[derive(Parser)]
#[command(name = "sshkey")]
#[command(about = "Inspect, verify and manage SSH keys and certificates")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Describe a public key, certificate or private key file")]
    Inspect {
        file: PathBuf,

        #[arg(long)]
        passphrase: Option<String>,
    },

    #[command(about = "Print the fingerprint of a key")]
    Fingerprint {
        file: PathBuf,

        #[arg(long)]
        md5: bool,
    },

    #[command(about = "Verify a signature over a message file")]
    Verify {
        #[arg(short, long)]
        key: PathBuf,

        #[arg(short, long)]
        signature: PathBuf,

        message: PathBuf,
    },

    #[command(about = "Sign a message file, printing the base64 signature blob")]
    Sign {
        #[arg(short, long)]
        key: PathBuf,

        message: PathBuf,

        #[arg(long)]
        passphrase: Option<String>,

        /// RSA only: sha1, sha256 or sha512
        #[arg(long)]
        hash: Option<String>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    #[command(about = "Generate a new key pair")]
    Generate {
        #[arg(short = 't', long = "type")]
        key_type: Option<String>,

        #[arg(short, long)]
        bits: Option<usize>,

        /// nistp256, nistp384 or nistp521
        #[arg(long)]
        curve: Option<String>,

        #[arg(long)]
        cipher: Option<Cipher>,

        #[arg(short = 'C', long)]
        comment: Option<String>,

        #[arg(long)]
        passphrase: Option<String>,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(short, long)]
        force: bool,
    },

    #[command(about = "Change or remove the passphrase of a private key")]
    Passwd {
        file: PathBuf,

        #[arg(long)]
        old: Option<String>,

        #[arg(long)]
        new: Option<String>,
    },

    #[command(about = "Configuration management")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    #[command(about = "Show version and build information")]
    Version,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    #[command(about = "Show current configuration")]
    Show,

    #[command(about = "Generate example configuration")]
    Init {
        #[arg(long)]
        force: bool,
    },

    #[command(about = "Validate configuration")]
    Validate,
}

pub struct CliHandler {
    config: Arc<Config>,
    config_path: Option<PathBuf>,
    backend: CryptoBackend,
    registry: FormatRegistry,
}

impl CliHandler {
    pub async fn new(config_path: Option<PathBuf>) -> Result<Self> {
        let config = Config::load_config(config_path.as_deref())?;
        Ok(Self::with_config(config, config_path))
    }

    /// Handler over an already loaded configuration
    pub fn with_config(config: Config, config_path: Option<PathBuf>) -> Self {
        let backend = config.backend();
        Self {
            config: Arc::new(config),
            config_path,
            backend,
            registry: FormatRegistry::default(),
        }
    }

    pub async fn handle_command(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Inspect { file, passphrase } => self.inspect(file, passphrase).await,
            Commands::Fingerprint { file, md5 } => self.fingerprint(file, md5).await,
            Commands::Verify {
                key,
                signature,
                message,
            } => self.verify(key, signature, message).await,
            Commands::Sign {
                key,
                message,
                passphrase,
                hash,
                output,
            } => self.sign(key, message, passphrase, hash, output).await,
            Commands::Generate {
                key_type,
                bits,
                curve,
                cipher,
                comment,
                passphrase,
                output,
                force,
            } => {
                let request = GenerateRequest {
                    key_type,
                    bits,
                    curve,
                    cipher,
                    comment,
                    passphrase,
                };
                self.generate(request, output, force).await
            }
            Commands::Passwd { file, old, new } => self.passwd(file, old, new).await,
            Commands::Config { action } => self.handle_config_action(action).await,
            Commands::Version => {
                print_version();
                Ok(())
            }
        }
    }

    async fn inspect(&self, path: PathBuf, passphrase: Option<String>) -> Result<()> {
        match commands::load_key_file(&self.backend, &self.registry, &path).await? {
            KeyFile::Public { key, comment } => {
                for line in commands::describe_public_key(&self.backend, &key, comment.as_deref())
                {
                    println!("{line}");
                }
            }
            KeyFile::Private(file) => {
                println!("Format: {}", file.type_label());
                println!("Protected: {}", if file.is_protected() { "yes" } else { "no" });
                let have_passphrase =
                    passphrase.is_some() || std::env::var(PASSPHRASE_ENV).is_ok();
                if file.is_protected() && !have_passphrase {
                    println!("(set {PASSPHRASE_ENV} to show the key)");
                    return Ok(());
                }
                let pair = commands::unlock(&self.backend, file.as_ref(), passphrase.as_deref())?;
                for line in commands::describe_public_key(
                    &self.backend,
                    pair.public_key(),
                    Some(pair.comment()),
                ) {
                    println!("{line}");
                }
            }
        }
        Ok(())
    }

    async fn fingerprint(&self, path: PathBuf, md5: bool) -> Result<()> {
        let key = commands::load_public_key(&self.backend, &self.registry, &path).await?;
        println!("{}", commands::fingerprint_line(&key, md5));
        Ok(())
    }

    async fn verify(
        &self,
        key_path: PathBuf,
        signature_path: PathBuf,
        message_path: PathBuf,
    ) -> Result<()> {
        let key = commands::load_public_key(&self.backend, &self.registry, &key_path).await?;
        let signature = commands::decode_signature(
            &tokio::fs::read(&signature_path)
                .await
                .with_context(|| format!("Failed to read {}", signature_path.display()))?,
        );
        let message = tokio::fs::read(&message_path)
            .await
            .with_context(|| format!("Failed to read {}", message_path.display()))?;

        if key.verify(&self.backend, &signature, &message)? {
            info!(fingerprint = %key.fingerprint(), "signature verified");
            println!("Good signature from {}", key.fingerprint());
            Ok(())
        } else {
            warn!(fingerprint = %key.fingerprint(), "signature did not verify");
            anyhow::bail!("Signature verification failed")
        }
    }

    async fn sign(
        &self,
        key_path: PathBuf,
        message_path: PathBuf,
        passphrase: Option<String>,
        hash: Option<String>,
        output: Option<PathBuf>,
    ) -> Result<()> {
        let file = match commands::load_key_file(&self.backend, &self.registry, &key_path).await? {
            KeyFile::Private(file) => file,
            KeyFile::Public { .. } => {
                anyhow::bail!("{} holds a public key only", key_path.display())
            }
        };
        let pair = commands::unlock(&self.backend, file.as_ref(), passphrase.as_deref())?;
        let message = tokio::fs::read(&message_path)
            .await
            .with_context(|| format!("Failed to read {}", message_path.display()))?;

        let signature = match hash.as_deref() {
            None => pair.sign(&self.backend, &message)?,
            Some(name) => {
                let hash = parse_rsa_hash(name)?;
                pair.sign_with(&self.backend, hash, &message)?
            }
        };
        let encoded = BASE64.encode(&signature);
        match output {
            Some(path) => tokio::fs::write(&path, format!("{encoded}\n"))
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?,
            None => println!("{encoded}"),
        }
        Ok(())
    }

    async fn generate(&self, request: GenerateRequest, output: PathBuf, force: bool) -> Result<()> {
        if !force && tokio::fs::try_exists(&output).await.unwrap_or(false) {
            anyhow::bail!(
                "{} already exists. Use --force to overwrite.",
                output.display()
            );
        }

        let spec = request.spec(&self.config)?;
        info!(algorithm = %spec.algorithm(), "generating key pair");
        let comment = request
            .comment
            .clone()
            .unwrap_or_else(|| self.config.keygen.comment.clone());
        let pair = KeyPair::generate(&self.backend, spec)?.with_comment(comment);

        let mut options = self.config.openssh_options();
        if let Some(cipher) = request.cipher {
            options.cipher = cipher;
        }
        let from_env = std::env::var(NEW_PASSPHRASE_ENV).ok();
        let passphrase = request.passphrase.as_deref().or(from_env.as_deref());
        let file = OpenSshKeyFile::create(&self.backend, &pair, passphrase, &options)?;

        commands::write_private(&output, &file.formatted_bytes()).await?;
        let public_path = commands::public_key_path(&output);
        tokio::fs::write(
            &public_path,
            format!("{}\n", pair.public_key().to_openssh_with_comment(pair.comment())),
        )
        .await
        .with_context(|| format!("Failed to write {}", public_path.display()))?;

        println!("Your identification has been saved in {}", output.display());
        println!("Your public key has been saved in {}", public_path.display());
        println!("{}", commands::fingerprint_line(pair.public_key(), false));
        Ok(())
    }

    async fn passwd(&self, path: PathBuf, old: Option<String>, new: Option<String>) -> Result<()> {
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut file = self
            .registry
            .parse(&self.backend, &bytes)
            .with_context(|| format!("{} is not a private key file", path.display()))?;
        if !file.supports_passphrase_change() {
            anyhow::bail!("{} keys cannot be rewritten", file.type_label());
        }

        let old = old.or_else(|| std::env::var(PASSPHRASE_ENV).ok());
        let new = new.or_else(|| std::env::var(NEW_PASSPHRASE_ENV).ok());
        file.change_passphrase(&self.backend, old.as_deref(), new.as_deref())
            .context("Failed to change passphrase")?;
        commands::write_private(&path, &file.formatted_bytes()).await?;

        if file.is_protected() {
            println!("Passphrase changed for {}", path.display());
        } else {
            println!("Passphrase removed from {}", path.display());
        }
        Ok(())
    }

    async fn handle_config_action(&mut self, action: ConfigAction) -> Result<()> {
        match action {
            ConfigAction::Show => {
                println!("Current Configuration:");
                println!("{}", toml::to_string_pretty(self.config.as_ref())?);
            }
            ConfigAction::Init { force } => {
                let path = match &self.config_path {
                    Some(path) => path.clone(),
                    None => Config::default_path().context("Could not find config directory")?,
                };
                Config::generate_example_config(&path, force)?;
                println!("Example configuration written to {}", path.display());
            }
            ConfigAction::Validate => {
                // Loading already validated it
                println!("Configuration is valid");
            }
        }
        Ok(())
    }
}

/// Options of `sshkey generate` that pick and protect the key
struct GenerateRequest {
    key_type: Option<String>,
    bits: Option<usize>,
    curve: Option<String>,
    cipher: Option<Cipher>,
    comment: Option<String>,
    passphrase: Option<String>,
}

impl GenerateRequest {
    fn spec(&self, config: &Config) -> Result<KeyGenSpec> {
        let mut algorithm = match &self.key_type {
            Some(name) => name.parse::<KeyAlgorithm>()?,
            None => config.default_algorithm()?,
        };
        if let Some(curve) = &self.curve {
            let curve = EcdsaCurve::from_name(curve)?;
            match algorithm {
                KeyAlgorithm::Ecdsa(_) => algorithm = KeyAlgorithm::Ecdsa(curve),
                other => anyhow::bail!("--curve does not apply to {other} keys"),
            }
        }
        if let (Some(bits), KeyAlgorithm::Ecdsa(_)) = (self.bits, algorithm) {
            algorithm = KeyAlgorithm::Ecdsa(curve_for_bits(bits)?);
        }
        let rsa_bits = self.bits.unwrap_or(config.keygen.rsa_bits);
        Ok(KeyGenSpec::for_algorithm(algorithm, rsa_bits)?)
    }
}

fn curve_for_bits(bits: usize) -> Result<EcdsaCurve> {
    match bits {
        256 => Ok(EcdsaCurve::NistP256),
        384 => Ok(EcdsaCurve::NistP384),
        521 => Ok(EcdsaCurve::NistP521),
        other => anyhow::bail!("ECDSA keys are 256, 384 or 521 bits, not {other}"),
    }
}

fn parse_rsa_hash(name: &str) -> Result<RsaHash> {
    match name.to_ascii_lowercase().as_str() {
        "sha1" | "ssh-rsa" => Ok(RsaHash::Sha1),
        "sha256" | "rsa-sha2-256" => Ok(RsaHash::Sha256),
        "sha512" | "rsa-sha2-512" => Ok(RsaHash::Sha512),
        other => anyhow::bail!("unknown RSA hash '{other}'"),
    }
}

fn print_version() {
    println!("sshkey {}", crate::VERSION);
    println!("  target:  {}", env!("TARGET"));
    println!("  profile: {}", env!("PROFILE"));
    println!("  rustc:   {}", env!("RUSTC_VERSION"));
    println!("  built:   {}", env!("BUILD_DATE"));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(key_type: Option<&str>, bits: Option<usize>, curve: Option<&str>) -> GenerateRequest {
        GenerateRequest {
            key_type: key_type.map(str::to_string),
            bits,
            curve: curve.map(str::to_string),
            cipher: None,
            comment: None,
            passphrase: None,
        }
    }

    #[test]
    fn test_generate_spec_resolution() {
        let config = Config::default();
        assert_eq!(request(None, None, None).spec(&config).unwrap(), KeyGenSpec::Ed25519);
        assert_eq!(
            request(Some("rsa"), None, None).spec(&config).unwrap(),
            KeyGenSpec::Rsa { bits: 3072 }
        );
        assert_eq!(
            request(Some("ecdsa"), Some(384), None).spec(&config).unwrap(),
            KeyGenSpec::Ecdsa(EcdsaCurve::NistP384)
        );
        assert_eq!(
            request(Some("ecdsa"), None, Some("secp521r1")).spec(&config).unwrap(),
            KeyGenSpec::Ecdsa(EcdsaCurve::NistP521)
        );
        assert!(request(Some("ed25519"), None, Some("nistp256")).spec(&config).is_err());
        assert!(request(Some("ecdsa"), Some(512), None).spec(&config).is_err());
        assert!(request(Some("dsa"), None, None).spec(&config).is_err());
    }

    #[test]
    fn test_parse_rsa_hash() {
        assert_eq!(parse_rsa_hash("SHA256").unwrap(), RsaHash::Sha256);
        assert_eq!(parse_rsa_hash("ssh-rsa").unwrap(), RsaHash::Sha1);
        assert!(parse_rsa_hash("md5").is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "sshkey",
            "generate",
            "-t",
            "ecdsa",
            "--cipher",
            "aes256-gcm",
            "-o",
            "/tmp/key",
        ])
        .unwrap();
        match cli.command {
            Commands::Generate { cipher, .. } => assert_eq!(cipher, Some(Cipher::Aes256Gcm)),
            _ => panic!("expected generate"),
        }
    }
}
