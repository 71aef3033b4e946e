//! GSS CLI binary.
//!
//! # Commands
//!
//! - `status` - Decode a legacy major status word
//! - `mechs` - List installed mechanisms
//! - `selftest` - Run an in-memory handshake and message round trip

use std::path::PathBuf;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use clap::{Parser, Subcommand, ValueEnum};
use gss::{
    detect_mech,
    krb5::crypto::{EncType, RustCryptoProvider},
    oid::NT_HOSTBASED_SERVICE,
    AcceptRequest, Config, ContextFlags, ContextHandle, Gss, InitRequest, Krb5Mechanism,
    MechanismRegistry, MemoryRealm, Name, Status, VERSION,
};

#[derive(Parser)]
#[command(name = "gss")]
#[command(version = VERSION)]
#[command(about = "Generic Security Service tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a legacy major status word
    Status {
        /// Major status word (decimal or 0x-prefixed hex)
        #[arg(long, value_parser = parse_word)]
        major: u32,

        /// Mechanism minor code
        #[arg(long, value_parser = parse_word, default_value = "0")]
        minor: u32,
    },

    /// List installed mechanisms
    Mechs,

    /// Run an in-memory handshake and wrap/unwrap round trip
    Selftest {
        /// Config file path (default: <config dir>/gss/config.toml if present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Request mutual authentication
        #[arg(short, long)]
        mutual: bool,

        /// Session key profile
        #[arg(short, long, value_enum, default_value = "des3")]
        profile: Profile,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Profile {
    /// Single DES with RSA-MD5-DES checksums
    Des,
    /// Triple DES with HMAC-SHA1-DES3-KD checksums
    Des3,
}

impl Profile {
    fn enctype(self) -> EncType {
        match self {
            Profile::Des => EncType::DesCbcMd5,
            Profile::Des3 => EncType::Des3CbcSha1Kd,
        }
    }
}

fn parse_word(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid status word {s:?}: {e}"))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Status { major, minor } => {
            init_logging(cli.verbose, "warn");
            cmd_status(major, minor)
        }
        Commands::Mechs => {
            init_logging(cli.verbose, "warn");
            cmd_mechs()
        }
        Commands::Selftest {
            config,
            mutual,
            profile,
        } => cmd_selftest(config, mutual, profile, cli.verbose),
    }
}

fn init_logging(verbose: bool, default_level: &str) {
    let log_level = if verbose { "debug" } else { default_level };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();
}

fn cmd_status(major: u32, minor: u32) -> anyhow::Result<()> {
    let status = Status::from_legacy(major, minor)
        .ok_or_else(|| anyhow::anyhow!("0x{major:08x} is not a valid status word"))?;

    println!("Status word:    0x{:08x}", major);
    println!("Routine:        {:?}", status.major);
    match status.call_error {
        Some(call) => println!("Calling error:  {:?}", call),
        None => println!("Calling error:  none"),
    }
    println!("Supplementary:  0x{:04x}", status.supplementary.bits());
    println!("Minor:          {}", status.minor);
    println!();
    println!("{status}");

    Ok(())
}

fn build_gss(realm: Arc<MemoryRealm>, config: &Config) -> anyhow::Result<Gss> {
    let krb5 = Krb5Mechanism::builder(Arc::new(RustCryptoProvider::new()))
        .ticket_store(realm)
        .config(config.krb5.clone())
        .build();
    let registry = MechanismRegistry::builder().install(Arc::new(krb5)).build()?;
    Ok(Gss::new(Arc::new(registry)))
}

fn cmd_mechs() -> anyhow::Result<()> {
    let gss = build_gss(Arc::new(MemoryRealm::new("LOCALHOST")), &Config::default())?;
    let default = gss.registry().default_oid().clone();

    println!("Installed mechanisms:");
    for mech in gss.registry().iter() {
        let marker = if mech.oid() == &default { " (default)" } else { "" };
        println!("  {:<24} {}{}", mech.oid().to_string(), mech.name(), marker);
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)?,
        None => match Config::default_path().filter(|p| p.exists()) {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        },
    };
    Ok(config.with_env_overrides())
}

fn cmd_selftest(
    config: Option<PathBuf>,
    mutual: bool,
    profile: Profile,
    verbose: bool,
) -> anyhow::Result<()> {
    let config = load_config(config)?;
    init_logging(verbose, &config.logging.level);

    let realm = Arc::new(
        MemoryRealm::new("LOCALHOST")
            .with_enctype(profile.enctype())
            .with_lifetime(config.krb5.default_lifetime_secs),
    );
    let service = realm.add_service("host/localhost")?;
    let gss = build_gss(realm, &config)?;

    let target = Name::import("host@localhost", NT_HOSTBASED_SERVICE);
    let mut flags = ContextFlags::new()
        .with(ContextFlags::INTEG)
        .with(ContextFlags::SEQUENCE);
    if mutual {
        flags.set(ContextFlags::MUTUAL);
    }

    let mut initiator = ContextHandle::none();
    let mut acceptor = ContextHandle::none();

    let req = InitRequest::new(&target).flags(flags);
    let request = gss.init_sec_context(Some(&mut initiator), &req)?;
    tracing::info!("Initiator: {}", request.status);
    print_token("Authentication request", &request.output_token);

    let reply = gss.accept_sec_context(
        Some(&mut acceptor),
        &AcceptRequest::new(&request.output_token).credential(&service),
    )?;
    tracing::info!(
        "Acceptor: {}, initiator is {}",
        reply.status,
        reply.source.as_ref().map_or_else(|| "unknown".to_string(), ToString::to_string)
    );

    if request.status.is_continue_needed() {
        print_token("Authentication reply", &reply.output_token);
        let done = gss.init_sec_context(
            Some(&mut initiator),
            &req.input_token(&reply.output_token),
        )?;
        tracing::info!("Initiator: {}", done.status);
    }

    let message = b"gss selftest message";
    let wrapped = gss.wrap(&mut initiator, true, message)?;
    print_token("Wrap token", &wrapped.token);
    let unwrapped = gss.unwrap(&mut acceptor, &wrapped.token)?;
    anyhow::ensure!(unwrapped.message == message, "unwrapped message differs");

    let mic = gss.get_mic(&mut acceptor, message)?;
    print_token("MIC token", &mic);
    gss.verify_mic(&mut initiator, message, &mic)?;

    let info = gss.inquire_context(&initiator)?;
    println!("Mechanism:      {}", info.mech);
    println!("Flags:          0x{:04x}", info.flags.bits());
    println!("Lifetime:       {}s", gss.context_time(&initiator)?);
    println!("Confidential:   {}", wrapped.conf_applied);

    gss.delete_sec_context(Some(&mut initiator))?;
    gss.delete_sec_context(Some(&mut acceptor))?;
    println!("Selftest passed");

    Ok(())
}

fn print_token(label: &str, token: &[u8]) {
    let mech = detect_mech(token).map_or_else(|| "-".to_string(), |oid| oid.to_string());
    println!("{label} ({} bytes, mech {mech}):", token.len());
    println!("  {}", BASE64.encode(token));
}
