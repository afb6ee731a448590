use anyhow::{Context, Result};
use clap::Parser;
use std::{env, fmt, str::FromStr};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// A credential that never shows up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(pub String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Supabase Storage credentials. Present only when both URL and key are set.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub key: Secret,
    pub bucket: String,
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// HS256 secret shared with the identity provider. Without it every
    /// request is anonymous.
    pub jwt_secret: Option<Secret>,
    pub supabase: Option<SupabaseConfig>,
    /// Directory for the local object store, used when Supabase is not set.
    pub storage_dir: Option<String>,
    /// Base URL clients use to reach this service; prefixes local blob URLs.
    pub public_url: String,
    pub sign_in_url: String,
    pub max_upload_bytes: usize,
    pub auto_migrate: bool,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Authenticated image gallery")]
pub struct Args {
    /// Host to bind to (overrides IMAGE_GALLERY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides IMAGE_GALLERY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides IMAGE_GALLERY_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Local object storage directory (overrides IMAGE_GALLERY_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Public base URL (overrides IMAGE_GALLERY_PUBLIC_URL)
    #[arg(long)]
    pub public_url: Option<String>,

    /// Maximum upload size in bytes (overrides IMAGE_GALLERY_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,

    /// Run migrations before serving
    #[arg(long)]
    pub auto_migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::from_parts(args, |name| env::var(name).ok())?;
        Ok((cfg, migrate))
    }

    /// Merge parsed args over values looked up with `var`. CLI wins.
    pub fn from_parts(args: Args, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let lookup = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        // --- Environment fallback ---
        let env_host = lookup("IMAGE_GALLERY_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let env_port = parse_var::<u16>(&lookup, "IMAGE_GALLERY_PORT")?.unwrap_or(3000);
        let env_db = lookup("IMAGE_GALLERY_DATABASE_URL")
            .unwrap_or_else(|| "sqlite://./data/meta/images.db".into());
        let env_max_upload =
            parse_var::<usize>(&lookup, "IMAGE_GALLERY_MAX_UPLOAD_BYTES")?.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        let env_auto_migrate = parse_var::<bool>(&lookup, "IMAGE_GALLERY_AUTO_MIGRATE")?.unwrap_or(false);

        let supabase = match (lookup("SUPABASE_URL"), lookup("SUPABASE_KEY")) {
            (Some(url), Some(key)) => Some(SupabaseConfig {
                url,
                key: Secret(key),
                bucket: lookup("SUPABASE_BUCKET").unwrap_or_else(|| "images".into()),
            }),
            _ => None,
        };

        // --- Merge ---
        let host = args.host.unwrap_or(env_host);
        let port = args.port.unwrap_or(env_port);
        let public_url = args
            .public_url
            .or_else(|| lookup("IMAGE_GALLERY_PUBLIC_URL"))
            .unwrap_or_else(|| format!("http://{}:{}", host, port));

        Ok(Self {
            database_url: args.database_url.unwrap_or(env_db),
            jwt_secret: lookup("IMAGE_GALLERY_JWT_SECRET").map(Secret),
            supabase,
            storage_dir: args
                .storage_dir
                .or_else(|| lookup("IMAGE_GALLERY_STORAGE_DIR")),
            public_url,
            sign_in_url: lookup("IMAGE_GALLERY_SIGN_IN_URL").unwrap_or_else(|| "/sign-in".into()),
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
            auto_migrate: args.auto_migrate || env_auto_migrate,
            host,
            port,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(name)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .with_context(|| format!("parsing {} value `{}`", name, value))
        })
        .transpose()
}
