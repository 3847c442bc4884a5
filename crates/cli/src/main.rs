//! Command-line client for blober.

mod api_client;

use anyhow::{Context, Result};
use api_client::{AccountInfo, ApiClient, SignupRequest};
use clap::{Args, Parser, Subcommand};
use figment::Figment;
use figment::providers::{Format, Toml};
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "blober")]
#[command(about = "Command-line client for blober")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct ClientConfigArgs {
    /// Client config file path
    #[arg(long, env = "BLOBER_CLIENT_CONFIG")]
    client_config: Option<String>,
}

#[derive(Args, Clone)]
struct ApiArgs {
    /// Server URL (overrides client config)
    #[arg(long, env = "BLOBER_URL")]
    server: Option<String>,

    /// Access key (overrides client config)
    #[arg(long, env = "BLOBER_ACCESS_KEY", hide_env_values = true)]
    key: Option<String>,

    #[command(flatten)]
    client: ClientConfigArgs,
}

#[derive(Args, Clone)]
struct PasswordArgs {
    /// Password (avoid if possible; prefer --password-stdin)
    #[arg(long)]
    password: Option<String>,

    /// Read password from stdin
    #[arg(long, default_value_t = false)]
    password_stdin: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and save its keys locally
    Signup {
        /// Server URL (e.g., https://blober.example.com)
        #[arg(long, env = "BLOBER_URL")]
        server: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        #[command(flatten)]
        password: PasswordArgs,
        #[command(flatten)]
        client: ClientConfigArgs,
    },
    /// Log in and save fresh keys locally
    Login {
        /// Server URL (e.g., https://blober.example.com)
        #[arg(long, env = "BLOBER_URL")]
        server: String,
        #[arg(long)]
        email: String,
        #[command(flatten)]
        password: PasswordArgs,
        #[command(flatten)]
        client: ClientConfigArgs,
    },
    /// App management commands
    Apps {
        #[command(subcommand)]
        command: AppCommands,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Upload one or more files to an app
    Upload {
        /// App name
        app: String,
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Only the owner's private key may download the files
        #[arg(long, default_value_t = false)]
        private: bool,
        /// Upload with the public key from the client config
        #[arg(long, default_value_t = false)]
        public_key: bool,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Download a blob
    Download {
        /// App namespace
        namespace: String,
        /// Blob hash
        hash: String,
        /// Output path (default: the uploaded filename)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// List the blobs of an app
    Blobs {
        /// Numeric app id
        app_id: i64,
        /// Page number (20 blobs per page)
        #[arg(long, default_value_t = 0)]
        page: i64,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Check server health and version
    Health {
        #[command(flatten)]
        api: ApiArgs,
    },
}

#[derive(Subcommand)]
enum AppCommands {
    /// Create an app
    Create {
        /// App name
        name: String,
    },
    /// List your apps
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let Cli { command } = Cli::parse();

    match command {
        Commands::Signup {
            server,
            email,
            first_name,
            last_name,
            password,
            client,
        } => {
            handle_signup_command(&server, email, first_name, last_name, &password, &client).await
        }
        Commands::Login {
            server,
            email,
            password,
            client,
        } => handle_login_command(&server, &email, &password, &client).await,
        Commands::Apps { command, api } => handle_apps_command(command, &api).await,
        Commands::Upload {
            app,
            files,
            private,
            public_key,
            api,
        } => handle_upload_command(&app, &files, private, public_key, &api).await,
        Commands::Download {
            namespace,
            hash,
            output,
            api,
        } => handle_download_command(&namespace, &hash, output.as_deref(), &api).await,
        Commands::Blobs { app_id, page, api } => handle_blobs_command(app_id, page, &api).await,
        Commands::Health { api } => handle_health_command(&api).await,
    }
}

async fn handle_signup_command(
    server: &str,
    email: String,
    first_name: String,
    last_name: String,
    password: &PasswordArgs,
    client: &ClientConfigArgs,
) -> Result<()> {
    let base_url = normalize_base_url(server)?;
    let password = read_password(password)?;
    let config_path = client_config_path(client.client_config.as_deref())?;

    let api = ApiClient::new(&base_url, None)?;
    let account = api
        .signup(&SignupRequest {
            first_name,
            last_name,
            email,
            password,
        })
        .await?;

    save_account(&config_path, &base_url, &account).await?;
    println!("Account created: {} (id {})", account.email, account.id);
    println!("Client config: {}", config_path.display());
    Ok(())
}

async fn handle_login_command(
    server: &str,
    email: &str,
    password: &PasswordArgs,
    client: &ClientConfigArgs,
) -> Result<()> {
    let base_url = normalize_base_url(server)?;
    let password = read_password(password)?;
    let config_path = client_config_path(client.client_config.as_deref())?;

    let api = ApiClient::new(&base_url, None)?;
    let account = api.login(email, &password).await?;

    save_account(&config_path, &base_url, &account).await?;
    println!("Logged in as {}", account.email);
    if let Some(credential) = &account.credential {
        println!("  Keys expire at: {}", credential.expires_at);
    }
    println!("Client config: {}", config_path.display());
    Ok(())
}

async fn handle_apps_command(command: AppCommands, api: &ApiArgs) -> Result<()> {
    let client = resolve_api_client(api, KeyChoice::Private).await?;

    match command {
        AppCommands::Create { name } => {
            let app = client.create_app(&name).await?;
            println!("App created:");
            println!("  ID: {}", app.id);
            println!("  Name: {}", app.name);
            println!("  Namespace: {}", app.namespace);
        }
        AppCommands::List => {
            let apps = client.list_apps().await?;
            if apps.is_empty() {
                println!("No apps found");
            } else {
                println!("{:<8} {:<24} {:<40} CREATED", "ID", "NAME", "NAMESPACE");
                for app in apps {
                    println!(
                        "{:<8} {:<24} {:<40} {}",
                        app.id, app.name, app.namespace, app.created_at
                    );
                }
            }
        }
    }

    Ok(())
}

async fn handle_upload_command(
    app: &str,
    files: &[PathBuf],
    private: bool,
    public_key: bool,
    api: &ApiArgs,
) -> Result<()> {
    let choice = if public_key {
        KeyChoice::Public
    } else {
        KeyChoice::Private
    };
    let client = resolve_api_client(api, choice).await?;

    if let [file] = files {
        let blob = client.upload(app, file, private).await?;
        println!("Uploaded {} ({} bytes)", file.display(), blob.size);
        println!("  Hash: {}", blob.hash);
        println!("  URL: {}", blob.download_url);
        return Ok(());
    }

    let result = client.upload_many(app, files, private).await?;
    for blob in &result.blobs {
        println!("{}  {}", blob.hash, blob.download_url);
    }
    println!(
        "Uploaded {} file(s), {} failed",
        result.success_count, result.failure_count
    );
    if result.failure_count > 0 {
        anyhow::bail!("{} file(s) failed to upload", result.failure_count);
    }
    Ok(())
}

async fn handle_download_command(
    namespace: &str,
    hash: &str,
    output: Option<&Path>,
    api: &ApiArgs,
) -> Result<()> {
    // Public blobs need no key, so a missing one is not an error here.
    let client = resolve_api_client(api, KeyChoice::Optional).await?;
    let (path, size) = client.download(namespace, hash, output).await?;
    println!("Downloaded {} bytes to {}", size, path.display());
    Ok(())
}

async fn handle_blobs_command(app_id: i64, page: i64, api: &ApiArgs) -> Result<()> {
    let client = resolve_api_client(api, KeyChoice::Private).await?;
    let blobs = client.list_blobs(app_id, page).await?;

    if blobs.is_empty() {
        println!("No blobs on page {page}");
        return Ok(());
    }

    println!(
        "{:<34} {:>10} {:<8} {:<24} FILENAME",
        "HASH", "SIZE", "PRIVATE", "CONTENT-TYPE"
    );
    for blob in blobs {
        println!(
            "{:<34} {:>10} {:<8} {:<24} {}",
            blob.hash, blob.size, blob.is_private, blob.content_type, blob.filename
        );
    }
    Ok(())
}

async fn handle_health_command(api: &ApiArgs) -> Result<()> {
    let client = resolve_api_client(api, KeyChoice::Optional).await?;
    let health = client.health().await?;
    println!("Status: {}", health.status);
    println!("Version: {}", health.version);
    Ok(())
}

// =============================================================================
// Client configuration
// =============================================================================

#[derive(Debug, serde::Serialize, serde::Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
struct ClientConfig {
    server: Option<String>,
    email: Option<String>,
    private_key: Option<String>,
    public_key: Option<String>,
    expires_at: Option<String>,
}

/// Which key from the client config a command uses when none is given.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum KeyChoice {
    Private,
    Public,
    Optional,
}

/// Server URL and key after applying flags, env vars, then the config file.
#[derive(Debug, PartialEq, Eq)]
struct ResolvedApi {
    server: String,
    key: Option<String>,
}

fn resolve_api(api: &ApiArgs, config: &ClientConfig, choice: KeyChoice) -> Result<ResolvedApi> {
    let server = api
        .server
        .clone()
        .or_else(|| config.server.clone())
        .ok_or_else(|| {
            anyhow::anyhow!("no server configured: pass --server, set BLOBER_URL or run `blober login`")
        })?;
    let server = normalize_base_url(&server)?;

    let key = match (&api.key, choice) {
        (Some(key), _) => Some(key.clone()),
        (None, KeyChoice::Public) => config.public_key.clone(),
        (None, KeyChoice::Private | KeyChoice::Optional) => config.private_key.clone(),
    };
    if key.is_none() && choice != KeyChoice::Optional {
        anyhow::bail!("no access key configured: pass --key, set BLOBER_ACCESS_KEY or run `blober login`");
    }

    Ok(ResolvedApi { server, key })
}

async fn resolve_api_client(api: &ApiArgs, choice: KeyChoice) -> Result<ApiClient> {
    let config_path = client_config_path(api.client.client_config.as_deref())?;
    let config = load_client_config(&config_path).await?;
    let resolved = resolve_api(api, &config, choice)?;
    ApiClient::new(&resolved.server, resolved.key.as_deref())
}

async fn save_account(path: &Path, server: &str, account: &AccountInfo) -> Result<()> {
    let credential = account
        .credential
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("server did not return access keys"))?;

    let config = ClientConfig {
        server: Some(server.to_string()),
        email: Some(account.email.clone()),
        private_key: Some(credential.private_access_key.clone()),
        public_key: Some(credential.public_access_key.clone()),
        expires_at: Some(credential.expires_at.clone()),
    };
    save_client_config(path, &config).await
}

fn client_config_path(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(PathBuf::from(path));
    }

    let base = match std::env::var_os("XDG_CONFIG_HOME") {
        Some(path) => PathBuf::from(path),
        None => {
            let home = std::env::var_os("HOME")
                .ok_or_else(|| anyhow::anyhow!("HOME not set; set BLOBER_CLIENT_CONFIG"))?;
            PathBuf::from(home).join(".config")
        }
    };

    Ok(base.join("blober").join("client.toml"))
}

async fn load_client_config(path: &Path) -> Result<ClientConfig> {
    if !path.exists() {
        return Ok(ClientConfig::default());
    }

    match Figment::new().merge(Toml::file(path)).extract() {
        Ok(config) => Ok(config),
        Err(err) => Err(anyhow::anyhow!(err)).with_context(|| {
            format!("failed to load client configuration from {}", path.display())
        }),
    }
}

async fn save_client_config(path: &Path, config: &ClientConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let contents = toml::to_string_pretty(config)?;

    tokio::fs::write(path, contents).await?;

    // Set restrictive permissions (0600) since the file contains keys
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(path, perms).await?;
    }

    Ok(())
}

fn read_password(args: &PasswordArgs) -> Result<String> {
    if let Some(password) = &args.password {
        return Ok(password.clone());
    }
    if args.password_stdin {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        let password = buf.trim_end_matches(['\r', '\n']).to_string();
        if password.is_empty() {
            anyhow::bail!("password read from stdin is empty");
        }
        return Ok(password);
    }
    anyhow::bail!("password required: use --password or --password-stdin");
}

fn normalize_base_url(url: &str) -> Result<String> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("server URL must start with http:// or https://");
    }
    Ok(url.trim_end_matches('/').to_string())
}
