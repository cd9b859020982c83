use anyhow::Result;
use clap::Parser;
use gmail_autolabel::auth;
use gmail_autolabel::cli::{self, Cli, Commands, ProgressReporter};
use gmail_autolabel::config::Config;
use gmail_autolabel::error::AutoLabelError;
use indicatif::MultiProgress;
use std::io::Write;
use std::process;

/// Stderr writer that pauses progress spinners while a log line is printed
struct SuspendingWriter {
    multi: MultiProgress,
}

impl Write for SuspendingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.multi.suspend(|| std::io::stderr().write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stderr().flush()
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        display_error(&e);
        eprintln!("\nFor help, run: gmail-autolabel --help");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Several dependencies bring their own rustls crypto provider; pick one explicitly
    #[cfg(not(windows))]
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    #[cfg(windows)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gmail_autolabel=debug,info"))
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gmail_autolabel=info,warn"))
    };

    // Logs print above the spinners instead of tearing through them
    let multi = MultiProgress::new();
    let log_multi = multi.clone();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(move || SuspendingWriter {
            multi: log_multi.clone(),
        })
        .with_target(false)
        .init();

    match &cli.command {
        Commands::Auth { force } => {
            let config = Config::load(&cli.config).await?;
            let token_cache = cli.token_cache_path(&config);
            tracing::info!("Authenticating with Gmail API...");

            if *force && auth::logout(token_cache).await? {
                tracing::info!("Removed existing token cache");
            }

            let hub = auth::initialize_gmail_hub(cli.credentials_path(&config), token_cache).await?;

            println!("Successfully authenticated with Gmail API");
            println!("Token cached at: {:?}", token_cache);

            // Must name a scope we hold, otherwise another OAuth flow is triggered
            let (_, profile) = hub
                .users()
                .get_profile("me")
                .add_scope("https://www.googleapis.com/auth/gmail.modify")
                .doit()
                .await
                .map_err(AutoLabelError::from)?;
            println!(
                "Connected to account: {}",
                profile.email_address.unwrap_or_default()
            );

            Ok(())
        }

        Commands::Run { json } => {
            // A missing or invalid config is reported as a CONFIG_ERROR entry
            let config = Config::load_required(&cli.config).await;
            let report = cli::run_autolabel(&cli, &config, multi).await;

            if *json {
                println!("{}", serde_json::to_string_pretty(&report.entries)?);
            } else {
                print!("{}", cli::render_report(&report));
            }

            if report.aborted() {
                anyhow::bail!("Batch aborted: {}", report.entries[0].reason);
            }
            Ok(())
        }

        Commands::Labels => {
            let config = Config::load(&cli.config).await?;
            let token_cache = cli.token_cache_path(&config);
            if !auth::is_authenticated(token_cache) {
                return Err(AutoLabelError::Auth(
                    "No cached token found. Run `gmail-autolabel auth` first.".to_string(),
                )
                .into());
            }

            let progress = ProgressReporter::new(multi);
            let spinner = progress.add_spinner("Fetching labels...");
            let mail = cli::connect_gmail(cli.credentials_path(&config), token_cache).await?;
            let catalog = cli::list_custom_labels(mail.as_ref()).await?;
            progress.finish_spinner(&spinner, &format!("Found {} custom labels", catalog.len()));

            for name in catalog.names() {
                let marker = if config.batch.labels.contains_key(name) { "*" } else { " " };
                println!("{} {}", marker, name);
            }
            println!("\n(* = offered to the classifier by {:?})", cli.config);
            Ok(())
        }

        Commands::Extract { file } => {
            let content = cli::extract_file(file).await?;
            println!("From:    {}", content.sender);
            println!("Subject: {}", content.subject);
            println!("----------------------------------------");
            println!("{}", content.body);
            Ok(())
        }

        Commands::InitConfig { output, force } => {
            tracing::info!("Generating example configuration file");

            if output.exists() && !force {
                return Err(AutoLabelError::Config(format!(
                    "Configuration file already exists at {:?}. Use --force to overwrite.",
                    output
                ))
                .into());
            }

            Config::create_example(output).await?;

            println!("Created example configuration file at: {:?}", output);
            println!("\nPlease edit this file to customize your settings.");
            println!("Key settings to review:");
            println!("  - batch.user_info: who you are, given to the model as context");
            println!("  - batch.labels: label names and what belongs under each");
            println!("  - llm.provider / llm.model: 'openai' (key in $LLM_API_KEY) or 'ollama'");

            Ok(())
        }

        Commands::Logout => {
            let config = Config::load(&cli.config).await?;
            if auth::logout(cli.token_cache_path(&config)).await? {
                println!("Logged out; token cache removed");
            } else {
                println!("No cached token found; already logged out");
            }
            Ok(())
        }
    }
}

/// Display error with context
fn display_error(error: &anyhow::Error) {
    eprintln!("Error: {}", error);

    let mut cause = error.source();
    while let Some(e) = cause {
        eprintln!("  Caused by: {}", e);
        cause = e.source();
    }

    if let Some(err) = error.downcast_ref::<AutoLabelError>() {
        match err {
            AutoLabelError::Auth(_) => {
                eprintln!("\nHint: Make sure your credentials.json file is valid.");
                eprintln!("      You can download it from Google Cloud Console.");
                eprintln!("      Try running: gmail-autolabel auth --force");
            }
            AutoLabelError::Config(_) => {
                eprintln!("\nHint: Check your configuration file for errors.");
                eprintln!("      Run: gmail-autolabel init-config --force");
            }
            AutoLabelError::Network(_) | AutoLabelError::Server { .. } => {
                eprintln!("\nHint: This may be a temporary network or API error.");
                eprintln!("      Try running the command again.");
            }
            _ => {}
        }
    }
}
