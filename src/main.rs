mod cli;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use gf_convert::check_converter;
use gf_core::config::Config;
use gf_core::{JobId, JobState};
use gf_db::JobFilter;
use glbforge::{shutdown_signal, status, App};

async fn start_engine(config_path: Option<&Path>) -> Result<()> {
    let config = App::load_config(config_path);

    tracing::info!("Starting glbforge conversion engine");
    tracing::info!(
        "Job store at {}, projects in {}",
        config.store.db_path.display(),
        config.converter.projects_dir.display()
    );

    let app = App::with_converter(config)?;
    let report = app.run(shutdown_signal()).await?;

    if !report.forced.is_empty() {
        let ids: Vec<String> = report.forced.iter().map(ToString::to_string).collect();
        tracing::warn!("Jobs failed by shutdown: {}", ids.join(", "));
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "glbforge=debug,gf_core=debug,gf_db=debug,gf_queue=debug,gf_convert=debug".to_string()
        } else {
            "glbforge=info,gf_core=info,gf_db=info,gf_queue=info,gf_convert=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_engine(cli.config.as_deref()))
        }
        Commands::Submit {
            archive,
            name,
            unique_id,
        } => submit(&archive, name, unique_id, cli.config.as_deref()),
        Commands::Status { id } => show_status(&id, cli.config.as_deref()),
        Commands::List {
            state,
            job_type,
            limit,
        } => list_jobs(state.as_deref(), job_type, limit, cli.config.as_deref()),
        Commands::Download { id, dest } => download(JobId::new(id), &dest, cli.config.as_deref()),
        Commands::Remove { id } => {
            let app = App::open(App::load_config(cli.config.as_deref()))?;
            app.queue().store().remove(JobId::new(id))?;
            println!("Removed job #{}", id);
            Ok(())
        }
        Commands::Purge => {
            let app = App::open(App::load_config(cli.config.as_deref()))?;
            let n = app.queue().store().purge_completed()?;
            println!("Purged {} completed jobs", n);
            Ok(())
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("glbforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn submit(
    archive: &Path,
    name: Option<String>,
    unique_id: Option<String>,
    config_path: Option<&Path>,
) -> Result<()> {
    let app = App::open(App::load_config(config_path))?;
    let job = app.submit(archive, name, unique_id)?;
    println!("{}", serde_json::to_string_pretty(&job)?);
    Ok(())
}

fn show_status(id: &str, config_path: Option<&Path>) -> Result<()> {
    let app = App::open(App::load_config(config_path))?;
    let response = status::job_status(app.queue(), id);
    println!("{}", serde_json::to_string_pretty(&response)?);

    if !response.success {
        anyhow::bail!(response.message.unwrap_or_default());
    }
    Ok(())
}

fn list_jobs(
    state: Option<&str>,
    job_type: Option<String>,
    limit: i64,
    config_path: Option<&Path>,
) -> Result<()> {
    let app = App::open(App::load_config(config_path))?;

    let mut filter = JobFilter {
        limit,
        ..JobFilter::default()
    };
    if let Some(state) = state {
        filter = filter.state(state.parse::<JobState>()?);
    }
    if let Some(ref job_type) = job_type {
        filter = filter.job_type(job_type.clone());
    }

    for job in app.queue().list(&filter)? {
        let title = job.data_str(gf_convert::keys::TITLE).unwrap_or("");
        print!(
            "#{} {} {} attempts {}/{}",
            job.id, job.job_type, job.state, job.attempts_made, job.max_attempts
        );
        if !title.is_empty() {
            print!(" - {}", title);
        }
        if let Some(ref error) = job.error {
            print!(" [{}]", error);
        }
        println!();
    }

    let counts = app.queue().counts(job_type.as_deref())?;
    println!(
        "\ninactive: {} (delayed: {}), active: {}, complete: {}, failed: {}",
        counts.inactive, counts.delayed, counts.active, counts.complete, counts.failed
    );
    Ok(())
}

fn download(id: JobId, dest: &Path, config_path: Option<&Path>) -> Result<()> {
    let app = App::open(App::load_config(config_path))?;
    let source = status::download_path(app.queue(), id)?;

    let target = if dest.is_dir() {
        match source.file_name() {
            Some(name) => dest.join(name),
            None => anyhow::bail!("Converted file has no name: {:?}", source),
        }
    } else {
        dest.to_path_buf()
    };

    std::fs::copy(&source, &target)
        .with_context(|| format!("copying {} to {}", source.display(), target.display()))?;
    println!("{}", target.display());
    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = App::load_config(config_path);
    let info = check_converter(&config.converter);

    let mark = if info.available { "✓" } else { "✗" };
    print!("{} {}", mark, info.name);
    if let Some(ref path) = info.path {
        print!(" - {}", path.display());
    }
    println!();

    println!();
    if info.available {
        println!("All required tools are available!");
        Ok(())
    } else {
        anyhow::bail!(
            "Converter not found. Set converter.executable, converter.install_root or {}",
            gf_core::config::ENV_CONVERTER
        )
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let contents = std::fs::read_to_string(p)
                .with_context(|| format!("reading {}", p.display()))?;
            let config = Config::from_json(&contents)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Store: {}", config.store.db_path.display());
    println!("  Pool size: {}", config.store.pool_size);
    println!(
        "  Watchdog: every {}s, stale after {}s",
        config.queue.watchdog_interval_secs, config.queue.stale_after_secs
    );
    println!("  Shutdown timeout: {}s", config.queue.shutdown_timeout_secs);
    println!("  Converter: {}", config.converter.executable);
    println!("  Projects: {}", config.converter.projects_dir.display());
    println!("  Concurrency: {}", config.converter.concurrency);

    let warnings = config.validate();
    for warning in &warnings {
        println!("  warning: {}", warning);
    }
    Ok(())
}
