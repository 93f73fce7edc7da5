use clap::Parser;
use html_clip_shot::{DEFAULT_OUTPUT, ShotConfig, ShotError, capture_file};
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "html-clip-shot")]
#[command(about = "Screenshot an HTML file, cropped to the rendered extent of its content container")]
#[command(version)]
struct Cli {
    /// HTML file to render
    html: Option<PathBuf>,

    /// Image file to write (png, jpg/jpeg or webp)
    #[arg(default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// CSS selector of the content container
    #[arg(short, long)]
    selector: Option<String>,

    /// Browser executable (defaults to $CHROME, then a PATH lookup)
    #[arg(long)]
    chrome: Option<PathBuf>,

    /// Show the browser window instead of running headless
    #[arg(long)]
    headed: bool,

    /// JPEG/WebP quality, 0-100
    #[arg(short, long)]
    quality: Option<u8>,
}

impl Cli {
    fn shot_config(&self) -> Result<ShotConfig, ShotError> {
        let mut config = match &self.config {
            Some(path) => ShotConfig::load(path).map_err(ShotError::Config)?,
            None => ShotConfig::default(),
        };
        if let Some(selector) = &self.selector {
            config = config.with_container_selector(selector.clone());
        }
        if let Some(chrome) = &self.chrome {
            config = config.with_executable(chrome.clone());
        }
        if self.headed {
            config = config.with_headless(false);
        }
        if let Some(quality) = self.quality {
            config = config.with_quality(quality);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = async {
        let config = cli.shot_config()?;
        capture_file(cli.html.as_deref(), &cli.output, config).await
    }
    .await;

    match result {
        Ok(report) => {
            info!("Done: {}", report.output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
