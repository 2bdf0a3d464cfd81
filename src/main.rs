use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{ArgAction, Parser};
use image::RgbaImage;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, fmt};
use winit::event_loop::EventLoop;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use epic_photo_frame::config::Configuration;
use epic_photo_frame::events::{SurfaceEvent, ViewerCommand};
use epic_photo_frame::processing::transform::CropScale;
use epic_photo_frame::remote::epic::{EpicClient, http_client};
use epic_photo_frame::remote::openweather::OpenWeatherClient;
use epic_photo_frame::render::compose::Compositor;
use epic_photo_frame::render::font::load_font;
use epic_photo_frame::render::window::{ViewerApp, WindowSink};
use epic_photo_frame::tasks::materializer::{ImageCache, ImageMaterializer};
use epic_photo_frame::tasks::poller::{FeedPoller, RetryPolicy};
use epic_photo_frame::tasks::slideshow::{OverlayClock, Slideshow};
use epic_photo_frame::weather::WeatherCache;

#[derive(Debug, Parser)]
#[command(
    name = "photo-frame",
    version,
    about = "Slideshow of the latest EPIC Earth images with a clock and weather overlay"
)]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,

    /// Override the per-image rotation interval
    #[arg(long, value_name = "SECONDS")]
    rotate_secs: Option<u64>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("epic_photo_frame={level}").parse()?)
        .add_directive(format!("photo_frame={level}").parse()?)
        .add_directive("winit=warn".parse()?);
    fmt().with_env_filter(filter).with_target(true).init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let mut cfg = Configuration::from_yaml_file(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    if let Some(secs) = cli.rotate_secs {
        cfg.schedule.frame_rotation_interval = Duration::from_secs(secs);
    }
    let cfg = cfg.validated().context("validating configuration")?;

    let placeholder = image::open(&cfg.placeholder_path)
        .with_context(|| {
            format!(
                "failed to load placeholder image {}",
                cfg.placeholder_path.display()
            )
        })?
        .to_rgba8();
    let font = load_font(cfg.overlay.font_family.as_deref())?;
    std::fs::create_dir_all(&cfg.cache_dir)
        .with_context(|| format!("failed to create cache dir {}", cfg.cache_dir.display()))?;

    let event_loop = EventLoop::<ViewerCommand>::with_user_event()
        .build()
        .context("failed to create event loop")?;
    let (events_tx, events_rx) = crossbeam_channel::unbounded::<SurfaceEvent>();
    let cancel = CancellationToken::new();

    let compositor = Compositor::new(
        font,
        cfg.overlay.clone(),
        cfg.materialize.target_width,
        cfg.materialize.target_height,
    );
    let sink = WindowSink::new(event_loop.create_proxy(), events_rx, compositor);

    let driver = {
        let cfg = cfg.clone();
        let cancel = cancel.clone();
        let placeholder = Arc::new(placeholder);
        thread::Builder::new()
            .name("slideshow".into())
            .spawn(move || run_slideshow(cfg, sink, placeholder, cancel))
            .context("failed to spawn slideshow thread")?
    };

    let mut app = ViewerApp::new(cfg.window.clone(), events_tx, cancel.clone());
    let viewer_result = event_loop.run_app(&mut app).context("viewer failed");
    cancel.cancel();

    let driver_result = driver
        .join()
        .map_err(|_| anyhow!("slideshow thread panicked"))?;

    if let Some(err) = app.take_failure() {
        return Err(err);
    }
    viewer_result?;
    driver_result
}

fn run_slideshow(
    cfg: Configuration,
    sink: WindowSink,
    placeholder: Arc<RgbaImage>,
    cancel: CancellationToken,
) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build slideshow runtime")?;

    runtime.block_on(async move {
        watch_signals(&cancel);

        let http = http_client(cfg.feed.request_timeout).context("failed to build HTTP client")?;
        let epic = EpicClient::new(http, &cfg.feed);
        let poller = FeedPoller::new(epic.clone(), RetryPolicy::from(&cfg.feed));
        let materializer = ImageMaterializer::new(
            epic,
            ImageCache::new(&cfg.cache_dir),
            CropScale::from(&cfg.materialize),
            cfg.feed.archive_base_url.clone(),
        );

        let mut slideshow: Slideshow<_, _, _, OpenWeatherClient> = Slideshow::new(
            poller,
            materializer,
            sink,
            placeholder,
            &cfg.schedule,
            cancel.clone(),
        )
        .with_clock(OverlayClock::new(cfg.timezone, &cfg.overlay));

        match cfg.weather.clone() {
            Some(weather) => {
                let http = http_client(weather.request_timeout)
                    .context("failed to build weather HTTP client")?;
                let cache = WeatherCache::new(weather.refresh_interval);
                slideshow = slideshow.with_weather(cache, OpenWeatherClient::new(http, weather));
            }
            None => info!("weather overlay disabled"),
        }

        slideshow.run().await
    })
}

fn watch_signals(cancel: &CancellationToken) {
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("ctrl-c handler failed: {err}");
                return;
            }
            info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    #[cfg(unix)]
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        received = sigterm.recv() => {
                            if received.is_some() {
                                info!("SIGTERM received; initiating shutdown");
                                cancel.cancel();
                            }
                        }
                    }
                }
                Err(err) => warn!("failed to register SIGTERM handler: {err}"),
            }
        });
    }
}
