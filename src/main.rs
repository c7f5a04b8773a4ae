use clap::{Parser, ValueEnum};
use log::LevelFilter;
use pbr::ProgressBar;
use rrt_wavefront::*;
use std::error::Error;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::{thread, time};

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
  Error,
  Warn,
  Info,
  Debug,
  Trace,
}

impl From<LogLevel> for LevelFilter {
  fn from(level: LogLevel) -> LevelFilter {
    match level {
      LogLevel::Error => LevelFilter::Error,
      LogLevel::Warn => LevelFilter::Warn,
      LogLevel::Info => LevelFilter::Info,
      LogLevel::Debug => LevelFilter::Debug,
      LogLevel::Trace => LevelFilter::Trace,
    }
  }
}

#[derive(Parser)]
#[command(name = "rrt-wavefront", version)]
#[command(author = "Jean-Francois Roy <jf@devklog.net>")]
#[command(about = "Megakernel and wavefront path tracing on the CPU")]
struct Args {
  /// Maximum number of bounces
  #[arg(short = 'd', long, default_value_t = 10)]
  max_depth: u32,

  /// Samples per pixel
  #[arg(short = 's', long, default_value_t = 32)]
  sample_count: u32,

  /// Use the wavefront renderer (default)
  #[arg(short = 'w', long, conflicts_with = "megakernel")]
  wavefront: bool,

  /// Use the megakernel renderer
  #[arg(short = 'm', long)]
  megakernel: bool,

  /// Samples of every pixel traced together
  #[arg(long, default_value_t = 4)]
  samples_per_run: u32,

  /// Output resolution in pixels
  #[arg(short = 'r', long, default_value = "1280x720", value_parser = parse_resolution)]
  resolution: (u32, u32),

  /// Output PNG path
  #[arg(short = 'o', long, default_value = "out.png")]
  output: PathBuf,

  /// Seed of the built-in scene
  #[arg(short = 'e', long, default_value_t = 0)]
  seed: u64,

  /// Device threads, 0 for one per core
  #[arg(short = 't', long, default_value_t = 0)]
  threads: usize,

  /// Logging level, RUST_LOG takes precedence
  #[arg(long, value_enum, default_value = "info")]
  log_level: LogLevel,

  /// Scene to render (.obj); the built-in scene when omitted
  scene_path: Option<PathBuf>,
}

fn main() {
  let args = Args::parse();
  env_logger::Builder::new()
    .filter_level(args.log_level.clone().into())
    .parse_default_env()
    .init();

  // Failures are fatal and leave no partial output behind.
  if let Err(e) = run(args) {
    log::error!("{}", e);
    std::process::abort();
  }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
  let (w, h) = args.resolution;
  let settings = RenderSettings {
    width: w,
    height: h,
    max_depth: args.max_depth,
    sample_count: args.sample_count,
    samples_per_run: args.samples_per_run,
    threads: args.threads,
  };
  let kind = if args.megakernel && !args.wavefront {
    RendererKind::Megakernel
  } else {
    RendererKind::Wavefront
  };

  let scene = match &args.scene_path {
    Some(path) => loader::load_scene(path)?,
    None => default_scene::build(args.seed)?,
  };
  let pose = scene
    .camera_pose()
    .unwrap_or_else(|| scene.framing_camera_pose());
  let camera = Camera::from_pose(w, h, &pose);
  let device = Arc::new(Device::new(args.threads)?);

  let pxcount = Arc::new(AtomicUsize::new(0));
  let mut renderer = create_renderer(kind, device, settings, Some(Arc::clone(&pxcount)))?;
  log::info!(
    "Rendering {} x {} image using {} samples per pixel ({} renderer, depth {}).",
    w,
    h,
    settings.sample_count,
    renderer.name(),
    settings.max_depth
  );

  let ui_pxcount = Arc::clone(&pxcount);
  let total = settings.pixel_count() * settings.sample_count as usize;
  let ui_thread = thread::Builder::new()
    .name("ui".to_string())
    .spawn(move || {
      let mut pb = ProgressBar::new(total as u64);
      loop {
        let x = ui_pxcount.load(Ordering::Relaxed);
        pb.set(x as u64);
        if x >= total {
          break;
        }
        thread::sleep(time::Duration::from_millis(250));
      }
      pb.finish();
    })?;

  let output = renderer.render_frame(&camera, &scene)?;
  ui_thread
    .join()
    .map_err(|_| "progress thread panicked")?;
  output.framebuffer.save_png(&args.output)?;
  Ok(())
}

fn parse_resolution(s: &str) -> Result<(u32, u32), String> {
  let (w, h) = s
    .split_once('x')
    .ok_or_else(|| format!("invalid resolution {:?}, expected WxH", s))?;
  let w = w.parse::<u32>().map_err(|e| e.to_string())?;
  let h = h.parse::<u32>().map_err(|e| e.to_string())?;
  Ok((w, h))
}
