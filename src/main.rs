//! Program entry point: parses the flag set, prepares the target image and
//! background, then runs the iterative shape search and writes the outputs.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;

use katachi::engine::{
    average_color, color_at_point, most_frequent_color, pixmap_to_image, Color, ColorPicker,
    Model, Raster, ShapeFactory, ShapeType,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Approximate an image with geometric primitives")]
struct Args {
    /// Input image path
    #[arg(short = 'i')]
    input: String,

    /// Output image path (repeatable; .png, .jpg, .svg; a %d in the path
    /// saves numbered frames)
    #[arg(short = 'o', required = true)]
    output: Vec<String>,

    /// Number of shapes to add (repeatable; phases run back to back)
    #[arg(short = 'n', required = true)]
    count: Vec<usize>,

    /// Background color (hex), or "" = average, "top" = most frequent,
    /// "center" = center pixel
    #[arg(long = "bg", default_value = "")]
    background: String,

    /// Alpha value 1..255 (0 lets the optimizer search alpha)
    #[arg(short = 'a', default_value_t = 0)]
    alpha: i32,

    /// Resize large input images to this size before searching
    #[arg(short = 'r', default_value_t = 256)]
    input_size: u32,

    /// Output image size
    #[arg(short = 's', default_value_t = 1024)]
    output_size: i32,

    /// 0=combo 1=triangle 2=rect 3=ellipse 4=circle 5=rotatedrect 6=line
    /// 7=quadratic 8=rotatedellipse 9=polygon
    #[arg(short = 'm', default_value_t = 1)]
    mode: u32,

    /// Number of parallel workers (0 uses all cores)
    #[arg(short = 'j', default_value_t = 0)]
    workers: usize,

    /// Save every Nth frame (requires %d in the output path)
    #[arg(long, default_value_t = 1)]
    nth: usize,

    /// Add N extra shapes per iteration with a reduced search
    #[arg(long = "rep", default_value_t = 0)]
    repeat: usize,

    /// Verbose (-v) and very verbose (-vv) logging
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// RNG seed (0 derives one from the clock)
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Color picker: "", "greyscale", "alpha", "palette1", or a hex list
    #[arg(long = "color", default_value = "")]
    color: String,

    /// Shape factory JSON (overrides -m)
    #[arg(long = "shapes", default_value = "")]
    shapes: String,
}

fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::new();
    match verbose {
        0 => {
            if let Ok(filter) = std::env::var("RUST_LOG") {
                builder.parse_filters(&filter);
            } else {
                builder.filter_level(log::LevelFilter::Warn);
            }
        }
        1 => {
            builder.filter_level(log::LevelFilter::Info);
        }
        2 => {
            builder.filter_level(log::LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
        }
    }
    builder.init();
}

fn load_target(path: &str, input_size: u32) -> Result<Raster> {
    let mut img = image::open(path).with_context(|| format!("reading {path}"))?;
    if input_size > 0 && (img.width().max(img.height())) > input_size {
        img = img.thumbnail(input_size, input_size);
    }
    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    Ok(Raster::from_rgba8(w as i32, h as i32, rgba.into_raw())?)
}

fn pick_background(config: &str, target: &Raster) -> Result<Color> {
    match config {
        "" => {
            info!("setting background to the average color");
            Ok(average_color(target))
        }
        "top" => {
            info!("setting background to the most frequent color");
            Ok(most_frequent_color(target))
        }
        "center" => {
            info!("setting background to the center color");
            Ok(color_at_point(target, target.w() / 2, target.h() / 2))
        }
        hex => Color::from_hex(hex)
            .with_context(|| format!("invalid background color {hex:?}")),
    }
}

fn save_output(model: &Model, path: &str) -> Result<()> {
    info!("writing {path}");
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => {
            pixmap_to_image(model.render())
                .save(path)
                .with_context(|| format!("writing {path}"))?;
        }
        "jpg" | "jpeg" => {
            let rgb = image::DynamicImage::ImageRgba8(pixmap_to_image(model.render())).into_rgb8();
            let file = File::create(path).with_context(|| format!("creating {path}"))?;
            let mut encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(BufWriter::new(file), 95);
            encoder
                .encode(&rgb, rgb.width(), rgb.height(), image::ColorType::Rgb8)
                .with_context(|| format!("writing {path}"))?;
        }
        "svg" => {
            std::fs::write(path, model.svg()).with_context(|| format!("writing {path}"))?;
        }
        other => bail!("unrecognized file extension: .{other}"),
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    for &count in &args.count {
        if count < 1 {
            bail!("shape count must be > 0");
        }
    }

    let seed = if args.seed == 0 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1)
    } else {
        args.seed
    };
    info!("--seed {seed}");

    let workers = if args.workers < 1 {
        std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    } else {
        args.workers
    };
    info!("-j {workers}");

    info!("reading {}", args.input);
    let target = load_target(&args.input, args.input_size)?;
    let background = pick_background(&args.background, &target)?;

    let factory = if args.shapes.is_empty() {
        let t = ShapeType::from_index(args.mode)
            .with_context(|| format!("invalid mode {}", args.mode))?;
        ShapeFactory::basic(&[t])
    } else {
        ShapeFactory::from_json(&args.shapes).context("parsing --shapes")?
    };
    info!("{}", factory.to_json());

    let picker = ColorPicker::from_config(&args.color);
    let mut model = Model::new(target, background, args.output_size, picker);
    model.init_workers(workers, seed);
    info!("0: t=0.000, score={:.6}", model.score);

    let started = Instant::now();
    let mut frame = 0usize;
    for (phase, &count) in args.count.iter().enumerate() {
        info!("count={}, mode={}, alpha={}, repeat={}", count, args.mode, args.alpha, args.repeat);
        for i in 0..count {
            frame += 1;

            let t = Instant::now();
            let n = model.step(&factory, args.alpha, args.repeat);
            info!(
                "{}: t={:.3}, score={:.6}, n={}, n/s={:.0}",
                frame,
                started.elapsed().as_secs_f64(),
                model.score,
                n,
                n as f64 / t.elapsed().as_secs_f64().max(1e-9)
            );

            for output in &args.output {
                let numbered = output.contains("%d");
                let save_frame = numbered && frame % args.nth.max(1) == 0;
                let last = phase == args.count.len() - 1 && i == count - 1;
                if save_frame || last {
                    let path = if numbered {
                        output.replace("%d", &frame.to_string())
                    } else {
                        output.clone()
                    };
                    save_output(&model, &path)?;
                }
            }
        }
    }
    Ok(())
}
