use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use midi_mlog::pipeline::scheduler::COOLDOWN_MS;
use midi_mlog::pipeline::Schedule;
use midi_mlog::{compile_file, CompileConfig};
use plotters::prelude::*;

/// Plot which processor plays which note over time
#[derive(Parser, Debug)]
#[command(name = "plot-units")]
struct Args {
    /// The input MIDI file
    #[arg(value_name = "MID")]
    mid: PathBuf,

    /// Output SVG path
    #[arg(value_name = "SVG")]
    output: PathBuf,

    /// Configuration file (TOML)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Schedule with visual effects enabled (smaller processors)
    #[arg(long)]
    vfx: bool,
}

/// Shortest gap between consecutive notes on any single unit
fn min_gap(schedule: &Schedule) -> Option<f64> {
    schedule
        .units
        .iter()
        .flat_map(|unit| unit.trigger_times().windows(2).map(|w| w[1] - w[0]))
        .min_by(|a, b| a.total_cmp(b))
}

fn create_plot(args: &Args, schedule: &Schedule) -> Result<()> {
    let root = SVGBackend::new(&args.output, (1200, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let end_ms = schedule
        .units
        .iter()
        .flat_map(|unit| unit.trigger_times().last().copied())
        .fold(0.0f64, f64::max)
        + COOLDOWN_MS;
    let unit_count = schedule.units.len() as f64;

    let title = format!(
        "{}: {} notes on {} processors",
        args.mid.display(),
        schedule.event_count(),
        schedule.units.len()
    );

    let mut chart = ChartBuilder::on(&root)
        .caption(&title, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..end_ms, -0.5f64..unit_count - 0.5)?;

    chart
        .configure_mesh()
        .x_desc("Time (ms)")
        .y_desc("Processor")
        .x_labels(10)
        .y_labels(schedule.units.len().min(20))
        .draw()?;

    // Each note occupies its unit for the cooldown window
    for (index, unit) in schedule.units.iter().enumerate() {
        let y = index as f64;
        for &t in unit.trigger_times() {
            chart.draw_series(LineSeries::new(
                vec![(t, y), (t + COOLDOWN_MS, y)],
                BLUE.stroke_width(3),
            ))?;
            chart.draw_series(std::iter::once(Circle::new((t, y), 2, RED.filled())))?;
        }
    }

    root.present()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => CompileConfig::load(path)?,
        None => CompileConfig::default(),
    };
    config.vfx |= args.vfx;

    println!("Processor Schedule Plot");
    println!("=======================");
    println!("  Input: {}", args.mid.display());
    println!("  Capacity: {} notes per processor", config.capacity());
    println!();

    let schedule = compile_file(&args.mid, &config)?;
    println!(
        "  Scheduled {} notes on {} processors",
        schedule.event_count(),
        schedule.units.len()
    );

    match min_gap(&schedule) {
        Some(gap) if gap <= COOLDOWN_MS => {
            bail!("Two notes on one processor only {:.3}ms apart", gap)
        }
        Some(gap) => println!("  ✓ Shortest gap on a processor: {:.1}ms", gap),
        None => println!("  ✓ No processor plays more than one note"),
    }

    print!("  Creating plot... ");
    create_plot(&args, &schedule)?;
    println!("done");

    println!();
    println!("Output: {}", args.output.display());

    Ok(())
}
