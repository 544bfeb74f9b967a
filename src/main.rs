//! midi-mlog - compile a MIDI file into a schematic of world processors
//!
//! Usage: midi-mlog --mid song.mid --out song.msch [--copy] [--vfx] ...

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;

use midi_mlog::profile::{DrumOverride, ProgramOverride};
use midi_mlog::{compile_file, CompileConfig, Placement, Schematic};

#[derive(Parser, Debug)]
#[command(name = "midi-mlog")]
#[command(version, about = "Compile MIDI files into Mindustry world processor schematics", long_about = None)]
struct Cli {
    /// The input MIDI file
    #[arg(long, value_name = "FILE")]
    mid: PathBuf,

    /// Write the schematic to this file
    #[arg(long, value_name = "FILE")]
    out: Option<PathBuf>,

    /// Copy the schematic to the clipboard
    #[arg(long)]
    copy: bool,

    /// Configuration file (TOML); flags below override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Show an effect over the processor when a note is played
    #[arg(long)]
    vfx: bool,

    /// Play sounds positionally: `self` (each processor) or `X,Y`
    #[arg(long, value_name = "TARGET", allow_hyphen_values = true)]
    pos: Option<Placement>,

    /// Limit overlapping instances of the same sound
    #[arg(long)]
    limit: bool,

    /// Drum volume; 0 is muted, 1 is normal
    #[arg(long, value_name = "VOLUME")]
    drumvol: Option<f64>,

    /// Note volume; 0 is muted, 1 is normal
    #[arg(long, value_name = "VOLUME")]
    notevol: Option<f64>,

    /// Replace a drum sound: DRUM:SOUND:PITCH:VOLUME (e.g. 38:@sfx-flame:1.5:0.2)
    #[arg(long, value_name = "SPEC")]
    drum: Vec<DrumOverride>,

    /// Replace a program: PROGRAM:SOUND:NOTE:VOLUME:LOOP[:LENGTH] (program 1-128)
    #[arg(long, value_name = "SPEC")]
    prog: Vec<ProgramOverride>,
}

impl Cli {
    fn into_config(self) -> Result<(CompileConfig, Output)> {
        let mut config = match &self.config {
            Some(path) => CompileConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => CompileConfig::default(),
        };

        config.vfx |= self.vfx;
        config.limit |= self.limit;
        if let Some(placement) = self.pos {
            config.placement = placement;
        }
        if let Some(volume) = self.drumvol {
            config.drum_volume = volume;
        }
        if let Some(volume) = self.notevol {
            config.note_volume = volume;
        }
        config.drums.extend(self.drum);
        config.programs.extend(self.prog);
        config.validate()?;

        let output = Output {
            input: self.mid,
            file: self.out,
            copy: self.copy,
        };
        Ok((config, output))
    }
}

struct Output {
    input: PathBuf,
    file: Option<PathBuf>,
    copy: bool,
}

fn schematic_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let (config, output) = Cli::parse().into_config()?;
    if output.file.is_none() && !output.copy {
        log::warn!("neither --out nor --copy given, the schematic will not be saved");
    }

    log::info!(
        "vfx: {}, placement: {:?}, limit: {}, capacity: {} notes per processor",
        config.vfx,
        config.placement,
        config.limit,
        config.capacity()
    );

    let schedule = compile_file(&output.input, &config)?;
    if schedule.units.is_empty() {
        bail!("no processors were generated");
    }

    let schematic = Schematic::layout(&schedule.units, &schematic_name(&output.input))?;

    if output.copy {
        schematic
            .write_clipboard()
            .context("Failed to copy the schematic")?;
        log::info!("copied schematic to the clipboard");
    }
    if let Some(path) = &output.file {
        schematic
            .write_file(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("wrote {}", path.display());
    }

    println!(
        "done: {} notes on {} processors",
        schedule.event_count(),
        schedule.units.len()
    );
    Ok(())
}
