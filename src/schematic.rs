//! Schematic layout and writer
//!
//! Places execution units on a square-ish grid around a shared switch and
//! encodes the result in Mindustry's `msch` schematic format (version 1).
//! All multi-byte values are big-endian and strings use Java's modified
//! UTF-8 with a 16-bit length prefix.

use std::fs;
use std::io::Write;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{Error, Result};
use crate::pipeline::ExecutionUnit;

/// Link name under which every processor sees the switch
pub const SWITCH_LINK: &str = "switch1";

const HEADER: &[u8; 4] = b"msch";
const VERSION: u8 = 1;
const PROCESSOR_CONFIG_VERSION: u8 = 1;

const DESCRIPTION: &str = "An auto generated midi schematic\nOnly works in BE";

// TypeIO object tags
const TYPE_BOOL: u8 = 10;
const TYPE_BYTES: u8 = 14;

/// A processor's link to another building, relative to the processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorLink {
    pub name: String,
    pub x: i16,
    pub y: i16,
}

/// What stands on a tile
#[derive(Debug, Clone, PartialEq)]
pub enum TileKind {
    WorldProcessor {
        code: String,
        links: Vec<ProcessorLink>,
    },
    Switch {
        enabled: bool,
    },
}

impl TileKind {
    pub fn block_name(&self) -> &'static str {
        match self {
            TileKind::WorldProcessor { .. } => "world-processor",
            TileKind::Switch { .. } => "switch",
        }
    }
}

/// One placed building
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub x: i32,
    pub y: i32,
    pub kind: TileKind,
}

/// Smallest side length whose square holds `count` cells
pub fn grid_side(count: usize) -> usize {
    let mut side = 1;
    while side * side < count {
        side += 1;
    }
    side
}

/// Grid position of unit `index` when `unit_count` units share the grid
///
/// Cell 0 is reserved for the switch; units fill the following cells row by
/// row, growing downwards.
pub fn unit_position(index: usize, unit_count: usize) -> (i32, i32) {
    let side = grid_side(unit_count + 1);
    let cell = index + 1;
    ((cell % side) as i32, -((cell / side) as i32))
}

/// A placeable set of buildings with metadata tags
#[derive(Debug, Clone, PartialEq)]
pub struct Schematic {
    pub tags: Vec<(String, String)>,
    pub tiles: Vec<Tile>,
}

impl Schematic {
    /// Lay out `units` next to the enable switch
    pub fn layout(units: &[ExecutionUnit], name: &str) -> Result<Self> {
        let mut tiles = Vec::with_capacity(units.len() + 1);

        for (index, unit) in units.iter().enumerate() {
            let (x, y) = unit_position(index, units.len());
            let link = ProcessorLink {
                name: SWITCH_LINK.to_string(),
                x: to_i16(-x)?,
                y: to_i16(-y)?,
            };
            tiles.push(Tile {
                x,
                y,
                kind: TileKind::WorldProcessor {
                    code: unit.instructions().to_string(),
                    links: vec![link],
                },
            });
        }
        tiles.push(Tile {
            x: 0,
            y: 0,
            kind: TileKind::Switch { enabled: false },
        });

        log::debug!(
            "laid out {} processors on a {}-wide grid",
            units.len(),
            grid_side(units.len() + 1)
        );

        Ok(Self {
            tags: vec![
                ("name".to_string(), name.to_string()),
                ("description".to_string(), DESCRIPTION.to_string()),
            ],
            tiles,
        })
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Width and height of the bounding box
    pub fn size(&self) -> (i32, i32) {
        let (min_x, min_y, max_x, max_y) = self.bounds();
        (max_x - min_x + 1, max_y - min_y + 1)
    }

    fn bounds(&self) -> (i32, i32, i32, i32) {
        let mut bounds = (0, 0, 0, 0);
        for tile in &self.tiles {
            bounds.0 = bounds.0.min(tile.x);
            bounds.1 = bounds.1.min(tile.y);
            bounds.2 = bounds.2.max(tile.x);
            bounds.3 = bounds.3.max(tile.y);
        }
        bounds
    }

    /// Encode as an `msch` file
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let (min_x, min_y, _, _) = self.bounds();
        let (width, height) = self.size();

        let mut body = Vec::new();
        write_i16(&mut body, to_i16(width)?);
        write_i16(&mut body, to_i16(height)?);

        write_u8(&mut body, to_u8(self.tags.len(), "tags")?);
        for (key, value) in &self.tags {
            write_utf(&mut body, key)?;
            write_utf(&mut body, value)?;
        }

        let mut palette: Vec<&'static str> = Vec::new();
        for tile in &self.tiles {
            let name = tile.kind.block_name();
            if !palette.contains(&name) {
                palette.push(name);
            }
        }
        write_u8(&mut body, to_u8(palette.len(), "block types")?);
        for name in &palette {
            write_utf(&mut body, name)?;
        }

        write_i32(&mut body, to_i32(self.tiles.len(), "tiles")?);
        for tile in &self.tiles {
            let block = palette
                .iter()
                .position(|name| *name == tile.kind.block_name())
                .unwrap_or(0);
            write_u8(&mut body, block as u8);
            write_i32(
                &mut body,
                pack_point(to_i16(tile.x - min_x)?, to_i16(tile.y - min_y)?),
            );
            match &tile.kind {
                TileKind::WorldProcessor { code, links } => {
                    let config = compress_processor(code, links)?;
                    write_u8(&mut body, TYPE_BYTES);
                    write_i32(&mut body, to_i32(config.len(), "processor config")?);
                    body.extend_from_slice(&config);
                }
                TileKind::Switch { enabled } => {
                    write_u8(&mut body, TYPE_BOOL);
                    write_u8(&mut body, u8::from(*enabled));
                }
            }
            // Rotation
            write_u8(&mut body, 0);
        }

        let mut bytes = Vec::with_capacity(body.len() / 2 + 5);
        bytes.extend_from_slice(HEADER);
        bytes.push(VERSION);
        bytes.extend_from_slice(&deflate(&body)?);
        Ok(bytes)
    }

    /// Encode as the base64 text Mindustry imports from the clipboard
    pub fn to_base64(&self) -> Result<String> {
        Ok(STANDARD.encode(self.to_bytes()?))
    }

    pub fn write_file(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub fn write_clipboard(&self) -> Result<()> {
        let text = self.to_base64()?;
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| Error::Clipboard(e.to_string()))?;
        clipboard
            .set_text(text)
            .map_err(|e| Error::Clipboard(e.to_string()))
    }
}

/// Logic processor config: version, code, then links
fn compress_processor(code: &str, links: &[ProcessorLink]) -> Result<Vec<u8>> {
    let mut raw = Vec::with_capacity(code.len() + 16);
    write_u8(&mut raw, PROCESSOR_CONFIG_VERSION);
    write_i32(&mut raw, to_i32(code.len(), "processor code")?);
    raw.extend_from_slice(code.as_bytes());
    write_i32(&mut raw, to_i32(links.len(), "processor links")?);
    for link in links {
        write_utf(&mut raw, &link.name)?;
        write_i16(&mut raw, link.x);
        write_i16(&mut raw, link.y);
    }
    deflate(&raw)
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// `Point2.pack`
pub fn pack_point(x: i16, y: i16) -> i32 {
    (i32::from(x) << 16) | (i32::from(y) & 0xFFFF)
}

fn to_i16(value: i32) -> Result<i16> {
    i16::try_from(value)
        .map_err(|_| Error::Schematic(format!("coordinate {} does not fit a schematic", value)))
}

fn to_u8(value: usize, what: &str) -> Result<u8> {
    u8::try_from(value).map_err(|_| Error::Schematic(format!("too many {}: {}", what, value)))
}

fn to_i32(value: usize, what: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| Error::Schematic(format!("{} too large: {}", what, value)))
}

fn write_u8(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

fn write_i16(out: &mut Vec<u8>, value: i16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn write_i32(out: &mut Vec<u8>, value: i32) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// `DataOutput.writeUTF`: modified UTF-8 (NUL and surrogates encoded per
/// UTF-16 unit) behind a u16 byte length
fn write_utf(out: &mut Vec<u8>, s: &str) -> Result<()> {
    let mut encoded = Vec::with_capacity(s.len());
    for unit in s.encode_utf16() {
        match unit {
            0x0001..=0x007F => encoded.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                encoded.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                encoded.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                encoded.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                encoded.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                encoded.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }

    let len = u16::try_from(encoded.len()).map_err(|_| {
        Error::Schematic(format!("string of {} bytes is too long", encoded.len()))
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&encoded);
    Ok(())
}
