use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::quantize::{gamma22_to_u8, u8_gamma22_to_linear};
use crate::{FbError, RgbImage};

const PPM_MAGIC: &str = "P3";
const FBD_MAGIC: &str = "FbDump";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DumpFormat {
    /// ASCII PPM, gamma-2.2 encoded 8-bit values.
    Ppm,
    /// Full precision float dump, little-endian bytes as hex.
    Fbd,
}

impl DumpFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Ppm => "ppm",
            Self::Fbd => "fbd",
        }
    }
}

/// What an image dump holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Beauty,
    /// Per-pixel sample count in channel 0.
    NumSample,
}

pub fn write_image<W: Write>(
    image: &RgbImage,
    kind: ImageKind,
    format: DumpFormat,
    mut out: W,
) -> Result<(), FbError> {
    let magic = match format {
        DumpFormat::Ppm => PPM_MAGIC,
        DumpFormat::Fbd => FBD_MAGIC,
    };
    write!(out, "{magic}\n{} {}\n", image.width(), image.height())?;
    if format == DumpFormat::Ppm {
        writeln!(out, "255")?;
    }

    let max_n = image.max_channel0().trunc();
    for y in (0..image.height()).rev() {
        for x in 0..image.width() {
            let pixel = image.pixel(x, y);
            match (format, kind) {
                (DumpFormat::Ppm, ImageKind::Beauty) => {
                    for c in pixel {
                        write!(out, "{} ", gamma22_to_u8(c))?;
                    }
                }
                (DumpFormat::Ppm, ImageKind::NumSample) => {
                    let n = pixel[0].max(0.0).trunc();
                    let scaled = if max_n > 0.0 { n * 255.0 / max_n } else { 0.0 };
                    write!(out, "{} {} 0 ", n.min(255.0) as u8, scaled as u8)?;
                }
                (DumpFormat::Fbd, ImageKind::Beauty) => {
                    for c in pixel {
                        write!(out, "{} ", hex_float(c))?;
                    }
                }
                (DumpFormat::Fbd, ImageKind::NumSample) => {
                    let n = pixel[0].max(0.0).trunc();
                    let normalized = if max_n > 0.0 { n / max_n } else { 0.0 };
                    write!(
                        out,
                        "{} {} {} ",
                        hex_float(n),
                        hex_float(normalized),
                        hex_float(0.0)
                    )?;
                }
            }
        }
    }
    out.flush()?;
    Ok(())
}

pub fn read_image<R: Read>(
    kind: ImageKind,
    format: DumpFormat,
    mut input: R,
) -> Result<RgbImage, FbError> {
    let mut text = String::new();
    input.read_to_string(&mut text)?;
    let mut tokens = text.split_whitespace();

    let expected_magic = match format {
        DumpFormat::Ppm => PPM_MAGIC,
        DumpFormat::Fbd => FBD_MAGIC,
    };
    let magic = tokens.next().unwrap_or_default();
    if magic != expected_magic {
        return Err(FbError::Format(format!(
            "unsupported header '{magic}', expected '{expected_magic}'"
        )));
    }
    let width = parse_dimension(tokens.next(), "width")?;
    let height = parse_dimension(tokens.next(), "height")?;
    if format == DumpFormat::Ppm {
        let reso = tokens.next().unwrap_or_default();
        if reso != "255" {
            return Err(FbError::Format(format!(
                "unsupported color resolution '{reso}'"
            )));
        }
    }

    let mut image = RgbImage::new(width, height);
    for y in (0..height).rev() {
        for x in 0..width {
            let mut channel = [0.0f32; 3];
            for slot in channel.iter_mut() {
                let token = tokens.next().ok_or_else(|| {
                    FbError::Format(format!("truncated pixel data at ({x}, {y})"))
                })?;
                *slot = match format {
                    DumpFormat::Ppm => {
                        let code: u8 = token.parse().map_err(|_| {
                            FbError::Format(format!("invalid 8-bit value '{token}'"))
                        })?;
                        match kind {
                            ImageKind::Beauty => u8_gamma22_to_linear(code),
                            ImageKind::NumSample => code as f32,
                        }
                    }
                    DumpFormat::Fbd => parse_hex_float(token)?,
                };
            }
            let value = match kind {
                ImageKind::Beauty => channel,
                ImageKind::NumSample => [channel[0]; 3],
            };
            image.set_pixel(x, y, value);
        }
    }
    Ok(image)
}

pub fn write_image_file(
    path: &Path,
    image: &RgbImage,
    kind: ImageKind,
    format: DumpFormat,
) -> Result<(), FbError> {
    let file = fs::File::create(path)?;
    write_image(image, kind, format, std::io::BufWriter::new(file))?;
    tracing::debug!(path = %path.display(), width = image.width(), height = image.height(), "wrote image dump");
    Ok(())
}

pub fn read_image_file(path: &Path, kind: ImageKind, format: DumpFormat) -> Result<RgbImage, FbError> {
    let file = fs::File::open(path)?;
    read_image(kind, format, std::io::BufReader::new(file))
}

fn parse_dimension(token: Option<&str>, what: &str) -> Result<u32, FbError> {
    token
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| FbError::Format(format!("missing or invalid {what}")))
}

fn hex_float(value: f32) -> String {
    value
        .to_le_bytes()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

fn parse_hex_float(token: &str) -> Result<f32, FbError> {
    let invalid = || FbError::Format(format!("invalid hex float '{token}'"));
    if token.len() != 8 || !token.is_ascii() {
        return Err(invalid());
    }
    let mut bytes = [0u8; 4];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&token[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
    }
    Ok(f32::from_le_bytes(bytes))
}
