use std::error::Error;
use std::fs;
use std::io::{BufReader, BufWriter};

use chameleon::adam7;
use chameleon::cli;
use chameleon::formats::png::Png;
use chameleon::formats::ppm::{Pam, Ppm, TupleType};
use chameleon::{ColorType, EncoderConfig, Interlacing};

fn main() -> Result<(), Box<dyn Error>> {
    let args = match cli::InputArguments::build() {
        Ok(args) => args,
        Err(e) => {
            cli::usage();
            return Err(Box::new(e));
        }
    };

    let input_ext = args
        .input_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let output_ext = args
        .output_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match (input_ext.as_str(), output_ext.as_str()) {
        ("png", "ppm") => png_to_ppm(&args)?,
        ("png", "pam") => png_to_pam(&args)?,
        ("ppm", "png") => ppm_to_png(&args)?,
        ("pam", "png") => pam_to_png(&args)?,
        _ => {
            cli::usage();
            return Err(format!(
                "Error: don't know how to convert '.{input_ext}' to '.{output_ext}'."
            )
            .into());
        }
    }

    Ok(())
}

fn png_to_ppm(args: &cli::InputArguments) -> Result<(), Box<dyn Error>> {
    let mut png = Png::from_reader(BufReader::new(fs::File::open(&args.input_path)?), args.lenient)?;
    let (width, height) = png.dimensions();
    let rgb = png.rgb()?;
    let ppm = Ppm::build(&rgb, width, height);
    ppm.write(BufWriter::new(fs::File::create(&args.output_path)?))?;
    Ok(())
}

fn png_to_pam(args: &cli::InputArguments) -> Result<(), Box<dyn Error>> {
    let mut png = Png::from_reader(BufReader::new(fs::File::open(&args.input_path)?), args.lenient)?;
    let (width, height) = png.dimensions();
    let has_alpha = png.preamble.info.color_type.has_alpha()
        || png.preamble.ancillary.transparency.is_some();

    let (rows, tuple_type): (Vec<Vec<u16>>, TupleType) = if has_alpha {
        let rgba = png.rgba()?;
        let rows = rgba
            .chunks(width)
            .map(|row| {
                row.iter()
                    .flat_map(|&(r, g, b, a)| [r as u16, g as u16, b as u16, a as u16])
                    .collect()
            })
            .collect();
        (rows, TupleType::RgbAlpha)
    } else {
        let rgb = png.rgb()?;
        let rows = rgb
            .chunks(width)
            .map(|row| row.iter().flat_map(|&(r, g, b)| [r as u16, g as u16, b as u16]).collect())
            .collect();
        (rows, TupleType::Rgb)
    };

    let pam = Pam::build(&rows, width, height, tuple_type, 255);
    pam.write(BufWriter::new(fs::File::create(&args.output_path)?))?;
    Ok(())
}

/// Picks the smallest legal PNG bit depth for `color_type` that can hold
/// `maxval` losslessly, and the samples rescaled to it.
fn rescale_to_png_depth(
    rows: &[Vec<u16>],
    maxval: u32,
    color_type: ColorType,
) -> (u8, Vec<Vec<u16>>) {
    let source_bits = 32 - maxval.leading_zeros();
    let depth = color_type
        .allowed_depths()
        .iter()
        .copied()
        .find(|&d| (1u32 << d) - 1 >= maxval)
        .unwrap_or(16);

    if depth as u32 == source_bits {
        (depth, rows.to_vec())
    } else {
        let rescaled = rows
            .iter()
            .map(|row| chameleon::sample::rescale_row(row, source_bits as u8, depth))
            .collect();
        (depth, rescaled)
    }
}

fn write_png(
    out: impl std::io::Write,
    mut config: EncoderConfig,
    rows: Vec<Vec<u16>>,
    interlace: bool,
    level: u32,
) -> Result<(), Box<dyn Error>> {
    config.compression_level = level;
    let width = config.width;
    let height = config.height;
    let planes = config.color_type.planes() as usize;

    if interlace {
        config.interlacing = Interlacing::Adam7;
        let encoder = chameleon::Encoder::new(config)?;
        let passes = adam7::deinterlace(&rows, width, height, planes);
        let passes: [Vec<Vec<u16>>; 7] = passes
            .try_into()
            .map_err(|_| "failed to split image into seven Adam7 passes")?;
        encoder.write_passes(out, &passes)?;
    } else {
        let encoder = chameleon::Encoder::new(config)?;
        encoder.write(out, &rows)?;
    }
    Ok(())
}

fn ppm_to_png(args: &cli::InputArguments) -> Result<(), Box<dyn Error>> {
    let ppm = Ppm::read(BufReader::new(fs::File::open(&args.input_path)?))?;
    let (depth, rows) = rescale_to_png_depth(&ppm.rows(), ppm.maxval, ColorType::RGB);
    let config = EncoderConfig::new(ppm.width as u32, ppm.height as u32, ColorType::RGB, depth);
    write_png(
        BufWriter::new(fs::File::create(&args.output_path)?),
        config,
        rows,
        args.interlace,
        args.compression_level,
    )
}

fn pam_to_png(args: &cli::InputArguments) -> Result<(), Box<dyn Error>> {
    let pam = Pam::read(BufReader::new(fs::File::open(&args.input_path)?))?;
    let color_type = match pam.tuple_type {
        TupleType::Grayscale => ColorType::Grayscale,
        TupleType::GrayscaleAlpha => ColorType::GrayscaleAlpha,
        TupleType::Rgb => ColorType::RGB,
        TupleType::RgbAlpha => ColorType::RGBA,
    };
    let (depth, rows) = rescale_to_png_depth(&pam.rows(), pam.maxval, color_type);

    let mut config = EncoderConfig::new(pam.width as u32, pam.height as u32, color_type, depth);
    if let Some(sbit) = pam.implied_sbit() {
        config.significant_bits = Some(sbit);
    }

    write_png(
        BufWriter::new(fs::File::create(&args.output_path)?),
        config,
        rows,
        args.interlace,
        args.compression_level,
    )
}
