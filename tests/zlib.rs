use std::error::Error;

use chameleon::formats::png::Png;
use chameleon::{ColorType, Encoder, EncoderConfig, Interlacing};

/// Builds a tiny in-memory PNG, the way the absence of `tests/samples/`
/// fixtures in this workspace requires.
fn minimal_png() -> Vec<u8> {
    let config = EncoderConfig::new(2, 2, ColorType::Grayscale, 8);
    let encoder = Encoder::new(config).unwrap();
    let rows = vec![vec![0u16, 64], vec![128, 255]];
    let mut buf = Vec::new();
    encoder.write(&mut buf, &rows).unwrap();
    buf
}

#[test]
fn test_zlib() -> Result<(), Box<dyn Error>> {
    let png_bytes = minimal_png();

    // Exercises the zlib boundary end to end: IDAT concatenation, inflate,
    // filter reconstruction.
    let mut png = Png::from_reader(png_bytes.as_slice(), false)?;
    let rgb = png.rgb()?;
    assert_eq!(rgb.len(), 4);

    Ok(())
}

#[test]
fn deflate_output_actually_compresses_repetitive_data() {
    let config = EncoderConfig::new(64, 64, ColorType::Grayscale, 8);
    let encoder = Encoder::new(config).unwrap();
    let rows: Vec<Vec<u16>> = (0..64).map(|_| vec![42u16; 64]).collect();

    let mut buf = Vec::new();
    encoder.write(&mut buf, &rows).unwrap();

    // A uniform 64x64 image should compress to well under its raw size.
    assert!(buf.len() < 64 * 64);
}

#[test]
fn interlaced_image_still_round_trips_through_the_zlib_boundary() -> Result<(), Box<dyn Error>> {
    let mut config = EncoderConfig::new(8, 8, ColorType::RGB, 8);
    config.interlacing = Interlacing::Adam7;
    let encoder = Encoder::new(config)?;

    let grid: Vec<Vec<u16>> = (0..8)
        .map(|y| (0..8).flat_map(|x: u16| [x, y, x + y]).collect())
        .collect();
    let passes: [Vec<Vec<u16>>; 7] =
        chameleon::adam7::deinterlace(&grid, 8, 8, 3).try_into().unwrap();

    let mut buf = Vec::new();
    encoder.write_passes(&mut buf, &passes)?;

    let mut png = Png::from_reader(buf.as_slice(), false)?;
    let rgb = png.rgb()?;
    assert_eq!(rgb.len(), 64);

    Ok(())
}
