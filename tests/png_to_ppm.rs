use std::error::Error;
use std::fs;

use chameleon::formats::png::Png;
use chameleon::formats::ppm::Ppm;
use chameleon::{ColorType, Encoder, EncoderConfig};

#[test]
fn test_png_to_ppm() -> Result<(), Box<dyn Error>> {
    fs::create_dir_all("tests/output")?;

    // A small gradient, in place of the fixture file the teacher's original
    // test read from disk.
    let config = EncoderConfig::new(4, 1, ColorType::RGB, 8);
    let encoder = Encoder::new(config)?;
    let rows = vec![vec![0u16, 0, 0, 64, 64, 64, 128, 128, 128, 255, 255, 255]];
    let mut png_bytes = Vec::new();
    encoder.write(&mut png_bytes, &rows)?;

    let mut png = Png::from_reader(png_bytes.as_slice(), false)?;
    let (width, height) = png.dimensions();
    let rgb = png.rgb()?;

    let ppm = Ppm::build(&rgb, width, height);
    ppm.write(fs::File::create("tests/output/gradient.ppm")?)?;

    let read_back = Ppm::read(fs::File::open("tests/output/gradient.ppm")?)?;
    assert_eq!(read_back.rows(), ppm.rows());

    Ok(())
}
