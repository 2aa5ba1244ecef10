//! A pure, dependency-light PNG codec with a PPM/PAM bridge and CLI.
//!
//! Decode with [`decoder::Decoder`], encode with [`encoder::Encoder`], or go
//! through the thinner [`formats::png::Png`] façade for the common case.

pub mod adam7;
pub mod chunk;
pub mod cli;
pub mod compression;
pub mod decoder;
pub mod encoder;
pub mod filter;
pub mod formats;
pub mod info;
pub mod pack;
pub mod sample;
pub mod text;

pub use decoder::{DecodeError, Decoder, Preamble, Reader};
pub use encoder::{EncodeError, Encoder, EncoderConfig, FilterPolicy};
pub use info::{ColorType, ImageInfo, Interlacing, PaletteEntry};
