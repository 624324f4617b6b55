//! Thin gateway to the codec the bundles store their compressed payloads in.

use std::io::Read;

use anyhow::Context;
use flate2::read::ZlibDecoder;
use speedkit_core::binary::Deserializer;
use tracing::trace;

/// Decompresses a whole buffer at once.
pub fn decompress(input: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut output = Vec::new();
    ZlibDecoder::new(input)
        .read_to_end(&mut output)
        .context("cannot decompress buffer")?;
    Ok(output)
}

/// Decompresses exactly `compressed_length` bytes from the deserializer's current position
/// into `sink`, returning the decompressed length.
pub fn decompress_stream(
    deserializer: &mut Deserializer<impl Read>,
    sink: &mut Vec<u8>,
    compressed_length: u64,
) -> anyhow::Result<u64> {
    let mut compressed = vec![0; compressed_length as usize];
    deserializer
        .read_bytes(&mut compressed)
        .with_context(|| format!("cannot read {compressed_length} compressed bytes"))?;
    let decompressed = ZlibDecoder::new(compressed.as_slice())
        .read_to_end(sink)
        .context("cannot decompress block")?;
    trace!("Decompressed {compressed_length} bytes into {decompressed}");
    Ok(decompressed as u64)
}
