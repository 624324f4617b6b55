use std::io::{Read, Seek, SeekFrom};

use anyhow::{ensure, Context};
use speedkit_core::{
    binary::{self, Deserializer},
    string::FixedString,
    Deserialize,
};
use tracing::{debug, trace};

use crate::{
    chunk::ChunkHeader,
    compression,
    dispatch::ResourceDecoder,
    resources::Resource,
};

const INFO_CHUNK: u32 = 0x33310001;
const HASH_CHUNK: u32 = 0x33310002;
const DATA_OFFSETS_CHUNK: u32 = 0x33310003;
const TEXTURE_RECORDS_CHUNK: u32 = 0x33310004;
const DDS_FORMATS_CHUNK: u32 = 0x33310005;
const TEXTURE_DATA_CHUNK: u32 = 0x33320002;

/// Length of the metadata footer at the end of a decompressed texture blob. The texture
/// record sits at the start of the footer and the pixel format tag 0xC bytes before the
/// footer's end.
const TEXTURE_FOOTER_LENGTH: usize = 0x94;

#[derive(Debug, Clone, Default)]
pub struct TexturePack {
    pub version: u32,
    pub name: String,
    pub pipeline_path: String,
    pub hash: u32,
    pub textures: Vec<Texture>,
}

#[derive(Debug, Clone)]
pub struct Texture {
    pub name: String,
    pub width: u16,
    pub height: u16,
    pub tex_hash: u32,
    pub type_hash: u32,
    pub mipmap_count: u8,
    /// D3D format tag; 0 until a DDS annotation or a decompressed footer reveals it.
    pub pixel_format: u32,
    pub data_offset: u32,
    pub data_size: u32,
    pub pitch_or_linear_size: u32,
    pub data: Vec<u8>,
}

/// Per-texture record as stored in the records chunk and in decompressed blob footers.
#[derive(Debug, Clone, Deserialize)]
pub struct TextureRecord {
    pub reserved0: [u8; 12],
    pub hash: u32,
    pub class_hash: u32,
    pub image_placement: u32,
    pub palette_placement: u32,
    pub image_size: u32,
    pub palette_size: u32,
    pub base_image_size: u32,
    pub width: u16,
    pub height: u16,
    pub shift_width: u8,
    pub shift_height: u8,
    pub image_compression: u8,
    pub palette_compression: u8,
    pub palette_entries: u16,
    pub mipmap_count: u8,
    pub tilable_uv: u8,
    pub bias_level: u8,
    pub rendering_order: u8,
    pub scroll_type: u8,
    pub pad0: u8,
    pub apply_alpha_sorting: u8,
    pub alpha_usage: u8,
    pub alpha_blend: u8,
    pub flags: u8,
    pub mipmap_bias: u8,
    pub pad1: u8,
    pub scroll_time_step: i16,
    pub scroll_speed_s: i16,
    pub scroll_speed_t: i16,
    pub offset_s: i16,
    pub offset_t: i16,
    pub scale_s: i16,
    pub scale_t: i16,
    pub reserved1: [u8; 12],
}

/// Entry of the compressed-offset table: where a texture's compressed blob lives in the
/// file and how big it is on both sides of the codec.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DataOffsetRecord {
    pub hash: u32,
    pub offset: u32,
    pub compressed_length: u32,
    pub decompressed_length: u32,
    pub flags: u32,
    pub reserved: u32,
}

#[derive(Debug, Default)]
pub struct TexturePackDecoder {
    pack: TexturePack,
    texture_count: usize,
    compressed: bool,
}

impl<R: Read + Seek> ResourceDecoder<R> for TexturePackDecoder {
    fn decode(
        &mut self,
        deserializer: &mut Deserializer<R>,
        length: u32,
    ) -> anyhow::Result<Resource> {
        debug!("Decoding texture pack ({length} bytes)");
        self.read_chunks(deserializer, u64::from(length))?;
        Ok(Resource::TexturePack(std::mem::take(&mut self.pack)))
    }
}

impl TexturePackDecoder {
    fn read_chunks<R: Read + Seek>(
        &mut self,
        deserializer: &mut Deserializer<R>,
        container_size: u64,
    ) -> anyhow::Result<()> {
        let end_pos = deserializer.stream_position() + container_size;

        while deserializer.stream_position() < end_pos {
            let header = deserializer
                .deserialize::<ChunkHeader>()
                .context("cannot read texture pack chunk header")?;
            let chunk_end = deserializer.stream_position() + u64::from(header.length);

            if header.is_container() {
                self.read_chunks(deserializer, u64::from(header.length))?;
            } else {
                match header.type_tag {
                    INFO_CHUNK => {
                        self.pack.version = deserializer.deserialize()?;
                        self.pack.name = deserializer.deserialize::<FixedString<28>>()?.to_string();
                        self.pack.pipeline_path =
                            deserializer.deserialize::<FixedString<64>>()?.to_string();
                        self.pack.hash = deserializer.deserialize()?;
                        debug!("Texture pack {} ({})", self.pack.name, self.pack.pipeline_path);
                    }
                    HASH_CHUNK => {
                        // One 8-byte entry per texture; the entries themselves carry
                        // nothing the records don't.
                        self.texture_count = (header.length / 8) as usize;
                        self.pack.textures.reserve(self.texture_count);
                        debug!("Expecting {} textures", self.texture_count);
                    }
                    DATA_OFFSETS_CHUNK => {
                        self.compressed = true;
                        while deserializer.stream_position() < chunk_end {
                            self.read_compressed_texture(deserializer)?;
                        }
                    }
                    TEXTURE_RECORDS_CHUNK => {
                        for _ in 0..self.texture_count {
                            let texture = read_texture(deserializer)?;
                            self.pack.textures.push(texture);
                        }
                    }
                    TEXTURE_DATA_CHUNK => {
                        if !self.compressed {
                            self.read_texture_data(deserializer)?;
                        }
                    }
                    DDS_FORMATS_CHUNK => {
                        for texture in &mut self.pack.textures {
                            deserializer.seek(SeekFrom::Current(0x0C))?;
                            texture.pixel_format = deserializer.deserialize()?;
                            deserializer.seek(SeekFrom::Current(0x08))?;
                        }
                    }
                    _ => {}
                }
            }

            deserializer.seek(SeekFrom::Start(chunk_end))?;
        }

        Ok(())
    }

    /// Reads one entry of the compressed-offset table, pulls the blob it points at
    /// through the codec, and recovers the texture from the blob's trailing footer.
    fn read_compressed_texture<R: Read + Seek>(
        &mut self,
        deserializer: &mut Deserializer<R>,
    ) -> anyhow::Result<()> {
        let entry = deserializer
            .deserialize::<DataOffsetRecord>()
            .context("cannot read texture offset record")?;
        let return_position = deserializer.stream_position();

        deserializer.seek(SeekFrom::Start(u64::from(entry.offset)))?;
        let mut blob = Vec::new();
        let decompressed = compression::decompress_stream(
            deserializer,
            &mut blob,
            u64::from(entry.compressed_length),
        )
        .with_context(|| format!("cannot decompress texture 0x{:08x}", entry.hash))?;
        trace!(
            "Texture 0x{:08x}: {} compressed bytes, {decompressed} decompressed",
            entry.hash,
            entry.compressed_length
        );

        ensure!(
            blob.len() >= TEXTURE_FOOTER_LENGTH,
            "decompressed blob for texture 0x{:08x} is shorter than its metadata footer",
            entry.hash
        );
        let mut footer = Deserializer::from_buffer(&blob[blob.len() - TEXTURE_FOOTER_LENGTH..]);
        let mut texture = read_texture(&mut footer)?;
        texture.pixel_format = binary::deserialize(&blob[blob.len() - 0x0C..])?;

        let data_length = texture.data.len();
        ensure!(
            blob.len() >= data_length,
            "cannot read data for texture 0x{:08x} ({})",
            texture.tex_hash,
            texture.name
        );
        texture.data.copy_from_slice(&blob[..data_length]);
        self.pack.textures.push(texture);

        deserializer.seek(SeekFrom::Start(return_position))?;
        Ok(())
    }

    /// Pixel data for every texture, placed relative to the block's base after a fixed
    /// 0x78-byte sub-header.
    fn read_texture_data<R: Read + Seek>(
        &mut self,
        deserializer: &mut Deserializer<R>,
    ) -> anyhow::Result<()> {
        deserializer.seek(SeekFrom::Current(0x78))?;
        let base = deserializer.stream_position();

        for texture in &mut self.pack.textures {
            deserializer.seek(SeekFrom::Start(base + u64::from(texture.data_offset)))?;
            deserializer.read_bytes(&mut texture.data).with_context(|| {
                format!(
                    "cannot read data for texture 0x{:08x} ({})",
                    texture.tex_hash, texture.name
                )
            })?;
        }

        Ok(())
    }
}

/// Reads a texture record followed by its length-prefixed name. The data buffer is
/// allocated here, sized from the record; it is filled in later from whichever data
/// source the pack turns out to have.
fn read_texture(deserializer: &mut Deserializer<impl Read>) -> anyhow::Result<Texture> {
    let record = deserializer
        .deserialize::<TextureRecord>()
        .context("cannot read texture record")?;

    let name_length = deserializer.deserialize::<u8>()?;
    let mut name_bytes = vec![0; name_length as usize];
    deserializer
        .read_bytes(&mut name_bytes)
        .context("cannot read texture name")?;
    while name_bytes.last() == Some(&0) {
        name_bytes.pop();
    }
    let name = String::from_utf8_lossy(&name_bytes).into_owned();

    Ok(Texture {
        name,
        width: record.width,
        height: record.height,
        tex_hash: record.hash,
        type_hash: record.class_hash,
        mipmap_count: record.mipmap_count,
        pixel_format: 0,
        data_offset: record.image_placement,
        data_size: record.image_size,
        pitch_or_linear_size: record.base_image_size,
        data: vec![0; record.image_size as usize],
    })
}
