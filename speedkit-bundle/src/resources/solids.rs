use std::io::{Read, Seek, SeekFrom};

use anyhow::Context;
use speedkit_core::binary::Deserializer;
use tracing::debug;

use crate::{chunk::ChunkHeader, dispatch::ResourceDecoder, resources::Resource};

/// A captured solid list (compiled mesh pack). The mesh payload layouts vary per title;
/// the chunk framing is walked and the leaf payloads are kept raw for downstream tooling.
#[derive(Debug, Clone, Default)]
pub struct SolidList {
    pub chunks: Vec<SolidChunk>,
}

#[derive(Debug, Clone, Default)]
pub struct SolidChunk {
    pub type_tag: u32,
    pub size: u32,
    pub data: Vec<u8>,
    pub children: Vec<SolidChunk>,
}

#[derive(Debug, Default)]
pub struct SolidListDecoder;

impl<R: Read + Seek> ResourceDecoder<R> for SolidListDecoder {
    fn decode(
        &mut self,
        deserializer: &mut Deserializer<R>,
        length: u32,
    ) -> anyhow::Result<Resource> {
        debug!("Capturing solid list ({length} bytes)");
        let chunks = read_solid_chunks(deserializer, u64::from(length))?;
        Ok(Resource::SolidList(SolidList { chunks }))
    }
}

fn read_solid_chunks<R: Read + Seek>(
    deserializer: &mut Deserializer<R>,
    container_size: u64,
) -> anyhow::Result<Vec<SolidChunk>> {
    let end_pos = deserializer.stream_position() + container_size;
    let mut chunks = Vec::new();

    while deserializer.stream_position() < end_pos {
        let header = deserializer
            .deserialize::<ChunkHeader>()
            .context("cannot read solid list chunk header")?;
        let chunk_end = deserializer.stream_position() + u64::from(header.length);

        let mut node = SolidChunk {
            type_tag: header.type_tag,
            size: header.length,
            ..Default::default()
        };
        if header.is_container() {
            node.children = read_solid_chunks(deserializer, u64::from(header.length))?;
        } else {
            let mut data = vec![0; header.length as usize];
            deserializer
                .read_bytes(&mut data)
                .with_context(|| format!("cannot read solid chunk 0x{:08x}", header.type_tag))?;
            node.data = data;
        }

        deserializer.seek(SeekFrom::Start(chunk_end))?;
        chunks.push(node);
    }

    Ok(chunks)
}
