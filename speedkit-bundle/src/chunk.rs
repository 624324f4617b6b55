use std::io::{Read, Seek, SeekFrom};

use anyhow::Context;
use speedkit_core::{binary::Deserializer, Deserialize};
use tracing::{debug, trace};

use crate::{
    dispatch::{self, LeafCategory},
    game::Game,
    resources::Resource,
};

/// Tags with the high bit set frame a container whose body is itself a chunk sequence.
pub const CONTAINER_TAG_BIT: u32 = 0x8000_0000;

/// Word repeated after a chunk body to pad it out to an alignment boundary.
pub const PADDING_WORD: u32 = 0x1111_1111;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ChunkHeader {
    pub type_tag: u32,
    pub length: u32,
}

impl ChunkHeader {
    pub fn is_container(&self) -> bool {
        self.type_tag & CONTAINER_TAG_BIT != 0
    }
}

/// One decoded chunk. Depending on what the chunk framed, exactly one of `raw_body`,
/// `children`, and `attached_resource` is populated.
#[derive(Debug, Clone, Default)]
pub struct ChunkNode {
    pub type_tag: u32,
    /// Absolute file position of the 8-byte chunk header.
    pub offset: i64,
    /// Body length with the padding words subtracted.
    pub size: u32,
    /// Length of the padding run, always a multiple of 4.
    pub padding: u32,
    /// Size of an immediately preceding zero-tagged filler sibling, 0 if none.
    pub pre_padding: u32,
    pub raw_body: Vec<u8>,
    pub children: Vec<ChunkNode>,
    pub attached_resource: Option<Resource>,
}

impl ChunkNode {
    pub fn has_padding(&self) -> bool {
        self.padding > 0
    }
}

/// Counts padding words from the current position, stopping at the first word that is not
/// the sentinel (rewinding over it) or at `bound`. Returns the padding length in bytes.
pub(crate) fn scan_padding(
    deserializer: &mut Deserializer<impl Read + Seek>,
    bound: u64,
) -> anyhow::Result<u32> {
    let mut padding = 0;
    while deserializer.stream_position() + 4 <= bound {
        if deserializer.deserialize::<u32>()? != PADDING_WORD {
            deserializer.seek(SeekFrom::Current(-4))?;
            break;
        }
        padding += 4;
    }
    Ok(padding)
}

/// Reads the chunk sequence between the current position and `bound`. The same routine
/// serves every nesting depth; `top_level` additionally folds zero-tagged filler siblings
/// into the following chunk's `pre_padding`.
pub(crate) fn read_chunk_list<R: Read + Seek>(
    deserializer: &mut Deserializer<R>,
    bound: u64,
    game: Game,
    top_level: bool,
) -> anyhow::Result<Vec<ChunkNode>> {
    let mut chunks: Vec<ChunkNode> = Vec::new();

    while deserializer.stream_position() < bound {
        let offset = deserializer.stream_position();
        let header = deserializer
            .deserialize::<ChunkHeader>()
            .with_context(|| format!("cannot read chunk header at {offset:08x}"))?;
        let end_offset = deserializer.stream_position() + u64::from(header.length);
        trace!(
            "Chunk 0x{:08x} at {offset:08x}, {} bytes",
            header.type_tag,
            header.length
        );

        let mut node = ChunkNode {
            type_tag: header.type_tag,
            offset: offset as i64,
            ..Default::default()
        };

        if top_level {
            if let Some(previous) = chunks.last() {
                if previous.type_tag == 0 {
                    node.pre_padding = previous.size;
                }
            }
        }

        // Resolve the sub-decoder before touching the body, so that an unsupported game
        // fails with the cursor still right behind the header.
        let decoder = match LeafCategory::from_tag(header.type_tag) {
            Some(category) => Some((category, dispatch::resolve::<R>(category, game)?)),
            None => None,
        };

        node.padding = scan_padding(deserializer, end_offset.min(bound))?;
        node.size = header.length - node.padding;

        if let Some((category, mut decoder)) = decoder {
            node.attached_resource = Some(
                decoder
                    .decode(deserializer, node.size)
                    .with_context(|| format!("cannot decode {category:?} chunk at {offset:08x}"))?,
            );
        } else if header.is_container() {
            let body_end = deserializer.stream_position() + u64::from(node.size);
            node.children = read_chunk_list(deserializer, body_end, game, false)?;
        } else {
            let mut body = vec![0; node.size as usize];
            deserializer
                .read_bytes(&mut body)
                .with_context(|| format!("cannot read body of chunk at {offset:08x}"))?;
            node.raw_body = body;
        }

        // Traversal trusts the declared length, not the sub-decoder's final position.
        let actual = deserializer.stream_position();
        if actual != end_offset {
            debug!(
                "Chunk 0x{:08x} at {offset:08x} left the cursor at {actual:08x}, expected {end_offset:08x}",
                header.type_tag
            );
        }
        deserializer.seek(SeekFrom::Start(end_offset))?;

        chunks.push(node);
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use speedkit_core::binary::Deserializer;

    use crate::game::Game;

    use super::{read_chunk_list, ChunkNode, PADDING_WORD};

    fn chunk(type_tag: u32, body: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + body.len());
        bytes.extend_from_slice(&type_tag.to_le_bytes());
        bytes.extend_from_slice(&(body.len() as u32).to_le_bytes());
        bytes.extend_from_slice(body);
        bytes
    }

    fn padding(words: usize) -> Vec<u8> {
        PADDING_WORD.to_le_bytes().repeat(words)
    }

    fn decode(stream: &[u8]) -> Vec<ChunkNode> {
        let mut deserializer = Deserializer::from_buffer(stream);
        let length = deserializer.stream_length();
        read_chunk_list(&mut deserializer, length, Game::Underground2, true).unwrap()
    }

    fn extent(node: &ChunkNode) -> u64 {
        8 + u64::from(node.size) + u64::from(node.padding)
    }

    #[test]
    fn forest_preserves_file_order_and_extents() {
        let mut stream = chunk(0x00030201, b"abcd");
        stream.extend(chunk(0x00030202, b"efghijkl"));
        stream.extend(chunk(0x00030203, b""));
        let total = stream.len() as u64;

        let chunks = decode(&stream);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].type_tag, 0x00030201);
        assert_eq!(chunks[1].type_tag, 0x00030202);
        assert_eq!(chunks[2].type_tag, 0x00030203);
        assert_eq!(chunks.iter().map(extent).sum::<u64>(), total);
        assert_eq!(chunks[1].raw_body, b"efghijkl");
    }

    #[test]
    fn padding_is_fully_attributed() {
        let mut body = padding(3);
        body.extend_from_slice(b"data");
        let stream = chunk(0x00030201, &body);

        let mut deserializer = Deserializer::from_buffer(&stream[..]);
        let length = deserializer.stream_length();
        let chunks =
            read_chunk_list(&mut deserializer, length, Game::Underground2, true).unwrap();

        assert_eq!(chunks[0].padding, 12);
        assert_eq!(chunks[0].size, 4);
        assert_eq!(chunks[0].raw_body, b"data");
        // The cursor always lands on the declared end, whatever the padding count was.
        assert_eq!(deserializer.stream_position(), stream.len() as u64);
    }

    #[test]
    fn unpadded_chunk_detects_no_padding() {
        let chunks = decode(&chunk(0x00030201, b"\x01\x02\x03\x04"));
        assert_eq!(chunks[0].padding, 0);
        assert_eq!(chunks[0].size, 4);
    }

    #[test]
    fn zero_tag_filler_becomes_pre_padding_of_next_chunk() {
        let mut stream = chunk(0, &[0; 12]);
        stream.extend(chunk(0x00030201, b"bbbb"));
        stream.extend(chunk(0x00030202, b"cccc"));

        let chunks = decode(&stream);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].pre_padding, 12);
        assert_eq!(chunks[2].pre_padding, 0);
    }

    #[test]
    fn containers_recurse_in_order() {
        let inner_leaf = chunk(0x00030202, b"leaf");
        let nested = chunk(0x80030300, &inner_leaf);
        let mut container_body = chunk(0x00030201, b"1234");
        container_body.extend(nested);
        let stream = chunk(0x80030000, &container_body);

        let chunks = decode(&stream);
        assert_eq!(chunks.len(), 1);
        let container = &chunks[0];
        assert!(container.raw_body.is_empty());
        assert_eq!(container.children.len(), 2);
        assert_eq!(container.children[0].raw_body, b"1234");
        assert_eq!(container.children[1].children[0].raw_body, b"leaf");
    }

    #[test]
    fn padded_child_inside_container() {
        let mut child_body = padding(1);
        child_body.extend_from_slice(b"datadata");
        let child = chunk(0x00030201, &child_body);
        let stream = chunk(0x80030000, &child);

        let chunks = decode(&stream);
        let child = &chunks[0].children[0];
        assert_eq!(child.padding, 4);
        assert_eq!(child.size, 8);
        assert_eq!(child.raw_body, b"datadata");
    }

    #[test]
    fn unsupported_game_fails_without_consuming_the_body() {
        // A scenery section leaf, but no scenery decoder is registered for World.
        let stream = chunk(0x80034100, &[0; 16]);
        let mut deserializer = Deserializer::from_buffer(&stream[..]);
        let length = deserializer.stream_length();

        let result = read_chunk_list(&mut deserializer, length, Game::World, true);
        assert!(result.is_err());
        assert_eq!(deserializer.stream_position(), 8);
    }
}
