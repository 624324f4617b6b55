use std::io::{Read, Seek};

use anyhow::Context;
use speedkit_core::binary::Deserializer;

pub mod chunk;
pub mod compression;
pub mod dispatch;
pub mod game;
pub mod resources;

use chunk::ChunkNode;
use game::Game;

/// A fully decoded bundle: the ordered top-level chunk forest, with recognized leaf
/// categories decoded into resources along the way.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub chunks: Vec<ChunkNode>,
}

impl Bundle {
    pub fn deserialize(
        deserializer: &mut Deserializer<impl Read + Seek>,
        game: Game,
    ) -> anyhow::Result<Self> {
        let length = deserializer.stream_length();
        let chunks = chunk::read_chunk_list(deserializer, length, game, true)
            .context("cannot read bundle chunks")?;
        Ok(Self { chunks })
    }
}
