use std::io::{Read, Seek};

use speedkit_core::binary::Deserializer;
use thiserror::Error;

use crate::{
    game::Game,
    resources::{Resource, ScenerySectionDecoder, SolidListDecoder, TexturePackDecoder},
};

/// Top-level leaf tags with a registered resource decoder.
pub const SOLID_LIST_TAG: u32 = 0x80134000;
pub const TEXTURE_PACK_TAG: u32 = 0xb3300000;
pub const SCENERY_SECTION_TAG: u32 = 0x80034100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafCategory {
    SolidList,
    TexturePack,
    ScenerySection,
}

impl LeafCategory {
    pub fn from_tag(type_tag: u32) -> Option<Self> {
        match type_tag {
            SOLID_LIST_TAG => Some(Self::SolidList),
            TEXTURE_PACK_TAG => Some(Self::TexturePack),
            SCENERY_SECTION_TAG => Some(Self::ScenerySection),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("cannot process {category:?} chunk for game {game}")]
    UnsupportedGame { category: LeafCategory, game: Game },
}

/// One leaf resource decoder. `decode` consumes the chunk's body (sized after padding
/// removal) from the deserializer's current position and returns the finished resource.
pub trait ResourceDecoder<R: Read + Seek> {
    fn decode(
        &mut self,
        deserializer: &mut Deserializer<R>,
        length: u32,
    ) -> anyhow::Result<Resource>;
}

/// Selects the sub-decoder for a leaf category under the given game's format dialect.
/// Selection is stateless and re-evaluated per leaf; decoders carry no state that must
/// survive between independent leaves.
pub fn resolve<'stream, R: Read + Seek + 'stream>(
    category: LeafCategory,
    game: Game,
) -> Result<Box<dyn ResourceDecoder<R> + 'stream>, DispatchError> {
    match category {
        LeafCategory::SolidList => match game {
            Game::Underground | Game::Underground2 | Game::MostWanted => {
                Ok(Box::new(SolidListDecoder::default()))
            }
            _ => Err(DispatchError::UnsupportedGame { category, game }),
        },
        LeafCategory::TexturePack => match game {
            Game::Underground | Game::Underground2 | Game::MostWanted | Game::World => {
                Ok(Box::new(TexturePackDecoder::default()))
            }
            _ => Err(DispatchError::UnsupportedGame { category, game }),
        },
        LeafCategory::ScenerySection => match game {
            Game::Underground2 => Ok(Box::new(ScenerySectionDecoder::default())),
            _ => Err(DispatchError::UnsupportedGame { category, game }),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::{resolve, DispatchError, LeafCategory};
    use crate::game::Game;

    type Buffer = Cursor<Vec<u8>>;

    #[test]
    fn tags_map_to_categories() {
        assert_eq!(
            LeafCategory::from_tag(0x80134000),
            Some(LeafCategory::SolidList)
        );
        assert_eq!(
            LeafCategory::from_tag(0xb3300000),
            Some(LeafCategory::TexturePack)
        );
        assert_eq!(
            LeafCategory::from_tag(0x80034100),
            Some(LeafCategory::ScenerySection)
        );
        assert_eq!(LeafCategory::from_tag(0x00034100), None);
    }

    #[test]
    fn unmapped_combinations_are_explicit_errors() {
        let error = resolve::<Buffer>(LeafCategory::ScenerySection, Game::MostWanted)
            .err()
            .unwrap();
        assert_eq!(
            error,
            DispatchError::UnsupportedGame {
                category: LeafCategory::ScenerySection,
                game: Game::MostWanted,
            }
        );

        assert!(resolve::<Buffer>(LeafCategory::SolidList, Game::World).is_err());
        assert!(resolve::<Buffer>(LeafCategory::TexturePack, Game::Unknown).is_err());
    }

    #[test]
    fn registered_combinations_resolve() {
        assert!(resolve::<Buffer>(LeafCategory::SolidList, Game::Underground).is_ok());
        assert!(resolve::<Buffer>(LeafCategory::TexturePack, Game::World).is_ok());
        assert!(resolve::<Buffer>(LeafCategory::ScenerySection, Game::Underground2).is_ok());
    }
}
