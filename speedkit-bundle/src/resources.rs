mod scenery;
mod solids;
mod textures;

pub use scenery::*;
pub use solids::*;
pub use textures::*;

/// A decoded leaf payload attached to a chunk node.
#[derive(Debug, Clone)]
pub enum Resource {
    TexturePack(TexturePack),
    SolidList(SolidList),
    ScenerySection(ScenerySection),
}

impl Resource {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TexturePack(_) => "texture pack",
            Self::SolidList(_) => "solid list",
            Self::ScenerySection(_) => "scenery section",
        }
    }
}
