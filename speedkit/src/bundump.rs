use std::{fs::File, io::BufReader, path::Path};

use anyhow::Context;
use clap::Subcommand;
use speedkit_bundle::{chunk::ChunkNode, game::Game, resources::Resource, Bundle};
use speedkit_core::binary::Deserializer;
use tracing::{debug, info};

#[derive(Clone, Copy, Subcommand)]
pub enum Bundump {
    /// Dump the chunk tree.
    Tree,

    /// Dump every texture pack in the bundle.
    Textures,
    /// Dump every scenery section in the bundle.
    Scenery,
}

pub fn bundump(filename: &Path, game: Game, dump: Bundump) -> anyhow::Result<()> {
    info!(?filename, "Opening bundle");
    let reader = BufReader::new(File::open(filename)?);
    let mut deserializer = Deserializer::new(reader)?;

    debug!("Decoding bundle");
    let bundle = Bundle::deserialize(&mut deserializer, game).context("cannot decode bundle")?;

    match dump {
        Bundump::Tree => print_tree(&bundle.chunks, 0),
        Bundump::Textures => {
            for resource in resources(&bundle.chunks) {
                if let Resource::TexturePack(pack) = resource {
                    println!(
                        "{} ({}) v{} 0x{:08x} — {} textures",
                        pack.name,
                        pack.pipeline_path,
                        pack.version,
                        pack.hash,
                        pack.textures.len()
                    );
                    for (i, texture) in pack.textures.iter().enumerate() {
                        println!(
                            "{i:6} {:>5}x{:<5} {:2} mips {:8} 0x{:08x} {}",
                            texture.width,
                            texture.height,
                            texture.mipmap_count,
                            format_tag(texture.pixel_format),
                            texture.tex_hash,
                            texture.name,
                        );
                    }
                }
            }
        }
        Bundump::Scenery => {
            for resource in resources(&bundle.chunks) {
                if let Resource::ScenerySection(section) = resource {
                    println!(
                        "section {} — {} definitions, {} instances",
                        section.section_number,
                        section.infos.len(),
                        section.instances.len()
                    );
                    for (i, info) in section.infos.iter().enumerate() {
                        println!("{i:6} 0x{:08x} {}", info.solid_key, info.name);
                    }
                }
            }
        }
    }

    Ok(())
}

fn print_tree(chunks: &[ChunkNode], depth: usize) {
    let indent = depth * 2;
    for node in chunks {
        let mut line = format!(
            "{:indent$}0x{:08x} at {:08x}, {} bytes",
            "", node.type_tag, node.offset, node.size
        );
        if node.has_padding() {
            line.push_str(&format!(" (+{} padding)", node.padding));
        }
        if node.pre_padding > 0 {
            line.push_str(&format!(" (pre-padding {})", node.pre_padding));
        }
        if let Some(resource) = &node.attached_resource {
            line.push_str(&format!(" -> {}", resource.kind()));
        }
        println!("{line}");
        print_tree(&node.children, depth + 1);
    }
}

fn resources(chunks: &[ChunkNode]) -> Vec<&Resource> {
    let mut found = Vec::new();
    for node in chunks {
        if let Some(resource) = &node.attached_resource {
            found.push(resource);
        }
        found.extend(resources(&node.children));
    }
    found
}

/// Renders a D3D format tag as its FourCC when it is one, falling back to hex.
fn format_tag(format: u32) -> String {
    let bytes = format.to_le_bytes();
    if format != 0 && bytes.iter().all(|byte| byte.is_ascii_graphic()) {
        bytes.iter().map(|&byte| byte as char).collect()
    } else {
        format!("0x{format:08x}")
    }
}
