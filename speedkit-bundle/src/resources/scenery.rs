use std::io::{Read, Seek, SeekFrom};

use anyhow::{ensure, Context};
use glam::{Mat3, Mat4, Vec3};
use speedkit_core::{binary::Deserializer, string::FixedString, Deserialize};
use tracing::{debug, trace};

use crate::{
    chunk::{self, ChunkHeader},
    dispatch::ResourceDecoder,
    resources::Resource,
};

const HEADER_CHUNK: u32 = 0x00034101;
const DEFINITIONS_CHUNK: u32 = 0x00034102;
const INSTANCES_CHUNK: u32 = 0x00034103;

const DEFINITION_RECORD_LENGTH: u32 = 0x44;
const INSTANCE_RECORD_LENGTH: u32 = 0x40;

/// One scenery placement section of a track: a catalog of scenery definitions and the
/// placed instances referring into it.
#[derive(Debug, Clone, Default)]
pub struct ScenerySection {
    pub section_number: i32,
    pub infos: Vec<SceneryInfo>,
    pub instances: Vec<SceneryInstance>,
}

#[derive(Debug, Clone)]
pub struct SceneryInfo {
    pub name: String,
    pub solid_key: u32,
}

#[derive(Debug, Clone)]
pub struct SceneryInstance {
    pub info_index: u16,
    pub transform: Mat4,
}

/// Section header record; everything but the section number is a runtime pointer slot
/// zeroed on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct SceneryHeaderRecord {
    pub runtime0: i64,
    pub runtime1: i32,
    pub section_number: i32,
    pub runtime2: i32,
    pub runtime3: i64,
    pub runtime4: i64,
    pub runtime5: i64,
    pub runtime6: i64,
    pub runtime7: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneryDefinitionRecord {
    pub name: FixedString<32>,
    pub solid_keys: [u32; 3],
    pub flags: [u16; 2],
    pub runtime_pointers: [i32; 3],
    pub radius: f32,
    pub hierarchy_key: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneryInstanceRecord {
    pub bbox_min: [f32; 3],
    pub bbox_max: [f32; 3],
    pub info_index: u16,
    pub instance_flags: u16,
    pub preculler_info_index: i32,
    pub position: [f32; 3],
    pub rotation: PackedRotation,
    pub pad: u16,
}

/// 3×3 rotation matrix packed into nine 1.3.12 fixed-point values.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PackedRotation {
    pub elements: [i16; 9],
}

impl PackedRotation {
    const SCALE: f32 = 1.0 / 0x2000 as f32;

    /// The packed triples are matrix rows under the original row-vector convention,
    /// which lands them directly as columns under glam's column-vector convention.
    pub fn to_matrix(&self) -> Mat3 {
        let elements = self.elements.map(|element| f32::from(element) * Self::SCALE);
        Mat3::from_cols_array(&elements)
    }
}

#[derive(Debug, Default)]
pub struct ScenerySectionDecoder {
    section: ScenerySection,
}

impl<R: Read + Seek> ResourceDecoder<R> for ScenerySectionDecoder {
    fn decode(
        &mut self,
        deserializer: &mut Deserializer<R>,
        length: u32,
    ) -> anyhow::Result<Resource> {
        debug!("Decoding scenery section ({length} bytes)");
        self.read_chunks(deserializer, u64::from(length))?;
        Ok(Resource::ScenerySection(std::mem::take(&mut self.section)))
    }
}

impl ScenerySectionDecoder {
    fn read_chunks<R: Read + Seek>(
        &mut self,
        deserializer: &mut Deserializer<R>,
        container_size: u64,
    ) -> anyhow::Result<()> {
        let end_pos = deserializer.stream_position() + container_size;

        while deserializer.stream_position() < end_pos {
            let header = deserializer
                .deserialize::<ChunkHeader>()
                .context("cannot read scenery chunk header")?;
            let chunk_end = deserializer.stream_position() + u64::from(header.length);

            let padding = chunk::scan_padding(deserializer, chunk_end)?;
            let size = header.length - padding;

            if header.is_container() {
                self.read_chunks(deserializer, u64::from(size))?;
            } else {
                match header.type_tag {
                    HEADER_CHUNK => self.read_header(deserializer)?,
                    DEFINITIONS_CHUNK => self.read_definitions(deserializer, size)?,
                    INSTANCES_CHUNK => self.read_instances(deserializer, size)?,
                    // Unknown scenery chunk kinds are expected here; skip to their
                    // declared end.
                    other => trace!("Skipping unrecognized scenery chunk 0x{other:08x}"),
                }
            }

            deserializer.seek(SeekFrom::Start(chunk_end))?;
        }

        Ok(())
    }

    fn read_header(&mut self, deserializer: &mut Deserializer<impl Read>) -> anyhow::Result<()> {
        let header = deserializer
            .deserialize::<SceneryHeaderRecord>()
            .context("cannot read scenery section header")?;
        self.section.section_number = header.section_number;
        debug!("Scenery section {}", self.section.section_number);
        Ok(())
    }

    fn read_definitions(
        &mut self,
        deserializer: &mut Deserializer<impl Read>,
        size: u32,
    ) -> anyhow::Result<()> {
        ensure!(
            size % DEFINITION_RECORD_LENGTH == 0,
            "scenery definitions chunk length 0x{size:x} is not a multiple of 0x{DEFINITION_RECORD_LENGTH:x}"
        );
        let count = (size / DEFINITION_RECORD_LENGTH) as usize;
        self.section.infos.reserve(count);

        for i in 0..count {
            let record = deserializer
                .deserialize::<SceneryDefinitionRecord>()
                .with_context(|| format!("cannot read scenery definition {i}"))?;
            self.section.infos.push(SceneryInfo {
                name: record.name.to_string(),
                solid_key: record.solid_keys[0],
            });
        }

        debug!(
            "Loaded {} scenery definitions for section {}",
            count, self.section.section_number
        );
        Ok(())
    }

    fn read_instances<R: Read + Seek>(
        &mut self,
        deserializer: &mut Deserializer<R>,
        size: u32,
    ) -> anyhow::Result<()> {
        // The instance array starts on a 16-byte boundary; whatever the alignment eats
        // does not count towards the record array.
        let size = size - deserializer.align(0x10)? as u32;
        ensure!(
            size % INSTANCE_RECORD_LENGTH == 0,
            "scenery instances chunk length 0x{size:x} is not a multiple of 0x{INSTANCE_RECORD_LENGTH:x}"
        );
        let count = (size / INSTANCE_RECORD_LENGTH) as usize;
        self.section.instances.reserve(count);

        for i in 0..count {
            let record = deserializer
                .deserialize::<SceneryInstanceRecord>()
                .with_context(|| format!("cannot read scenery instance {i}"))?;
            let rotation = record.rotation.to_matrix();
            // Rotation first, then translation.
            let transform = Mat4::from_translation(Vec3::from_array(record.position))
                * Mat4::from_mat3(rotation);
            self.section.instances.push(SceneryInstance {
                info_index: record.info_index,
                transform,
            });
        }

        debug!(
            "Loaded {} scenery instances for section {}",
            count, self.section.section_number
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec3};
    use speedkit_core::binary::Deserializer;

    use crate::{chunk::PADDING_WORD, dispatch::ResourceDecoder, resources::Resource};

    use super::{
        ScenerySectionDecoder, DEFINITIONS_CHUNK, HEADER_CHUNK, INSTANCES_CHUNK,
    };

    fn chunk(type_tag: u32, body: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + body.len());
        bytes.extend_from_slice(&type_tag.to_le_bytes());
        bytes.extend_from_slice(&(body.len() as u32).to_le_bytes());
        bytes.extend_from_slice(body);
        bytes
    }

    fn header_body(section_number: i32) -> Vec<u8> {
        let mut body = vec![0u8; 0x3C];
        body[0x0C..0x10].copy_from_slice(&section_number.to_le_bytes());
        body
    }

    fn definition_record(name: &str, solid_key: u32) -> Vec<u8> {
        let mut record = vec![0u8; 0x44];
        record[..name.len()].copy_from_slice(name.as_bytes());
        record[0x20..0x24].copy_from_slice(&solid_key.to_le_bytes());
        record
    }

    fn instance_record(info_index: u16, position: [f32; 3], rotation: [i16; 9]) -> Vec<u8> {
        let mut record = Vec::with_capacity(0x40);
        record.extend_from_slice(&[0; 24]);
        record.extend_from_slice(&info_index.to_le_bytes());
        record.extend_from_slice(&[0; 2]);
        record.extend_from_slice(&[0; 4]);
        for coordinate in position {
            record.extend_from_slice(&coordinate.to_le_bytes());
        }
        for element in rotation {
            record.extend_from_slice(&element.to_le_bytes());
        }
        record.extend_from_slice(&[0; 2]);
        record
    }

    const IDENTITY: [i16; 9] = [0x2000, 0, 0, 0, 0x2000, 0, 0, 0, 0x2000];

    fn decode(stream: &[u8]) -> Resource {
        let mut deserializer = Deserializer::from_buffer(stream);
        ScenerySectionDecoder::default()
            .decode(&mut deserializer, stream.len() as u32)
            .unwrap()
    }

    fn scenery(resource: Resource) -> super::ScenerySection {
        match resource {
            Resource::ScenerySection(section) => section,
            other => panic!("expected a scenery section, got a {}", other.kind()),
        }
    }

    #[test]
    fn header_keeps_the_section_number() {
        let stream = chunk(HEADER_CHUNK, &header_body(1207));
        let section = scenery(decode(&stream));
        assert_eq!(section.section_number, 1207);
    }

    #[test]
    fn definitions_decode_in_record_order() {
        let mut body = definition_record("ROAD_BARRIER", 0xcafe0001);
        body.extend(definition_record("LAMP_POST", 0xcafe0002));
        let stream = chunk(DEFINITIONS_CHUNK, &body);

        let section = scenery(decode(&stream));
        assert_eq!(section.infos.len(), 2);
        assert_eq!(section.infos[0].name, "ROAD_BARRIER");
        assert_eq!(section.infos[0].solid_key, 0xcafe0001);
        assert_eq!(section.infos[1].name, "LAMP_POST");
    }

    #[test]
    fn definitions_of_uneven_length_are_a_structural_error() {
        let stream = chunk(DEFINITIONS_CHUNK, &[0; 0x45]);
        let mut deserializer = Deserializer::from_buffer(&stream[..]);
        let result =
            ScenerySectionDecoder::default().decode(&mut deserializer, stream.len() as u32);
        assert!(result.is_err());
    }

    #[test]
    fn sentinel_padding_is_subtracted_before_the_record_count_check() {
        let mut body = PADDING_WORD.to_le_bytes().repeat(2);
        body.extend(definition_record("TREE", 1));
        let stream = chunk(DEFINITIONS_CHUNK, &body);

        let section = scenery(decode(&stream));
        assert_eq!(section.infos.len(), 1);
        assert_eq!(section.infos[0].name, "TREE");
    }

    #[test]
    fn instances_align_to_16_bytes_before_the_count_check() {
        // The header chunk puts the instance body at stream offset 76, so the alignment
        // consumes 4 of the body's bytes before the 0x40-record array starts.
        let mut stream = chunk(HEADER_CHUNK, &header_body(3));
        let mut body = vec![0u8; 4];
        body.extend(instance_record(7, [1.0, 2.0, 3.0], IDENTITY));
        stream.extend(chunk(INSTANCES_CHUNK, &body));

        let section = scenery(decode(&stream));
        assert_eq!(section.instances.len(), 1);

        let instance = &section.instances[0];
        assert_eq!(instance.info_index, 7);
        let expected = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        assert!(instance.transform.abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn rotation_applies_before_translation() {
        // 90 degrees about Z in the packed row layout. The instance body starts at
        // stream offset 8, so the alignment eats the 8 leading filler bytes.
        let rotation: [i16; 9] = [0, 0x2000, 0, -0x2000, 0, 0, 0, 0, 0x2000];
        let mut body = vec![0u8; 8];
        body.extend(instance_record(0, [10.0, 0.0, 0.0], rotation));
        let stream = chunk(INSTANCES_CHUNK, &body);

        let section = scenery(decode(&stream));
        let transformed = section.instances[0].transform.transform_point3(Vec3::X);
        assert!(transformed.abs_diff_eq(Vec3::new(10.0, 1.0, 0.0), 1e-5));
    }

    #[test]
    fn unknown_chunks_are_skipped_without_error() {
        let mut stream = chunk(0x00034199, &[0xab; 24]);
        stream.extend(chunk(DEFINITIONS_CHUNK, &definition_record("WALL", 9)));

        let section = scenery(decode(&stream));
        assert_eq!(section.infos.len(), 1);
    }
}
