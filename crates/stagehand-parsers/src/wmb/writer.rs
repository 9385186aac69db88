//! WMB encoder
//!
//! Two passes: [`Layout::plan`] assigns every region an absolute, 16-byte
//! aligned offset, then [`encode`] writes each region at its offset. No
//! offset is ever patched after the fact.

use byteorder::LittleEndian;

use crate::cursor::{align_to, ByteWriter};
use crate::traits::{ParseError, ParseResult};

use super::header::{OffsetTables, Span, WmbHeader, HEADER_SIZE};
use super::records::{
    BATCH_DATA_SIZE, BATCH_DESCRIPTION_SIZE, BATCH_SIZE, BONE_SET_SIZE, BONE_SIZE, MATERIAL_SIZE, MESH_SIZE,
    TEXTURE_SIZE, VERTEX_GROUP_SIZE,
};
use super::WmbModel;

const ALIGNMENT: usize = 16;

/// Bump allocator over file offsets
struct Allocator {
    next: usize,
}

impl Allocator {
    fn reserve(&mut self, size: usize) -> usize {
        if size == 0 {
            return 0;
        }
        let offset = align_to(self.next, ALIGNMENT);
        self.next = offset + size;
        offset
    }
}

#[derive(Default)]
struct MaterialLayout {
    shader_name: usize,
    textures: usize,
    parameters: usize,
}

#[derive(Default)]
struct MeshLayout {
    name: usize,
    batches: usize,
    auxiliary: [usize; 3],
    materials: usize,
}

#[derive(Default)]
struct Layout {
    vertex_groups: usize,
    batches: usize,
    batch_description: usize,
    batch_data: [usize; 4],
    bones: usize,
    bone_index_translate_table: usize,
    bone_sets: usize,
    bone_set_data: Vec<usize>,
    materials: usize,
    material_data: Vec<MaterialLayout>,
    textures: usize,
    meshes: usize,
    mesh_data: Vec<MeshLayout>,
    vertex_buffers: Vec<usize>,
    index_buffers: Vec<usize>,
    total: usize,
}

impl Layout {
    fn plan(model: &WmbModel) -> Self {
        let stride = model.header.vertex_stride();
        let mut alloc = Allocator { next: HEADER_SIZE };
        let mut layout = Layout {
            vertex_groups: alloc.reserve(model.vertex_groups.len() * VERTEX_GROUP_SIZE),
            batches: alloc.reserve(model.batches.len() * BATCH_SIZE),
            ..Layout::default()
        };

        if model.batch_description.groups.iter().any(|g| !g.is_empty()) {
            layout.batch_description = alloc.reserve(BATCH_DESCRIPTION_SIZE);
            for (slot, group) in model.batch_description.groups.iter().enumerate() {
                layout.batch_data[slot] = alloc.reserve(group.len() * BATCH_DATA_SIZE);
            }
        }

        layout.bones = alloc.reserve(model.bones.len() * BONE_SIZE);
        layout.bone_index_translate_table = alloc.reserve(model.bone_index_translate_table.len());
        layout.bone_sets = alloc.reserve(model.bone_sets.len() * BONE_SET_SIZE);
        layout.bone_set_data = model.bone_sets.iter().map(|set| alloc.reserve(set.len())).collect();

        layout.materials = alloc.reserve(model.materials.len() * MATERIAL_SIZE);
        layout.material_data = model
            .materials
            .iter()
            .map(|m| MaterialLayout {
                shader_name: alloc.reserve(m.shader_name.len() + 1),
                textures: alloc.reserve(m.textures.len() * 4),
                parameters: alloc.reserve(m.parameters.len() * 16),
            })
            .collect();
        layout.textures = alloc.reserve(model.textures.len() * TEXTURE_SIZE);

        layout.meshes = alloc.reserve(model.meshes.len() * MESH_SIZE);
        layout.mesh_data = model
            .meshes
            .iter()
            .map(|m| MeshLayout {
                name: alloc.reserve(m.name.len() + 1),
                batches: alloc.reserve(m.batches.len() * 2),
                auxiliary: [
                    alloc.reserve(m.auxiliary_batches[0].len() * 2),
                    alloc.reserve(m.auxiliary_batches[1].len() * 2),
                    alloc.reserve(m.auxiliary_batches[2].len() * 2),
                ],
                materials: alloc.reserve(m.materials.len() * 2),
            })
            .collect();

        layout.vertex_buffers = model
            .vertex_groups
            .iter()
            .map(|g| alloc.reserve(g.vertices.len() * stride))
            .collect();
        layout.index_buffers = model
            .vertex_groups
            .iter()
            .map(|g| alloc.reserve(g.indices.len() * 2))
            .collect();

        layout.total = align_to(alloc.next, ALIGNMENT);
        layout
    }
}

fn to_u32(value: usize) -> ParseResult<u32> {
    u32::try_from(value).map_err(|_| ParseError::InvalidStructure(format!("{} does not fit a 32-bit field", value)))
}

fn span(offset: usize, count: usize) -> ParseResult<Span> {
    Ok(Span::new(to_u32(offset)?, to_u32(count)?))
}

fn write_u16_list(w: &mut ByteWriter<LittleEndian>, offset: usize, items: &[u16]) {
    w.seek(offset);
    for &item in items {
        w.write_u16(item);
    }
}

/// Encode `model` using a freshly computed layout
pub(super) fn encode(model: &WmbModel) -> ParseResult<Vec<u8>> {
    let layout = Layout::plan(model);
    let extended = model.header.is_extended_format();
    let mut w: ByteWriter<LittleEndian> = ByteWriter::with_capacity(layout.total);

    let header = WmbHeader {
        tables: OffsetTables {
            vertex_groups: span(layout.vertex_groups, model.vertex_groups.len())?,
            batches: span(layout.batches, model.batches.len())?,
            batch_description: to_u32(layout.batch_description)?,
            bones: span(layout.bones, model.bones.len())?,
            bone_index_translate_table: span(
                layout.bone_index_translate_table,
                model.bone_index_translate_table.len(),
            )?,
            bone_sets: span(layout.bone_sets, model.bone_sets.len())?,
            materials: span(layout.materials, model.materials.len())?,
            textures: span(layout.textures, model.textures.len())?,
            meshes: span(layout.meshes, model.meshes.len())?,
            cutting_data: 0,
        },
        ..model.header.clone()
    };
    header.write(&mut w);

    w.seek(layout.vertex_groups);
    for (i, group) in model.vertex_groups.iter().enumerate() {
        w.write_u32(to_u32(layout.vertex_buffers[i])?);
        w.write_u32(0);
        w.write_u32(group.opaque[0]);
        w.write_u32(group.opaque[1]);
        w.write_u32(to_u32(group.vertices.len())?);
        w.write_u32(to_u32(layout.index_buffers[i])?);
        w.write_u32(to_u32(group.indices.len())?);
    }

    w.seek(layout.batches);
    for batch in &model.batches {
        w.write_u32(batch.vertex_group_index);
        w.write_u32(batch.vertex_start);
        w.write_u32(batch.index_start);
        w.write_u32(batch.vertex_count);
        w.write_u32(batch.index_count);
    }

    if layout.batch_description != 0 {
        w.seek(layout.batch_description);
        for (slot, group) in model.batch_description.groups.iter().enumerate() {
            span(layout.batch_data[slot], group.len())?.write(&mut w);
        }
        for (slot, group) in model.batch_description.groups.iter().enumerate() {
            w.seek(layout.batch_data[slot]);
            for data in group {
                w.write_u32(data.batch_index);
                w.write_u32(data.mesh_index);
                w.write_u16(data.material_index);
                w.write_i16(data.bone_set_index);
                w.write_u32(data.opaque);
            }
        }
    }

    w.seek(layout.bones);
    for bone in &model.bones {
        w.write_i16(bone.id);
        w.write_i16(bone.parent);
        for v in [
            bone.local_position,
            bone.local_rotation,
            bone.local_scale,
            bone.position,
            bone.rotation,
            bone.scale,
            bone.t_position,
        ] {
            w.write_vec3(v);
        }
    }

    if !model.bone_index_translate_table.is_empty() {
        w.seek(layout.bone_index_translate_table);
        w.write_bytes(&model.bone_index_translate_table);
    }

    for (i, set) in model.bone_sets.iter().enumerate() {
        w.seek(layout.bone_sets + i * BONE_SET_SIZE);
        span(layout.bone_set_data[i], set.len())?.write(&mut w);
        if !set.is_empty() {
            w.seek(layout.bone_set_data[i]);
            w.write_bytes(set);
        }
    }

    for (i, material) in model.materials.iter().enumerate() {
        let at = &layout.material_data[i];
        w.seek(layout.materials + i * MATERIAL_SIZE);
        w.write_u32(to_u32(at.shader_name)?);
        w.write_u32(to_u32(at.textures)?);
        w.write_u32(material.opaque);
        w.write_u32(to_u32(at.parameters)?);
        w.write_u16(u16::try_from(material.textures.len()).map_err(|_| too_many("textures"))?);
        w.write_u16(material.opaque_shorts[0]);
        w.write_u16(material.opaque_shorts[1]);
        w.write_u16(u16::try_from(material.parameters.len()).map_err(|_| too_many("parameters"))?);

        w.seek(at.shader_name);
        w.write_null_terminated_string(&material.shader_name);
        w.seek(at.textures);
        for &texture in &material.textures {
            w.write_u32(texture);
        }
        w.seek(at.parameters);
        for group in &material.parameters {
            for &value in group {
                w.write_f32(value);
            }
        }
    }

    w.seek(layout.textures);
    for texture in &model.textures {
        w.write_u32(texture.flags);
        w.write_u32(texture.id);
    }

    for (i, mesh) in model.meshes.iter().enumerate() {
        let at = &layout.mesh_data[i];
        w.seek(layout.meshes + i * MESH_SIZE);
        w.write_u32(to_u32(at.name)?);
        for value in mesh.bounding_box {
            w.write_f32(value);
        }
        span(at.batches, mesh.batches.len())?.write(&mut w);
        for (slot, list) in mesh.auxiliary_batches.iter().enumerate() {
            span(at.auxiliary[slot], list.len())?.write(&mut w);
        }
        span(at.materials, mesh.materials.len())?.write(&mut w);

        w.seek(at.name);
        w.write_null_terminated_string(&mesh.name);
        write_u16_list(&mut w, at.batches, &mesh.batches);
        for (slot, list) in mesh.auxiliary_batches.iter().enumerate() {
            write_u16_list(&mut w, at.auxiliary[slot], list);
        }
        write_u16_list(&mut w, at.materials, &mesh.materials);
    }

    for (i, group) in model.vertex_groups.iter().enumerate() {
        w.seek(layout.vertex_buffers[i]);
        for vertex in &group.vertices {
            w.write_vec3(vertex.position);
            if extended {
                w.write_bytes(&vertex.payload.unwrap_or([0u8; 20]));
            }
        }
        write_u16_list(&mut w, layout.index_buffers[i], &group.indices);
    }

    w.seek(layout.total);
    w.align(ALIGNMENT);
    let mut bytes = w.into_inner();
    bytes.resize(layout.total.max(HEADER_SIZE), 0);
    Ok(bytes)
}

fn too_many(what: &str) -> ParseError {
    ParseError::InvalidStructure(format!("too many material {} for a 16-bit count", what))
}
