//! Wavefront OBJ output for decoded submeshes

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use glam::Vec3;
use stagehand_parsers::{SubMesh, Transform};

/// OBJ export options
#[derive(Debug, Clone)]
pub struct ObjExportOptions {
    /// Emit `usemtl material_<n>` before faces of submeshes that have a material
    pub material_groups: bool,
    /// Transform baked into every written position
    pub transform: Transform,
}

impl Default for ObjExportOptions {
    fn default() -> Self {
        Self {
            material_groups: true,
            transform: Transform::IDENTITY,
        }
    }
}

/// Writes submeshes as one OBJ object each
pub struct ObjWriter {
    options: ObjExportOptions,
}

impl ObjWriter {
    pub fn new(options: ObjExportOptions) -> Self {
        Self { options }
    }

    pub fn write_file(&self, meshes: &[SubMesh], output_path: impl AsRef<Path>) -> std::io::Result<()> {
        let mut writer = BufWriter::new(File::create(output_path)?);
        self.write(meshes, &mut writer)?;
        writer.flush()
    }

    pub fn write<W: Write>(&self, meshes: &[SubMesh], out: &mut W) -> std::io::Result<()> {
        let matrix = self.options.transform.to_matrix();
        writeln!(out, "# stagehand")?;

        // OBJ indices are 1-based and global across objects
        let mut base = 1u64;
        for mesh in meshes {
            writeln!(out, "o {}", mesh.name)?;
            for &position in &mesh.positions {
                let p = matrix.transform_point3(Vec3::from(position));
                writeln!(out, "v {} {} {}", p.x, p.y, p.z)?;
            }
            if self.options.material_groups {
                if let Some(material) = mesh.material_index {
                    writeln!(out, "usemtl material_{}", material)?;
                }
            }
            for [a, b, c] in &mesh.triangles {
                writeln!(
                    out,
                    "f {} {} {}",
                    base + u64::from(*a),
                    base + u64::from(*b),
                    base + u64::from(*c)
                )?;
            }
            base += mesh.positions.len() as u64;
        }
        Ok(())
    }
}

impl Default for ObjWriter {
    fn default() -> Self {
        Self::new(ObjExportOptions::default())
    }
}
