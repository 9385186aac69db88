//! MOT (animation) codec
//!
//! A MOT file is a 44-byte header followed by a table of 12-byte records.
//! Each record animates one property of one bone (or of the camera or
//! camera target) and points at a key block in one of several compact
//! encodings. A record with bone index `0x7FFF` ends the table.

mod curves;
mod keyframes;
pub mod pghalf;
mod records;
mod seq;

pub use curves::{build_property_animations, PropertyAnimation, PropertyCurve};
pub use keyframes::{Interpolation, KeyEncoding, Keyframe};
pub use records::{
    Channel, MotHeader, MotRecord, Property, RawRecord, Target, ARMATURE_OBJECT_ID, CAMERA_ID, CAM_TARGET_ID,
    HEADER_SIZE, MOT_MAGIC, RECORD_SIZE, TERMINATOR_ID,
};
pub use seq::{
    attack_intervals, find_seq_sibling, load_attack_intervals, seq_sibling_path, AttackInterval, SEQ_SIBLING_SLOTS,
};

use byteorder::LittleEndian;
use serde::Serialize;
use stagehand_core::{DecodeReport, Diagnostic, DiagnosticKind, EntryOutcome};
use tracing::{debug, warn};

use crate::cursor::{ByteReader, ByteWriter};
use crate::traits::{HumanReadable, ParseOptions, ParseResult, Parser};
use crate::transform::FRAME_RATE;

/// Which kinds of animation a record set carries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub has_armature: bool,
    pub has_camera: bool,
}

/// Scan `records` once for armature and camera tracks
pub fn classify<'a>(records: impl IntoIterator<Item = &'a MotRecord>) -> Classification {
    records.into_iter().fold(Classification::default(), |mut c, record| {
        if record.is_camera() {
            c.has_camera = true;
        } else {
            c.has_armature = true;
        }
        c
    })
}

/// Split records into disjoint (armature, camera) sets; their union is the input
pub fn partition(records: &[MotRecord]) -> (Vec<&MotRecord>, Vec<&MotRecord>) {
    records.iter().partition(|record| !record.is_camera())
}

/// Target playback range in frames, inclusive
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlaybackRange {
    pub start: i32,
    pub end: i32,
    pub fps: f32,
}

/// A decoded MOT file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MotFile {
    pub header: MotHeader,
    pub records: Vec<MotRecord>,
    /// Records skipped while decoding
    pub report: DecodeReport,
}

impl MotFile {
    pub fn new(name: impl Into<String>, frame_count: u16) -> Self {
        Self {
            header: MotHeader {
                version: 0x2006_0102,
                flags: 0,
                frame_count,
                records_offset: HEADER_SIZE as u32,
                record_count: 1,
                unknown: 0,
                name: name.into(),
            },
            records: Vec::new(),
            report: DecodeReport::new(),
        }
    }

    /// Decode a MOT file.
    ///
    /// Header and record-table failures abort. A record with an unknown
    /// property or encoding, an unreadable key block, or decreasing frames is
    /// skipped and reported.
    pub fn decode(data: &[u8]) -> ParseResult<Self> {
        let mut reader: ByteReader<'_, LittleEndian> = ByteReader::new(data);
        let header = MotHeader::parse(&mut reader)?;
        reader.seek(header.records_offset as usize)?;

        let mut records = Vec::new();
        let mut report = DecodeReport::new();
        for index in 0..header.record_count {
            let raw = RawRecord::parse(&mut reader).map_err(|e| e.with_context(format!("record {}", index)))?;
            if raw.is_terminator() {
                break;
            }
            if let Some(record) = decode_record(&mut reader, index, &raw).collect_into(&mut report) {
                records.push(record);
            }
        }

        debug!(
            name = %header.name,
            frames = header.frame_count,
            records = records.len(),
            skipped = report.len(),
            "MOT decoded"
        );
        Ok(Self { header, records, report })
    }

    /// Encode with encodings 0, 1 and 4; the header's table fields are recomputed
    pub fn encode(&self) -> ParseResult<Vec<u8>> {
        let records_offset = HEADER_SIZE;
        let table_size = (self.records.len() + 1) * RECORD_SIZE;
        let mut w: ByteWriter<LittleEndian> = ByteWriter::new();

        w.seek(records_offset + table_size);
        let mut table = Vec::with_capacity(self.records.len() + 1);
        for record in &self.records {
            table.push(keyframes::write_key_block(&mut w, record)?);
        }
        table.push(RawRecord::terminator());

        w.seek(0);
        MotHeader {
            records_offset: records_offset as u32,
            record_count: table.len() as u32,
            ..self.header.clone()
        }
        .write(&mut w)?;
        w.seek(records_offset);
        for raw in &table {
            raw.write(&mut w);
        }
        Ok(w.into_inner())
    }

    pub fn classify(&self) -> Classification {
        classify(&self.records)
    }

    pub fn playback_range(&self) -> PlaybackRange {
        PlaybackRange {
            start: 0,
            end: i32::from(self.header.frame_count) - 1,
            fps: FRAME_RATE,
        }
    }

    pub fn property_animations(&self) -> Vec<PropertyAnimation> {
        build_property_animations(&self.records)
    }
}

fn decode_record(reader: &mut ByteReader<'_, LittleEndian>, index: u32, raw: &RawRecord) -> EntryOutcome<MotRecord> {
    let entry = format!("record {} (bone {:#06x})", index, raw.bone_index);
    let skip = |message: String| {
        warn!(%entry, %message, "skipping MOT record");
        EntryOutcome::Skip(Diagnostic::new(DiagnosticKind::CorruptRecord, entry.clone(), message))
    };

    let Some(property) = Property::from_raw(raw.property) else {
        return skip(format!("unknown property {}", raw.property));
    };
    let Some(encoding) = KeyEncoding::from_raw(raw.encoding) else {
        return skip(format!("unknown key encoding {}", raw.encoding));
    };
    let keys = match keyframes::decode_keys(reader, raw, encoding) {
        Ok(keys) => keys,
        Err(e) => return skip(format!("key block unreadable: {}", e)),
    };
    if let Some(pair) = keys.windows(2).find(|pair| pair[1].frame < pair[0].frame) {
        return skip(format!("frames decrease from {} to {}", pair[0].frame, pair[1].frame));
    }

    EntryOutcome::Ok(MotRecord {
        bone_index: raw.bone_index,
        property,
        encoding,
        keys,
        opaque: raw.opaque,
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MotParser;

impl MotParser {
    pub fn new() -> Self {
        Self
    }
}

impl Parser for MotParser {
    type Output = MotFile;

    fn extensions(&self) -> &[&str] {
        &["mot"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(MOT_MAGIC)
    }

    fn name(&self) -> &str {
        "MOT Animation Parser"
    }

    fn parse_bytes(&self, data: &[u8], _options: &ParseOptions) -> ParseResult<Self::Output> {
        MotFile::decode(data)
    }
}

impl HumanReadable for MotFile {
    fn to_readable_string(&self) -> String {
        let kinds = self.classify();
        let range = self.playback_range();
        let mut out = format!(
            "MOT '{}': {} frames (playback {}..={} @ {} fps), {} records\n",
            self.header.name,
            self.header.frame_count,
            range.start,
            range.end,
            range.fps,
            self.records.len()
        );
        out.push_str(&format!(
            "  armature: {}, camera: {}\n",
            kinds.has_armature, kinds.has_camera
        ));
        for animation in self.property_animations() {
            out.push_str(&format!(
                "  {} {}: {} keys ({:?})\n",
                animation.target,
                animation.property,
                animation.curve.keys.len(),
                animation.curve.interpolation
            ));
        }
        for diagnostic in self.report.iter() {
            out.push_str(&format!("  skipped {}\n", diagnostic));
        }
        out
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "format": "MOT",
            "name": self.header.name,
            "frame_count": self.header.frame_count,
            "flags": self.header.flags,
            "unknown": self.header.unknown,
            "classification": self.classify(),
            "playback_range": self.playback_range(),
            "animations": self.property_animations(),
            "diagnostics": self.report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn track(bone: u16, raw_property: u8, encoding: KeyEncoding, keys: Vec<Keyframe>) -> MotRecord {
        MotRecord {
            bone_index: bone,
            property: Property::from_raw(raw_property).unwrap(),
            encoding,
            keys,
            opaque: 0,
        }
    }

    fn sample() -> MotFile {
        let mut mot = MotFile::new("pl0000_0010", 60);
        mot.records = vec![
            track(0, 3, KeyEncoding::Constant, vec![Keyframe::new(0, 0.25)]),
            track(
                1,
                0,
                KeyEncoding::Float,
                vec![Keyframe::new(0, 0.0), Keyframe::new(1, 0.5), Keyframe::new(2, 1.0)],
            ),
            track(
                CAMERA_ID,
                1,
                KeyEncoding::Hermite,
                vec![Keyframe::hermite(0, 1.0, 0.0, 0.1), Keyframe::hermite(30, 2.0, 0.2, 0.0)],
            ),
        ];
        mot
    }

    #[test]
    fn test_encode_decode() {
        let mot = sample();
        let decoded = MotFile::decode(&mot.encode().unwrap()).unwrap();
        assert!(decoded.report.is_clean());
        assert_eq!(decoded.header.name, "pl0000_0010");
        assert_eq!(decoded.header.record_count, 4);
        assert_eq!(decoded.records, mot.records);
    }

    #[test]
    fn test_sparse_linear_keys_are_resampled() {
        let mut mot = MotFile::new("a", 10);
        mot.records = vec![track(
            4,
            8,
            KeyEncoding::Quantized16,
            vec![Keyframe::new(0, 0.0), Keyframe::new(4, 2.0)],
        )];
        let decoded = MotFile::decode(&mot.encode().unwrap()).unwrap();
        let record = &decoded.records[0];
        assert_eq!(record.encoding, KeyEncoding::Float);
        assert_eq!(record.keys.len(), 5);
        assert_eq!(record.keys[2].value, 1.0);
    }

    #[test]
    fn test_classify_and_partition() {
        let mot = sample();
        let kinds = mot.classify();
        assert!(kinds.has_armature && kinds.has_camera);

        let (armature, camera) = partition(&mot.records);
        assert_eq!(armature.len() + camera.len(), mot.records.len());
        assert!(camera.iter().all(|r| r.is_camera()));
        assert!(armature.iter().all(|r| !r.is_camera()));

        let only_bones = &mot.records[..2];
        assert!(!classify(only_bones).has_camera);
        assert_eq!(classify(std::iter::empty()), Classification::default());
    }

    #[test]
    fn test_playback_range() {
        let range = sample().playback_range();
        assert_eq!((range.start, range.end), (0, 59));
        assert_eq!(range.fps, 60.0);
    }

    #[test]
    fn test_bad_record_skipped_rest_decoded() {
        let mut bytes = sample().encode().unwrap();
        // Second record: unknown encoding
        let encoding_at = HEADER_SIZE + RECORD_SIZE + 3;
        bytes[encoding_at] = 42;
        let decoded = MotFile::decode(&bytes).unwrap();
        assert_eq!(decoded.records.len(), 2);
        assert_eq!(decoded.report.count(DiagnosticKind::CorruptRecord), 1);
    }

    #[test]
    fn test_decreasing_frames_skipped() {
        let mut mot = MotFile::new("a", 10);
        mot.records = vec![track(
            0,
            0,
            KeyEncoding::Hermite,
            vec![Keyframe::hermite(5, 0.0, 0.0, 0.0), Keyframe::hermite(2, 1.0, 0.0, 0.0)],
        )];
        let decoded = MotFile::decode(&mot.encode().unwrap()).unwrap();
        assert!(decoded.records.is_empty());
        assert_eq!(decoded.report.len(), 1);
    }

    #[test]
    fn test_wrong_magic() {
        let mut bytes = sample().encode().unwrap();
        bytes[0] = b'M';
        assert!(MotFile::decode(&bytes).unwrap_err().is_format_error());
    }
}
