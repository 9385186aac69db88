//! stagehand-parsers
//!
//! Binary codecs for the stage, model and motion assets of PlatinumGames
//! titles, plus the container and markup formats they travel in.
//!
//! # Supported Formats
//!
//! | Format | Extension | Description |
//! |--------|-----------|-------------|
//! | WMB4   | `.wmb`    | Static and skinned model geometry |
//! | MOT    | `.mot`    | Bone and camera keyframe animation |
//! | SCR    | `.scr`    | Stage container of embedded WMB models |
//! | LY2    | `.ly2`    | Prop placement layout |
//! | BXM    | `.bxm`, `.seq`, `.sop`, `.gad` | Binary XML |
//! | DAT    | `.dat`, `.dtt` | Generic file archive |
//!
//! # Example
//!
//! ```rust,ignore
//! use stagehand_parsers::{Parser, ParseOptions, WmbParser};
//!
//! let model = WmbParser::new().parse_file("pl0010.wmb".as_ref())?;
//! for submesh in model.submeshes(&ParseOptions::default())? {
//!     println!("{}: {} triangles", submesh.name, submesh.triangle_count());
//! }
//! ```

pub mod bxm;
pub mod cursor;
pub mod dat;
pub mod logging;
pub mod ly2;
pub mod mot;
pub mod registry;
pub mod scr;
pub mod traits;
pub mod transform;
pub mod wmb;

pub use traits::{
    expect_magic, ErrorClass, HierarchicalParser, HumanReadable, ParseError, ParseOptions, ParseResult, Parser,
    RandomAccessParser,
};

pub use registry::{
    AnyParser, ParserInfo, ParserRegistration, ParserRegistrationBuilder, ParserRegistry, RegistryError,
    GLOBAL_REGISTRY,
};

pub use bxm::{BxmDocument, BxmNode, BxmParser};
pub use dat::{DatArchive, DatEntry, DatParser};
pub use ly2::{decode_ly2, Ly2Document, Ly2Layout, Ly2Parser, PropCategory, PropPlacement, PropResolver, PropSource};
pub use mot::{MotFile, MotParser, MotRecord, PlaybackRange, PropertyAnimation, Target};
pub use scr::{ScrFile, ScrModel, ScrParser};
pub use transform::Transform;
pub use wmb::{SubMesh, WmbModel, WmbParser};

/// Register every built-in codec with [`GLOBAL_REGISTRY`]; repeated calls are no-ops
pub fn init_registry() {
    for registration in builtin_registrations() {
        match registration {
            Ok(registration) => match GLOBAL_REGISTRY.register(registration) {
                Ok(()) | Err(RegistryError::DuplicateId(_)) => {}
                Err(err) => tracing::error!(error = %err, "Failed to register built-in parser"),
            },
            Err(err) => tracing::error!(error = %err, "Invalid built-in parser registration"),
        }
    }
}

/// Build the registrations for the built-in codecs
pub fn builtin_registrations() -> Vec<Result<ParserRegistration, RegistryError>> {
    vec![
        ParserRegistrationBuilder::new()
            .id("wmb")
            .name("WMB4 Model Parser")
            .description("Decodes WMB4 model geometry, bones and materials")
            .extensions(&["wmb"])
            .priority(100)
            .factory(wmb::WmbParser::new)
            .build(),
        ParserRegistrationBuilder::new()
            .id("mot")
            .name("MOT Animation Parser")
            .description("Decodes bone and camera keyframe tracks")
            .extensions(&["mot"])
            .priority(100)
            .factory(mot::MotParser::new)
            .build(),
        ParserRegistrationBuilder::new()
            .id("scr")
            .name("SCR Stage Parser")
            .description("Splits stage containers into their embedded models")
            .extensions(&["scr"])
            .priority(100)
            .factory(scr::ScrParser::new)
            .build(),
        ParserRegistrationBuilder::new()
            .id("ly2")
            .name("LY2 Layout Parser")
            .description("Decodes prop type tables and instance placements")
            .extensions(&["ly2"])
            .priority(100)
            .factory(ly2::Ly2Parser::new)
            .build(),
        ParserRegistrationBuilder::new()
            .id("bxm")
            .name("Binary XML Parser")
            .description("Decodes BXM node trees such as attack sequences")
            .extensions(&["bxm", "seq", "sop", "gad"])
            .priority(100)
            .factory(bxm::BxmParser::new)
            .build(),
        ParserRegistrationBuilder::new()
            .id("dat")
            .name("DAT/DTT Archive Parser")
            .description("Lists and extracts files from DAT and DTT archives")
            .extensions(&["dat", "dtt"])
            .priority(100)
            .factory(dat::DatParser::new)
            .build(),
    ]
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registrations_are_complete() {
        let registry = ParserRegistry::new();
        for registration in builtin_registrations() {
            registry.register(registration.unwrap()).unwrap();
        }
        let ids: Vec<String> = registry.list().into_iter().map(|info| info.id).collect();
        assert_eq!(ids, ["bxm", "dat", "ly2", "mot", "scr", "wmb"]);
        assert_eq!(registry.get_for_extension("seq").unwrap().name(), "BXM Binary XML Parser");
    }

    #[test]
    fn test_init_registry_is_idempotent() {
        init_registry();
        init_registry();
        assert!(GLOBAL_REGISTRY.get_for_extension("dtt").is_ok());
    }
}
