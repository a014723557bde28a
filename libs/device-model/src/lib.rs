//! Device model for binding generation
//!
//! This crate owns the language-agnostic description of a device's RPC surface:
//!
//! 1. **Loader**: parses one declarative descriptor (JSON or YAML) per device and
//!    validates it.
//! 2. **IR (Intermediate Representation)**: `Device`, `Packet`, `Element`,
//!    `ConstantGroup` and `Example`, immutable after loading.
//! 3. **Registry**: the set of loaded devices, built once per run and handed to
//!    every generation task.
//!
//! Nothing here knows about target languages; see `devbind-codegen` for the
//! resolver and the emitters.

pub mod error;
pub mod features;
pub mod ir;
pub mod loader;
pub mod name;
pub mod registry;
pub mod types;

pub use error::{DescriptorError, Error, Result};
pub use features::Feature;
pub use ir::{
    Category, Constant, ConstantGroup, ConstantValue, Device, Doc, DocRole, Element, Example,
    ExampleStep, ExampleStepKind, HighLevelSpec, LocalizedText, Packet, PacketKind,
};
pub use loader::{load_descriptor, load_dir, load_file, DescriptorFormat, LoadOutcome};
pub use name::Name;
pub use registry::DeviceRegistry;
pub use types::{Direction, ElementType};
