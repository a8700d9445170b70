mod client;
mod credentials;
mod descriptor;

pub use client::{MetadataClient, MetadataError, METADATA_BASE_URL};
pub use credentials::{GuestCredentialsResponse, ImportBlob};
pub use descriptor::{Descriptor, Instance, InstanceAttributes, NetworkInterface, Project};
