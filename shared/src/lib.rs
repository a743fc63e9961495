//! Types shared between the lamp server and its dashboard clients.

pub mod color;
pub mod protocol;
pub mod vec3;
