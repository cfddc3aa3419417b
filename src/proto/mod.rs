//! Protocol Buffer definitions and generated code for the gateway RPC surface.
//!
//! This module contains auto-generated Rust types from the Protobuf
//! definition in `proto/gnmi.proto`, created by `tonic-build` at compile time.

pub mod gnmi {
    tonic::include_proto!("gnmi");
}
