//! Generated gRPC client stub for the gimulator RPC (§4.9.1), compiled
//! from `proto/gimulator.proto` by `build.rs`.

#![allow(clippy::all)]

tonic::include_proto!("gimulator");
