use hub_types::*;
use kube::CustomResourceExt;
use std::fs;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = fs::create_dir("../crds");
    fs::write(
        "../crds/hub.roboepics.com_room_crd.yaml",
        serde_yaml::to_string(&Room::crd()).unwrap(),
    )
    .unwrap();

    // Use bundled protoc
    // SAFETY: this build script runs single-threaded with no other env mutation.
    unsafe {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    tonic_prost_build::configure()
        .build_server(false)
        .build_client(true)
        .compile_protos(&["proto/gimulator.proto"], &["proto/"])?;

    Ok(())
}
