use std::env;
use std::path::PathBuf;

// ffmpeg-next links against system FFmpeg. On Windows there is no pkg-config,
// so point the user at a vcpkg install when FFMPEG_DIR is missing.
fn main() {
    for variable in ["FFMPEG_DIR", "VCPKG_ROOT", "VCPKGRS_TRIPLET"] {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("windows") {
        return;
    }
    if env::var_os("FFMPEG_DIR").is_some() {
        return;
    }

    let Some(vcpkg_root) = env::var_os("VCPKG_ROOT") else {
        println!(
            "cargo:warning=framecut needs FFmpeg development libraries; set FFMPEG_DIR (e.g. to a vcpkg install)."
        );
        return;
    };

    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_string());
    let candidate = PathBuf::from(vcpkg_root).join("installed").join(triplet);
    if candidate.is_dir() {
        println!(
            "cargo:warning=FFMPEG_DIR is not set; found vcpkg FFmpeg at {}, export FFMPEG_DIR to use it.",
            candidate.display()
        );
    } else {
        println!(
            "cargo:warning=FFMPEG_DIR is not set and {} does not exist.",
            candidate.display()
        );
    }
}
