use std::env;

#[allow(unused_macros)]
macro_rules! println_info {
    ($($tokens: tt)*) => {
        println!("cargo:warning=\r\x1b[32;1m   {}", format!($($tokens)*))
    }
}

fn main() {
    println!("cargo:rerun-if-changed=wrapper/fn2_shim.h");
    println!("cargo:rerun-if-changed=wrapper/fn2_shim.cpp");
    println!("cargo:rerun-if-env-changed=FREENECT2_DIR");

    if env::var_os("CARGO_FEATURE_NATIVE").is_none() {
        // Data types only; nothing to compile or link.
        return;
    }

    #[cfg(feature = "native")]
    build_shim();
}

#[cfg(feature = "native")]
fn build_shim() {
    use std::path::PathBuf;

    let mut includes: Vec<PathBuf> = Vec::new();

    // An explicit install prefix wins over pkg-config.
    if let Some(dir) = env::var_os("FREENECT2_DIR").map(PathBuf::from) {
        println_info!("Using libfreenect2 from FREENECT2_DIR={}", dir.display());
        println!("cargo:rustc-link-search=native={}", dir.join("lib").display());
        println!("cargo:rustc-link-lib=dylib=freenect2");
        includes.push(dir.join("include"));
    } else {
        match pkg_config::Config::new().atleast_version("0.2").probe("freenect2") {
            Ok(lib) => {
                println_info!("Found libfreenect2 {} via pkg-config", lib.version);
                includes.extend(lib.include_paths);
            }
            Err(err) => {
                println_info!("pkg-config could not find libfreenect2 ({err}); linking by name");
                println!("cargo:rustc-link-lib=dylib=freenect2");
            }
        }
    }

    let mut build = cc::Build::new();
    build
        .cpp(true)
        .std("c++14")
        .include("wrapper")
        .file("wrapper/fn2_shim.cpp")
        .warnings(true);
    for dir in &includes {
        build.include(dir);
    }
    build.compile("fn2_shim");
}
