use std::env;
use std::path::Path;
use std::process::Command;

fn main() {
    // RSA recovery links against the system OpenSSL through the `openssl` crate.
    println!("cargo:rerun-if-env-changed=OPENSSL_DIR");
    println!("cargo:rerun-if-env-changed=OPENSSL_LIB_DIR");
    println!("cargo:rerun-if-env-changed=OPENSSL_INCLUDE_DIR");
    println!("cargo:rerun-if-env-changed=VCPKG_ROOT");

    if !openssl_located() {
        println!("cargo:warning=OpenSSL development files were not found");
        show_openssl_installation_instructions();
    }
}

fn openssl_located() -> bool {
    if env::var_os("OPENSSL_DIR").is_some() {
        return true;
    }

    if cfg!(target_os = "windows") {
        if let Some(root) = env::var_os("VCPKG_ROOT") {
            let installed = Path::new(&root).join("installed").join("x64-windows");
            if installed.join("include").join("openssl").exists() {
                return true;
            }
        }
        return [
            "C:\\OpenSSL-Win64",
            "C:\\Program Files\\OpenSSL-Win64",
            "C:\\vcpkg\\installed\\x64-windows",
        ]
        .iter()
        .any(|path| Path::new(path).join("include").join("openssl").exists());
    }

    if Command::new("pkg-config")
        .args(["--exists", "openssl"])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
    {
        return true;
    }

    [
        "/usr/include/openssl",
        "/usr/local/include/openssl",
        "/opt/homebrew/include/openssl",
        "/usr/local/opt/openssl/include/openssl",
        "/opt/local/include/openssl",
    ]
    .iter()
    .any(|path| Path::new(path).exists())
}

fn show_openssl_installation_instructions() {
    if cfg!(target_os = "windows") {
        println!("cargo:warning=Install with: vcpkg install openssl:x64-windows");
        println!("cargo:warning=or set OPENSSL_DIR to an OpenSSL installation");
    } else if cfg!(target_os = "macos") {
        println!("cargo:warning=Install with: brew install openssl@3");
    } else {
        println!("cargo:warning=Install with: apt install libssl-dev pkg-config");
        println!("cargo:warning=or: dnf install openssl-devel pkgconf");
    }
}
