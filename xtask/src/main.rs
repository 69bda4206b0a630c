#![deny(unused_must_use)]

use std::{env, path::PathBuf};

use xshell::cmd;

fn main() -> Result<(), anyhow::Error> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    let args = args.iter().map(|s| &**s).collect::<Vec<_>>();

    match &args[..] {
        ["test"] => test_core(),
        ["rpizero", "build", "demo"] => build_demo(),
        _ => {
            println!("USAGE: cargo xtask test");
            println!("OR");
            println!("USAGE: cargo xtask rpizero build demo");
            Ok(())
        }
    }
}

/// Host-side tests of the core crate.
fn test_core() -> Result<(), anyhow::Error> {
    let _p = xshell::pushd(root_dir())?;
    cmd!("cargo test --workspace").run()?;
    Ok(())
}

/// Cross-build the Pi Zero W demo and produce a bootable kernel.img.
fn build_demo() -> Result<(), anyhow::Error> {
    let _p = xshell::pushd(root_dir().join("boards/demos/rpizero"))?;
    cmd!("cargo build --release").run()?;
    cmd!("rust-objcopy --strip-all -O binary ../../target/armv6zk-none-eabihf/release/demo kernel.img")
        .run()?;
    Ok(())
}

fn root_dir() -> PathBuf {
    let mut xtask_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    xtask_dir.pop();
    xtask_dir
}
