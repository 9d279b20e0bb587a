//! pkg-config stub generation for ingredients that carry consumer options.
//!
//! An ingredient that carries `ConsumerOptions` gets a `.pc` file written
//! into its staged root's `usr/share/pkgconfig` directory so the recipe's
//! own configure/cmake/meson step can discover it the same way it would
//! discover a system-installed library. The format is fixed — this is part
//! of the on-disk contract consumers rely on, not a cosmetic choice — so it
//! is hand-rendered rather than built from a template crate.

use crate::error::{ChefError, Result};
use crate::model::{ConsumerOptions, Version};
use std::path::Path;

const COMPONENT: &str = "kitchen/pkgconfig";

pub fn write_stub(
    destination_root: &Path,
    publisher: &str,
    package: &str,
    version: &Version,
    prefix_inside_sandbox: &str,
    options: &ConsumerOptions,
) -> Result<()> {
    let directory = destination_root.join("usr/share/pkgconfig");
    crate::paths::mkdir_p(COMPONENT, &directory)?;

    let cflags: String =
        options.inc_dirs.iter().map(|dir| format!("-I{{prefix}}{dir}")).collect::<Vec<_>>().join(" ");
    let libs: String =
        options.lib_dirs.iter().map(|dir| format!("-L{{prefix}}{dir}")).collect::<Vec<_>>().join(" ");

    let mut contents = String::new();
    contents.push_str("# generated by chef, please do not manually modify this\n");
    contents.push_str(&format!("prefix={prefix_inside_sandbox}\n"));
    contents.push_str(&format!("Name: {package}\n"));
    contents.push_str(&format!("Description: {package} by {publisher}\n"));
    contents.push_str(&format!("Version: {}.{}.{}\n", version.major, version.minor, version.patch));
    contents.push_str(&format!("Cflags: {cflags}\n"));
    contents.push_str(&format!("Libs:   {libs}\n"));

    let pc_path = directory.join(format!("{package}.pc"));
    std::fs::write(&pc_path, contents).map_err(|e| ChefError::io(COMPONENT, &pc_path, e))
}
