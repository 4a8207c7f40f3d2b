//! Directory, copy and stylesheet actions.

use std::fs;
use std::path::{Path, PathBuf};

use grass::{Options, OutputStyle};
use serde_json::Value as Json;

use crate::error::SiteError;
use crate::node::Node;
use crate::value::Data;

const VALUES_FILES: [&str; 2] = ["_values.yaml", "_values.yml"];

/// Values of a directory, read from its `_values.yaml` or `_values.yml` file.
pub(super) fn dir_values(dir: &Path) -> Result<Data, SiteError> {
    let mut present = VALUES_FILES
        .iter()
        .map(|name| dir.join(name))
        .filter(|path| path.is_file());

    let Some(path) = present.next() else {
        return Ok(Data::new());
    };
    if present.next().is_some() {
        return Err(SiteError::read(
            dir,
            "both _values.yaml and _values.yml found in directory. Only one is allowed.",
        ));
    }

    let text = fs::read_to_string(&path)
        .map_err(|e| SiteError::read(&path, format!("can't read values file: {e}")))?;
    match serde_yaml::from_str::<Json>(&text) {
        Ok(Json::Object(data)) => Ok(data),
        Ok(Json::Null) => Ok(Data::new()),
        Ok(_) => Err(SiteError::read(
            &path,
            "the top level element of a values file must be a mapping",
        )),
        Err(e) => Err(SiteError::read(&path, format!("can't parse YAML: {e}"))),
    }
}

pub(super) fn create_dir(dst: &Path) -> Result<(), SiteError> {
    fs::create_dir_all(dst).map_err(|e| SiteError::io(dst, e))
}

pub(super) fn copy(src: &Path, dst: &Path) -> Result<(), SiteError> {
    fs::copy(src, dst).map_err(|e| SiteError::io(dst, e))?;
    Ok(())
}

/// Compile a Sass/SCSS file with the node's `_sass_options`.
///
/// Supported options: `load_paths` (relative to the input directory) and
/// `style` (`expanded` or `compressed`).
pub(super) fn compile_sass(node: &Node, dst: &Path) -> Result<(), SiteError> {
    let src = node.src_path();
    let options = node.data.get("_sass_options").and_then(Json::as_object);

    let mut load_paths: Vec<PathBuf> = Vec::new();
    let mut style = OutputStyle::Expanded;
    if let Some(options) = options {
        for (key, value) in options {
            match (key.as_str(), value) {
                ("load_paths", Json::Array(paths)) => {
                    for path in paths {
                        let Some(path) = path.as_str() else {
                            return Err(SiteError::value(
                                &src,
                                "'_sass_options.load_paths' must be a list of strings",
                            ));
                        };
                        load_paths.push(node.src_root.join(path));
                    }
                }
                ("style", Json::String(name)) if name == "expanded" => style = OutputStyle::Expanded,
                ("style", Json::String(name)) if name == "compressed" => {
                    style = OutputStyle::Compressed;
                }
                (other, value) => {
                    return Err(SiteError::value(
                        &src,
                        format!("invalid Sass option '{other}': {value}"),
                    ));
                }
            }
        }
    }

    let options = Options::default().load_paths(&load_paths).style(style);
    let css = grass::from_path(&src, &options)
        .map_err(|e| SiteError::write(&src, format!("can't compile Sass: {e}")))?;
    fs::write(dst, css).map_err(|e| SiteError::io(dst, e))
}
