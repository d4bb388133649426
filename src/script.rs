//! Load script generation.
//!
//! The generated bash script travels with the archive. Run at the destination
//! as `./load-images.sh <registry>`, it loads the archive into the local
//! daemon, retags every manifest image under `<registry>/` and pushes them.
//!
//! The script lists every manifest image, public or not. It mirrors the
//! manifest rather than the archive contents.

use crate::error::ScriptError;
use crate::manifest::Image;
use handlebars::Handlebars;
use serde::Serialize;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Default file name of the generated script
pub const LOAD_SCRIPT_NAME: &str = "load-images.sh";

/// Permissions of the generated script (owner read/write/execute)
pub const LOAD_SCRIPT_MODE: u32 = 0o700;

const TEMPLATE_NAME: &str = "load-script";

const LOAD_SCRIPT_TEMPLATE: &str = r#"#!/bin/bash

repository=${1}

imageFile={{output_file}}

if [ "$repository" == "" ]; then
    echo "Repository not specified"
    exit 1
fi

echo Loading Images from ${imageFile}
docker load < ${imageFile}

{{#each images}}
echo "Tagging {{repository}}:{{tag}} -> ${repository}/{{repository}}:{{tag}}"
docker tag {{repository}}:{{tag}} ${repository}/{{repository}}:{{tag}}
{{/each}}

{{#each images}}
echo "Pushing ${repository}/{{repository}}:{{tag}}"
docker push ${repository}/{{repository}}:{{tag}}
{{/each}}
"#;

#[derive(Serialize)]
struct ScriptContext<'a> {
    output_file: &'a str,
    images: &'a [Image],
}

/// Render the load script for an archive named `output_file`
pub fn render(output_file: &str, images: &[Image]) -> Result<String, ScriptError> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    registry.register_escape_fn(handlebars::no_escape);
    registry.register_template_string(TEMPLATE_NAME, LOAD_SCRIPT_TEMPLATE)?;

    let context = ScriptContext {
        output_file,
        images,
    };
    Ok(registry.render(TEMPLATE_NAME, &context)?)
}

/// Write `contents` to `path` as an executable script, truncating any
/// existing file.
pub async fn write_script(path: &Path, contents: &str) -> Result<(), ScriptError> {
    let write_error = |source: std::io::Error| ScriptError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(LOAD_SCRIPT_MODE);

    let mut file = options.open(path).await.map_err(write_error)?;
    file.write_all(contents.as_bytes())
        .await
        .map_err(write_error)?;
    file.flush().await.map_err(write_error)?;

    // The mode above only applies when the file is created.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(LOAD_SCRIPT_MODE))
            .await
            .map_err(write_error)?;
    }

    Ok(())
}
