//! Edits on the rendered manifest that can't be expressed in the yaml model.

use crate::errors::*;
use crate::manifest::{Manifest, RenderedImage};
use crate::rewrite::ContainerImage;
use std::collections::HashMap;

const STATUS_KEY: &str = "status:";
const IMAGE_KEY: &str = "image: ";

/// Cut the text at the first line starting with `status:`
pub fn strip_status(text: &str) -> &str {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.starts_with(STATUS_KEY) {
            debug!("Removing status section from rendered manifest");
            return &text[..offset];
        }
        offset += line.len();
    }
    text
}

/// The value of a `image: ...` line, possibly the first key of a list item
fn image_value(line: &str) -> Option<&str> {
    let line = line.trim_start();
    let line = line.strip_prefix("- ").unwrap_or(line);
    line.strip_prefix(IMAGE_KEY)
}

/// Append ` # <tag>` to the image line of every replaced container.
///
/// `rendered` lists every `image` value of the document in rendering order.
/// Each one claims the first remaining line with exactly its value, so images
/// outside of the deployment containers hold on to their own lines. A value
/// without a line is skipped and the next one keeps searching from the same
/// place.
pub fn annotate_tags(text: &str, rendered: &[RenderedImage], images: &[ContainerImage]) -> String {
    let tags = images
        .iter()
        .filter_map(|image| {
            let tag = image.tag.as_deref()?;
            Some(((image.deployment, image.container), (image.image.as_str(), tag)))
        })
        .collect::<HashMap<_, _>>();

    let lines = text.split_inclusive('\n').collect::<Vec<_>>();
    let mut annotations = HashMap::new();
    let mut cursor = 0;

    for entry in rendered {
        let tag = entry
            .container
            .and_then(|position| tags.get(&position))
            .filter(|(image, _)| *image == entry.image)
            .map(|(_, tag)| *tag);

        let found = lines[cursor..]
            .iter()
            .position(|line| image_value(line.trim_end_matches('\n')) == Some(entry.image.as_str()));
        match (found, tag) {
            (Some(offset), tag) => {
                if let Some(tag) = tag {
                    annotations.insert(cursor + offset, tag);
                }
                cursor += offset + 1;
            }
            (None, Some(tag)) => {
                warn!(
                    "Could not find image {:?} in rendered manifest, not annotating tag {:?}",
                    entry.image, tag
                );
            }
            (None, None) => (),
        }
    }

    let mut out = String::with_capacity(text.len() + annotations.len() * 16);
    for (idx, line) in lines.iter().enumerate() {
        let (content, newline) = match line.strip_suffix('\n') {
            Some(content) => (content, "\n"),
            None => (*line, ""),
        };
        out.push_str(content);
        if let Some(tag) = annotations.get(&idx) {
            trace!("Annotating {content:?} with tag {tag:?}");
            out.push_str(" # ");
            out.push_str(tag);
        }
        out.push_str(newline);
    }
    out
}

/// Remove the status section, then annotate the replaced images with their tags
pub fn process(text: &str, manifest: &Manifest, images: &[ContainerImage]) -> Result<String> {
    let rendered = manifest.rendered_images()?;
    Ok(annotate_tags(strip_status(text), &rendered, images))
}
