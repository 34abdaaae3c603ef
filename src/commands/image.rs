//! Image attachment inspection.
//!
//! Loads a local image the way the interactive surface would attach it and
//! prints its inline preview URI. Non-image files are rejected.

use std::path::PathBuf;

use crate::image::ImageAttachment;

/// How much of the data URI to print before truncating.
const URI_PREVIEW_CHARS: usize = 96;

/// Loads an image file and prints its attachment details.
///
/// # Errors
/// - If the file is not an image or cannot be read
pub fn handle_image(file: PathBuf) -> anyhow::Result<()> {
    let mut attachment = ImageAttachment::new();
    let image = attachment.load(&file)?;

    println!();
    println!("Image attached:");
    println!("  Name: {}", image.name);
    println!("  Type: {}", image.mime);
    println!("  Size: {} bytes", image.byte_size);

    let uri = image.data_uri();
    if uri.len() > URI_PREVIEW_CHARS {
        println!("  Preview URI: {}... ({} chars)", &uri[..URI_PREVIEW_CHARS], uri.len());
    } else {
        println!("  Preview URI: {uri}");
    }
    println!();

    Ok(())
}
