//! Pass-through executor.

use encoding_rs::Encoding;
use tracing::debug;

use super::error::TransformError;
use crate::content::{ContentReader, ContentWriter};
use crate::mimetype::is_text_compatible;

/// Copies the source into the writer. Text going to plain text is recoded
/// when the two sides declare different character sets.
pub(crate) async fn transform(
    reader: &dyn ContentReader,
    writer: &mut dyn ContentWriter,
) -> Result<(), TransformError> {
    if is_text_compatible(reader.mimetype(), writer.mimetype()) {
        if let Some((from, to)) = recoding(reader.encoding(), writer.encoding()) {
            let bytes = reader.read_bytes().await?;
            let (text, _, malformed) = from.decode(&bytes);
            if malformed {
                debug!(
                    from = from.name(),
                    reader = %reader.describe(),
                    "Replaced malformed sequences while recoding"
                );
            }
            let (encoded, used, _) = to.encode(&text);
            writer.set_encoding(Some(used.name()));
            writer.put_bytes(&encoded).await?;
            return Ok(());
        }
    }

    if writer.encoding().is_none() {
        writer.set_encoding(reader.encoding());
    }
    let mut stream = reader.content_input_stream().await?;
    writer.put_content(&mut *stream).await?;
    Ok(())
}

/// Both encodings, when both are known and name different character sets.
fn recoding(
    source: Option<&str>,
    target: Option<&str>,
) -> Option<(&'static Encoding, &'static Encoding)> {
    let from = Encoding::for_label(source?.as_bytes())?;
    let to = Encoding::for_label(target?.as_bytes())?;
    (from != to).then_some((from, to))
}
